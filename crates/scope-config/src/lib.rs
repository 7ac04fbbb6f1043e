pub mod logging;
pub mod settings;
pub mod types;

pub use logging::{LogFormat, LoggingConfig};
pub use settings::{
    DeviceConfig, HierarchyConfig, ScopesConfig, StorageConfig, SyncConfig, SyncStrategy,
};
pub use types::HumanDuration;
