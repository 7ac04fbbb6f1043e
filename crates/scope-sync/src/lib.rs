#[macro_use]
mod log_macros;

pub mod conflict;
pub mod error;
pub mod orchestrator;
pub mod state;
pub mod store;
pub mod tracing_init;
pub mod transport;

pub use conflict::{
    ConflictType, DetectParams, Resolution, ResolutionStrategy, Severity, SyncConflict,
};
pub use error::{SyncError, SyncReason, SyncResult};
pub use orchestrator::{SyncFailureReason, SyncOrchestrator, SyncReport};
pub use state::{MAX_PENDING_CHANGES, StateError, SyncState, SyncStatus};
pub use store::{ConflictRepository, MemorySyncStore, SyncStateRepository};
pub use transport::{LoopbackTransport, SyncTransport, TransportError};
