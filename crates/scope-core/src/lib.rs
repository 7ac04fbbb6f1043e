pub mod alias;
pub mod aspect;
pub mod clock;
pub mod context;
pub mod error;
pub mod event;
pub mod ids;
pub mod repo;
pub mod scope;
pub mod store;
pub mod value;

pub use alias::{AliasKind, ScopeAlias};
pub use clock::VectorClock;
pub use error::{CoreError, CoreReason, CoreResult};
pub use event::{EventRecord, EventStore};
pub use ids::{AliasId, ConflictId, ContextViewId, DeviceId, EventId, ScopeId};
pub use scope::{AspectMap, Scope};
pub use value::{
    AliasName, AspectKey, AspectValue, ContextViewKey, ScopeDescription, ScopeTitle, ValueError,
};
