use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::VectorClock;
use crate::ids::{DeviceId, EventId, ScopeId};
use crate::repo::RepoResult;
use crate::scope::ScopeEvent;

// ---------------------------------------------------------------------------
// Event records
// ---------------------------------------------------------------------------

/// One appended domain event: the payload plus everything synchronization
/// needs to order and dedupe it.
///
/// Per-aggregate records are totally ordered by `(version, vector_clock)`;
/// across aggregates only the vector clocks order them, partially.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub event_id: EventId,
    pub aggregate_id: ScopeId,
    /// Aggregate version after applying the payload; the first event of an
    /// aggregate carries version 1.
    pub version: u64,
    pub vector_clock: VectorClock,
    pub payload: ScopeEvent,
    pub recorded_at: DateTime<Utc>,
    /// Device the event originated on.
    pub origin: DeviceId,
}

// ---------------------------------------------------------------------------
// Event store contract
// ---------------------------------------------------------------------------

/// Append-only log of domain events.
#[async_trait]
pub trait EventStore: Send + Sync {
    async fn append(&self, record: EventRecord) -> RepoResult<()>;
    /// Events of one aggregate with `version > since_version`, in version
    /// order.
    async fn events_for(&self, aggregate: ScopeId, since_version: u64)
    -> RepoResult<Vec<EventRecord>>;
    /// Events not yet covered by `clock`: records whose vector clock neither
    /// equals `clock` nor happened before it.
    async fn events_ahead_of(&self, clock: &VectorClock) -> RepoResult<Vec<EventRecord>>;
    /// Pointwise maximum over every stored event's clock.
    async fn latest_clock(&self) -> RepoResult<VectorClock>;
    async fn contains(&self, event_id: EventId) -> RepoResult<bool>;
}
