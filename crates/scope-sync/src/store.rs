use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::conflict::SyncConflict;
use crate::state::SyncState;
use scope_core::DeviceId;
use scope_core::repo::{ChangeTracker, RepoError, RepoResult};

// ---------------------------------------------------------------------------
// Sync-side persistence contracts
// ---------------------------------------------------------------------------

#[async_trait]
pub trait SyncStateRepository: Send + Sync {
    async fn find(&self, device: &DeviceId) -> RepoResult<Option<SyncState>>;
    async fn save(&self, state: SyncState) -> RepoResult<()>;
    async fn all(&self) -> RepoResult<Vec<SyncState>>;
}

#[async_trait]
pub trait ConflictRepository: Send + Sync {
    async fn save_all(&self, conflicts: Vec<SyncConflict>) -> RepoResult<()>;
    async fn pending(&self) -> RepoResult<Vec<SyncConflict>>;
    async fn all(&self) -> RepoResult<Vec<SyncConflict>>;
}

// ---------------------------------------------------------------------------
// In-memory implementation
// ---------------------------------------------------------------------------

#[derive(Default)]
struct State {
    states: BTreeMap<DeviceId, SyncState>,
    conflicts: Vec<SyncConflict>,
}

/// Sync-state and conflict storage for tests and the CLI snapshot.
#[derive(Default)]
pub struct MemorySyncStore {
    state: RwLock<State>,
}

/// Serializable copy of the sync store.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct SyncSnapshot {
    pub states: Vec<SyncState>,
    pub conflicts: Vec<SyncConflict>,
}

impl MemorySyncStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn dump(&self) -> SyncSnapshot {
        let state = self.state.read().await;
        SyncSnapshot {
            states: state.states.values().cloned().collect(),
            conflicts: state.conflicts.clone(),
        }
    }

    pub fn from_snapshot(snapshot: SyncSnapshot) -> Self {
        let state = State {
            states: snapshot
                .states
                .into_iter()
                .map(|s| (s.device_id().clone(), s))
                .collect(),
            conflicts: snapshot.conflicts,
        };
        Self {
            state: RwLock::new(state),
        }
    }
}

#[async_trait]
impl SyncStateRepository for MemorySyncStore {
    async fn find(&self, device: &DeviceId) -> RepoResult<Option<SyncState>> {
        Ok(self.state.read().await.states.get(device).cloned())
    }

    async fn save(&self, state: SyncState) -> RepoResult<()> {
        self.state
            .write()
            .await
            .states
            .insert(state.device_id().clone(), state);
        Ok(())
    }

    async fn all(&self) -> RepoResult<Vec<SyncState>> {
        Ok(self.state.read().await.states.values().cloned().collect())
    }
}

/// Every committed local event raises the pending-change counter of every
/// known remote device; a successful round zeroes it again. Devices we have
/// never attempted a round with have no state row yet and are skipped.
#[async_trait]
impl ChangeTracker for MemorySyncStore {
    async fn record_local_changes(&self, count: u32) -> RepoResult<()> {
        if count == 0 {
            return Ok(());
        }
        let mut state = self.state.write().await;
        for sync_state in state.states.values_mut() {
            *sync_state = sync_state
                .clone()
                .increment_pending(count)
                .map_err(|e| RepoError::Database(e.to_string()))?;
        }
        Ok(())
    }
}

#[async_trait]
impl ConflictRepository for MemorySyncStore {
    async fn save_all(&self, conflicts: Vec<SyncConflict>) -> RepoResult<()> {
        self.state.write().await.conflicts.extend(conflicts);
        Ok(())
    }

    async fn pending(&self) -> RepoResult<Vec<SyncConflict>> {
        let state = self.state.read().await;
        Ok(state
            .conflicts
            .iter()
            .filter(|c| c.is_pending() || c.resolution == Some(crate::conflict::Resolution::Deferred))
            .cloned()
            .collect())
    }

    async fn all(&self) -> RepoResult<Vec<SyncConflict>> {
        Ok(self.state.read().await.conflicts.clone())
    }
}
