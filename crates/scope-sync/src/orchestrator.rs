use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::conflict::{
    ConflictContext, ConflictType, DetectParams, Resolution, ResolutionStrategy, SyncConflict,
    resolve_conflicts,
};
use crate::error::{SyncResult, sync_err};
use crate::state::{StateError, SyncState, SyncStatus};
use crate::store::{ConflictRepository, SyncStateRepository};
use crate::transport::{SyncTransport, TransportError};
use scope_core::repo::{RepoError, ScopeAliasRepository, ScopeRepository};
use scope_core::scope::ScopeEvent;
use scope_core::{
    AliasKind, CoreReason, DeviceId, EventRecord, EventStore, Scope, ScopeAlias, VectorClock,
};

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// Why a round ended in `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncFailureReason {
    NetworkError,
    InvalidDevice,
    Storage,
    ConflictResolution,
    Cancelled,
}

/// Outcome of one sync round, emitted whether the round succeeded or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncReport {
    pub device_id: DeviceId,
    pub status: SyncStatus,
    pub pushed: u32,
    pub pulled: u32,
    pub conflicts_detected: u32,
    pub conflicts_resolved: u32,
    pub conflicts_deferred: u32,
    pub failure: Option<SyncFailureReason>,
    pub finished_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Round-internal failure classification
// ---------------------------------------------------------------------------

enum RoundError {
    Transport(TransportError),
    Storage(RepoError),
    Timeout,
    Cancelled,
    Conflict,
}

impl RoundError {
    fn failure_reason(&self) -> SyncFailureReason {
        match self {
            // A timeout is a cancellation surfaced as a network failure.
            Self::Timeout | Self::Transport(TransportError::Network { .. }) => {
                SyncFailureReason::NetworkError
            }
            Self::Transport(TransportError::InvalidDevice { .. }) => {
                SyncFailureReason::InvalidDevice
            }
            Self::Storage(_) => SyncFailureReason::Storage,
            Self::Cancelled => SyncFailureReason::Cancelled,
            Self::Conflict => SyncFailureReason::ConflictResolution,
        }
    }
}

struct RoundOutcome {
    pushed: u32,
    pulled: u32,
    conflicts_detected: u32,
    conflicts_resolved: u32,
    conflicts_deferred: u32,
    merged_clock: VectorClock,
}

enum Ingest {
    Apply,
    Conflict(ConflictContext),
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Drives one bidirectional sync round per remote device: push, pull,
/// detect, resolve, commit.
///
/// Rounds for the same device are serialized twice over: a per-device
/// mutex fails fast, and the `IN_PROGRESS` status guards against a second
/// process. Pulled events only touch local state after both transport legs
/// completed; any failure in between lands the state in `Failed` with
/// nothing half-applied.
pub struct SyncOrchestrator {
    states: Arc<dyn SyncStateRepository>,
    conflicts: Arc<dyn ConflictRepository>,
    events: Arc<dyn EventStore>,
    scopes: Arc<dyn ScopeRepository>,
    aliases: Arc<dyn ScopeAliasRepository>,
    transport: Arc<dyn SyncTransport>,
    strategy: ResolutionStrategy,
    op_timeout: Duration,
    round_locks: Mutex<BTreeMap<DeviceId, Arc<Mutex<()>>>>,
}

impl SyncOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        states: Arc<dyn SyncStateRepository>,
        conflicts: Arc<dyn ConflictRepository>,
        events: Arc<dyn EventStore>,
        scopes: Arc<dyn ScopeRepository>,
        aliases: Arc<dyn ScopeAliasRepository>,
        transport: Arc<dyn SyncTransport>,
        strategy: ResolutionStrategy,
        op_timeout: Duration,
    ) -> Self {
        Self {
            states,
            conflicts,
            events,
            scopes,
            aliases,
            transport,
            strategy,
            op_timeout,
            round_locks: Mutex::new(BTreeMap::new()),
        }
    }

    /// Run one full sync round with `remote`.
    ///
    /// Returns `Ok` with a report for both successful and failed rounds;
    /// `Err` only when the round could not start (state violation or local
    /// storage trouble before `IN_PROGRESS` was entered).
    pub async fn sync_device(
        &self,
        remote: &DeviceId,
        cancel: CancellationToken,
    ) -> SyncResult<SyncReport> {
        let lock = {
            let mut locks = self.round_locks.lock().await;
            Arc::clone(locks.entry(remote.clone()).or_default())
        };
        let Ok(_guard) = lock.try_lock() else {
            return Err(sync_err(StateError::SyncInProgress {
                device: remote.clone(),
            }));
        };

        let state = self
            .states
            .find(remote)
            .await
            .map_err(|e| sync_err(CoreReason::Repo(e)))?
            .unwrap_or_else(|| SyncState::new(remote.clone()))
            .validated()
            .map_err(sync_err)?;

        let state = state.start_sync().map_err(sync_err)?;
        self.states
            .save(state.clone())
            .await
            .map_err(|e| sync_err(CoreReason::Repo(e)))?;
        sc_info!(sync, device = %remote, "sync round started");

        let since = state.remote_vector_clock().clone();
        match self.run_round(remote, &since, &cancel).await {
            Ok(outcome) => {
                let now = Utc::now();
                let next = state
                    .mark_sync_success(outcome.merged_clock, now)
                    .map_err(sync_err)?;
                self.states
                    .save(next)
                    .await
                    .map_err(|e| sync_err(CoreReason::Repo(e)))?;
                sc_info!(
                    sync,
                    device = %remote,
                    pushed = outcome.pushed,
                    pulled = outcome.pulled,
                    conflicts = outcome.conflicts_detected,
                    "sync round complete"
                );
                Ok(SyncReport {
                    device_id: remote.clone(),
                    status: SyncStatus::Success,
                    pushed: outcome.pushed,
                    pulled: outcome.pulled,
                    conflicts_detected: outcome.conflicts_detected,
                    conflicts_resolved: outcome.conflicts_resolved,
                    conflicts_deferred: outcome.conflicts_deferred,
                    failure: None,
                    finished_at: now,
                })
            }
            Err(round_err) => {
                let reason = round_err.failure_reason();
                let now = Utc::now();
                let next = state.mark_sync_failed().map_err(sync_err)?;
                self.states
                    .save(next)
                    .await
                    .map_err(|e| sync_err(CoreReason::Repo(e)))?;
                sc_warn!(sync, device = %remote, reason = ?reason, "sync round failed");
                Ok(SyncReport {
                    device_id: remote.clone(),
                    status: SyncStatus::Failed,
                    pushed: 0,
                    pulled: 0,
                    conflicts_detected: 0,
                    conflicts_resolved: 0,
                    conflicts_deferred: 0,
                    failure: Some(reason),
                    finished_at: now,
                })
            }
        }
    }

    // -- round body ---------------------------------------------------------

    async fn run_round(
        &self,
        remote: &DeviceId,
        since: &VectorClock,
        cancel: &CancellationToken,
    ) -> Result<RoundOutcome, RoundError> {
        // Push: everything the remote clock does not cover yet.
        let outgoing = self
            .events
            .events_ahead_of(since)
            .await
            .map_err(RoundError::Storage)?;
        let pushed = if outgoing.is_empty() {
            0
        } else {
            let acks = self
                .guarded(cancel, self.transport.send_events(remote, &outgoing))
                .await?;
            acks.len() as u32
        };

        // Pull. Nothing is applied until this also succeeded.
        let incoming = self
            .guarded(cancel, self.transport.receive_events(remote, since))
            .await?;

        let mut merged_clock = since.clone();
        let mut buffer: Vec<ConflictContext> = Vec::new();
        let mut pulled = 0u32;
        for record in incoming {
            if cancel.is_cancelled() {
                return Err(RoundError::Cancelled);
            }
            merged_clock = merged_clock.merge(&record.vector_clock);
            if self
                .events
                .contains(record.event_id)
                .await
                .map_err(RoundError::Storage)?
            {
                continue;
            }
            match self.classify(&record).await? {
                Ingest::Apply => {
                    self.apply_remote(&record).await?;
                    pulled += 1;
                }
                Ingest::Conflict(ctx) => buffer.push(ctx),
            }
        }

        // Resolve the buffer; whatever the strategy leaves open is
        // persisted as deferred work.
        let conflicts_detected = buffer.len() as u32;
        let resolved_batch = resolve_conflicts(buffer, self.strategy, Utc::now())
            .map_err(|_| RoundError::Conflict)?;
        let mut conflicts_resolved = 0u32;
        let mut conflicts_deferred = 0u32;
        let mut to_persist: Vec<SyncConflict> = Vec::with_capacity(resolved_batch.len());
        for resolved in resolved_batch {
            if resolved.conflict.resolution == Some(Resolution::Deferred) {
                conflicts_deferred += 1;
            } else {
                conflicts_resolved += 1;
            }
            if resolved.apply_remote {
                // The remote side of the conflict won; land its event.
                self.apply_remote(&resolved.remote).await?;
                pulled += 1;
            }
            to_persist.push(resolved.conflict);
        }
        self.conflicts
            .save_all(to_persist)
            .await
            .map_err(RoundError::Storage)?;

        Ok(RoundOutcome {
            pushed,
            pulled,
            conflicts_detected,
            conflicts_resolved,
            conflicts_deferred,
            merged_clock,
        })
    }

    /// Bound a transport call by the per-operation timeout and the round's
    /// cancellation token.
    async fn guarded<T>(
        &self,
        cancel: &CancellationToken,
        op: impl Future<Output = Result<T, TransportError>>,
    ) -> Result<T, RoundError> {
        tokio::select! {
            _ = cancel.cancelled() => Err(RoundError::Cancelled),
            out = tokio::time::timeout(self.op_timeout, op) => match out {
                Err(_) => Err(RoundError::Timeout),
                Ok(Ok(value)) => Ok(value),
                Ok(Err(e)) => Err(RoundError::Transport(e)),
            },
        }
    }

    // -- ingestion ----------------------------------------------------------

    /// Decide what to do with one incoming event: apply it, or open a
    /// conflict. Missing-dependency and deleted-modified conflicts are
    /// recognized here; causal ordering and version checks go through
    /// [`DetectParams::detect`].
    async fn classify(&self, record: &EventRecord) -> Result<Ingest, RoundError> {
        let exists = self
            .scopes
            .exists(record.aggregate_id)
            .await
            .map_err(RoundError::Storage)?;

        if matches!(record.payload, ScopeEvent::Created { .. }) && !exists {
            return Ok(Ingest::Apply);
        }

        if !exists {
            let history = self
                .events
                .events_for(record.aggregate_id, 0)
                .await
                .map_err(RoundError::Storage)?;
            let conflict_type = if history.iter().any(|e| e.payload.is_deletion()) {
                ConflictType::DeletedModified
            } else {
                ConflictType::MissingDependency
            };
            let head = history.last();
            let params = DetectParams {
                local_event_id: head.map(|e| e.event_id).unwrap_or(record.event_id),
                remote_event_id: record.event_id,
                aggregate_id: record.aggregate_id,
                local_version: head.map(|e| e.version).unwrap_or(0),
                remote_version: record.version,
                local_clock: head
                    .map(|e| e.vector_clock.clone())
                    .unwrap_or_default(),
                remote_clock: record.vector_clock.clone(),
            };
            return Ok(Ingest::Conflict(ConflictContext {
                conflict: SyncConflict::detected(params, conflict_type, Utc::now()),
                local: head.cloned(),
                remote: record.clone(),
            }));
        }

        let history = self
            .events
            .events_for(record.aggregate_id, 0)
            .await
            .map_err(RoundError::Storage)?;
        let head = history.last();
        let params = DetectParams {
            local_event_id: head.map(|e| e.event_id).unwrap_or(record.event_id),
            remote_event_id: record.event_id,
            aggregate_id: record.aggregate_id,
            local_version: head.map(|e| e.version).unwrap_or(0),
            remote_version: record.version,
            local_clock: head.map(|e| e.vector_clock.clone()).unwrap_or_default(),
            remote_clock: record.vector_clock.clone(),
        };
        match params.detect() {
            None => Ok(Ingest::Apply),
            Some(conflict_type) => Ok(Ingest::Conflict(ConflictContext {
                conflict: SyncConflict::detected(params, conflict_type, Utc::now()),
                local: head.cloned(),
                remote: record.clone(),
            })),
        }
    }

    /// Land a remote event: mutate the aggregate store, mirror the alias
    /// registry, and append the record to the local log.
    async fn apply_remote(&self, record: &EventRecord) -> Result<(), RoundError> {
        match &record.payload {
            ScopeEvent::Created { .. } => {
                if let Some(scope) = Scope::replay([&record.payload]) {
                    self.scopes
                        .save(scope)
                        .await
                        .map_err(RoundError::Storage)?;
                }
            }
            ScopeEvent::Deleted { .. } => {
                self.scopes
                    .delete(record.aggregate_id)
                    .await
                    .map_err(RoundError::Storage)?;
            }
            payload => {
                if let Some(mut scope) = self
                    .scopes
                    .find_by_id(record.aggregate_id)
                    .await
                    .map_err(RoundError::Storage)?
                {
                    scope.apply(payload);
                    self.scopes
                        .update(scope)
                        .await
                        .map_err(RoundError::Storage)?;
                }
            }
        }
        self.mirror_aliases(record).await;
        self.events
            .append(record.clone())
            .await
            .map_err(RoundError::Storage)
    }

    /// Best-effort alias-registry mirror of remote alias events. The
    /// registry is derived state; a miss here is logged, not fatal, and a
    /// later round converges it.
    async fn mirror_aliases(&self, record: &EventRecord) {
        let at = record.payload.at();
        let scope_id = record.aggregate_id;
        let result = match &record.payload {
            ScopeEvent::Created {
                canonical_alias, ..
            } => {
                self.aliases
                    .save(ScopeAlias::new(
                        scope_id,
                        canonical_alias.clone(),
                        AliasKind::Canonical,
                        at,
                    ))
                    .await
            }
            ScopeEvent::AliasAdded { name, kind, .. } => {
                self.aliases
                    .save(ScopeAlias::new(scope_id, name.clone(), *kind, at))
                    .await
            }
            ScopeEvent::AliasRemoved { name, .. } => {
                self.aliases.remove_by_name(name).await.map(|_| ())
            }
            ScopeEvent::AliasRenamed { old, new, .. } => self.aliases.rename(old, new).await,
            ScopeEvent::CanonicalReplaced { old, new, .. } => {
                self.swap_canonical(scope_id, old, new, at).await
            }
            ScopeEvent::Deleted { .. } => self.drop_aliases(scope_id).await,
            _ => Ok(()),
        };
        if let Err(e) = result {
            sc_warn!(store, scope = %scope_id, error = %e, "alias mirror lagging");
        }
    }

    async fn swap_canonical(
        &self,
        scope_id: scope_core::ScopeId,
        old: &scope_core::AliasName,
        new: &scope_core::AliasName,
        at: DateTime<Utc>,
    ) -> Result<(), RepoError> {
        if let Some(mut row) = self.aliases.find_by_name(old).await? {
            row.kind = AliasKind::Custom;
            row.updated_at = at;
            self.aliases.update(row).await?;
        }
        match self.aliases.find_by_name(new).await? {
            Some(mut row) => {
                row.kind = AliasKind::Canonical;
                row.updated_at = at;
                self.aliases.update(row).await
            }
            None => {
                self.aliases
                    .save(ScopeAlias::new(
                        scope_id,
                        new.clone(),
                        AliasKind::Canonical,
                        at,
                    ))
                    .await
            }
        }
    }

    async fn drop_aliases(&self, scope_id: scope_core::ScopeId) -> Result<(), RepoError> {
        for alias in self.aliases.find_by_scope(scope_id).await? {
            self.aliases.remove_by_name(&alias.name).await?;
        }
        Ok(())
    }
}
