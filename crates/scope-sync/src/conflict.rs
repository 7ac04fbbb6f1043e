use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use scope_core::scope::ScopeEvent;
use scope_core::{ConflictId, EventId, EventRecord, ScopeId, VectorClock};

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConflictType {
    ConcurrentModification,
    VersionMismatch,
    MissingDependency,
    DeletedModified,
    SchemaMismatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resolution {
    KeptLocal,
    AcceptedRemote,
    Merged,
    Deferred,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConflictError {
    #[error("conflict {id} is already resolved")]
    AlreadyResolved { id: ConflictId },
}

// ---------------------------------------------------------------------------
// Detection
// ---------------------------------------------------------------------------

/// Inputs for pairwise conflict detection between the local head of an
/// aggregate and one incoming remote event.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectParams {
    pub local_event_id: EventId,
    pub remote_event_id: EventId,
    pub aggregate_id: ScopeId,
    pub local_version: u64,
    pub remote_version: u64,
    pub local_clock: VectorClock,
    pub remote_clock: VectorClock,
}

impl DetectParams {
    /// Classify the pair. Causally ordered histories never conflict;
    /// concurrent clocks do; with comparable (equal) clocks a version
    /// divergence still does. Missing-dependency, deleted-modified and
    /// schema conflicts are recognized during event ingestion and passed
    /// to [`SyncConflict::detected`] directly.
    pub fn detect(&self) -> Option<ConflictType> {
        if self.local_clock.happened_before(&self.remote_clock)
            || self.remote_clock.happened_before(&self.local_clock)
        {
            return None;
        }
        if self.local_clock.is_concurrent_with(&self.remote_clock) {
            return Some(ConflictType::ConcurrentModification);
        }
        if self.local_version != self.remote_version {
            return Some(ConflictType::VersionMismatch);
        }
        None
    }
}

// ---------------------------------------------------------------------------
// SyncConflict
// ---------------------------------------------------------------------------

/// A recorded divergence between the local and remote event streams of one
/// aggregate. `resolution` and `resolved_at` are set together by
/// [`resolve`](Self::resolve) and never separately.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConflict {
    pub id: ConflictId,
    pub local_event_id: EventId,
    pub remote_event_id: EventId,
    pub aggregate_id: ScopeId,
    pub local_version: u64,
    pub remote_version: u64,
    pub local_vector_clock: VectorClock,
    pub remote_vector_clock: VectorClock,
    pub conflict_type: ConflictType,
    pub detected_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolution: Option<Resolution>,
}

impl SyncConflict {
    /// Record a detected conflict. `now` is injected so tests control time.
    pub fn detected(
        params: DetectParams,
        conflict_type: ConflictType,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ConflictId::generate(),
            local_event_id: params.local_event_id,
            remote_event_id: params.remote_event_id,
            aggregate_id: params.aggregate_id,
            local_version: params.local_version,
            remote_version: params.remote_version,
            local_vector_clock: params.local_clock,
            remote_vector_clock: params.remote_clock,
            conflict_type,
            detected_at: now,
            resolved_at: None,
            resolution: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.resolution.is_none()
    }

    /// Whether this record represents an actual divergence. Concurrent
    /// modification is only real when the clocks are genuinely concurrent;
    /// every other type is real by construction.
    pub fn is_true_conflict(&self) -> bool {
        match self.conflict_type {
            ConflictType::ConcurrentModification => self
                .local_vector_clock
                .is_concurrent_with(&self.remote_vector_clock),
            _ => true,
        }
    }

    pub fn severity(&self) -> Severity {
        match self.conflict_type {
            ConflictType::MissingDependency => Severity::Critical,
            ConflictType::VersionMismatch => {
                if self.local_version.abs_diff(self.remote_version) > 1 {
                    Severity::High
                } else {
                    Severity::Low
                }
            }
            ConflictType::ConcurrentModification => Severity::Medium,
            _ => Severity::Low,
        }
    }

    /// What the causal order suggests; anything genuinely ambiguous defers
    /// to manual resolution.
    pub fn suggest_resolution(&self) -> Resolution {
        if self
            .local_vector_clock
            .happened_before(&self.remote_vector_clock)
        {
            return Resolution::AcceptedRemote;
        }
        if self
            .remote_vector_clock
            .happened_before(&self.local_vector_clock)
        {
            return Resolution::KeptLocal;
        }
        Resolution::Deferred
    }

    /// Close the conflict with `action`. Only pending conflicts resolve;
    /// the timestamp pair stays consistent with `detected_at`.
    pub fn resolve(self, action: Resolution, now: DateTime<Utc>) -> Result<Self, ConflictError> {
        if !self.is_pending() {
            return Err(ConflictError::AlreadyResolved { id: self.id });
        }
        // Keep `resolved_at >= detected_at` modulo 1s of skew.
        let resolved_at = now.max(self.detected_at - Duration::seconds(1));
        Ok(Self {
            resolution: Some(action),
            resolved_at: Some(resolved_at),
            ..self
        })
    }

    pub fn defer(self, now: DateTime<Utc>) -> Result<Self, ConflictError> {
        self.resolve(Resolution::Deferred, now)
    }

    pub fn merge(self, now: DateTime<Utc>) -> Result<Self, ConflictError> {
        self.resolve(Resolution::Merged, now)
    }
}

// ---------------------------------------------------------------------------
// Batch resolution strategies
// ---------------------------------------------------------------------------

/// Policy applied to a round's conflict buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResolutionStrategy {
    LastWriteWins,
    KeepLocal,
    KeepRemote,
    Manual,
    Merge,
}

/// A conflict waiting for strategy resolution, carrying the event records
/// it was detected between. `local` is absent for missing-dependency
/// conflicts, where no local counterpart exists.
#[derive(Debug, Clone)]
pub struct ConflictContext {
    pub conflict: SyncConflict,
    pub local: Option<EventRecord>,
    pub remote: EventRecord,
}

/// Outcome for one conflict: the closed (or deferred) record, whether the
/// remote event should be applied to local state, and that remote event.
#[derive(Debug, Clone)]
pub struct ResolvedConflict {
    pub conflict: SyncConflict,
    pub apply_remote: bool,
    pub remote: EventRecord,
}

/// Apply `strategy` to a conflict buffer. Deferred outcomes stay pending
/// work: they are persisted by the caller, never applied.
pub fn resolve_conflicts(
    buffer: Vec<ConflictContext>,
    strategy: ResolutionStrategy,
    now: DateTime<Utc>,
) -> Result<Vec<ResolvedConflict>, ConflictError> {
    buffer
        .into_iter()
        .map(|ctx| resolve_one(ctx, strategy, now))
        .collect()
}

fn resolve_one(
    ctx: ConflictContext,
    strategy: ResolutionStrategy,
    now: DateTime<Utc>,
) -> Result<ResolvedConflict, ConflictError> {
    let ConflictContext {
        conflict,
        local,
        remote,
    } = ctx;

    // Structural conflicts (missing dependency, deleted-modified, schema)
    // and conflicts with no local counterpart are never auto-resolved.
    let structural = !matches!(
        conflict.conflict_type,
        ConflictType::ConcurrentModification | ConflictType::VersionMismatch
    );
    let (action, apply_remote) = match local {
        None => (Resolution::Deferred, false),
        Some(_) if structural => (Resolution::Deferred, false),
        Some(local) => match strategy {
            ResolutionStrategy::KeepLocal => (Resolution::KeptLocal, false),
            ResolutionStrategy::KeepRemote => (Resolution::AcceptedRemote, true),
            ResolutionStrategy::Manual => (Resolution::Deferred, false),
            ResolutionStrategy::LastWriteWins => {
                if remote_wins(&local, &remote) {
                    (Resolution::AcceptedRemote, true)
                } else {
                    (Resolution::KeptLocal, false)
                }
            }
            ResolutionStrategy::Merge => match merge_decision(&local, &remote) {
                Some(apply_remote) => (Resolution::Merged, apply_remote),
                None => (Resolution::Deferred, false),
            },
        },
    };

    Ok(ResolvedConflict {
        conflict: conflict.resolve(action, now)?,
        apply_remote,
        remote,
    })
}

/// Last-write-wins order: later `recorded_at` wins; a tie goes to the
/// lexicographically greater origin device so both sides decide alike.
fn remote_wins(local: &EventRecord, remote: &EventRecord) -> bool {
    match remote.recorded_at.cmp(&local.recorded_at) {
        std::cmp::Ordering::Greater => true,
        std::cmp::Ordering::Less => false,
        std::cmp::Ordering::Equal => remote.origin > local.origin,
    }
}

/// Aspect maps are the one mergeable aggregate part: key-union with
/// per-key last-write-wins. Returns `Some(apply_remote)` when both events
/// are aspect writes, `None` when the pair is not mergeable.
fn merge_decision(local: &EventRecord, remote: &EventRecord) -> Option<bool> {
    let (ScopeEvent::AspectSet { key: local_key, .. }, ScopeEvent::AspectSet { key: remote_key, .. }) =
        (&local.payload, &remote.payload)
    else {
        return None;
    };
    if local_key != remote_key {
        // Disjoint keys union cleanly; the remote write lands as-is.
        return Some(true);
    }
    Some(remote_wins(local, remote))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use scope_core::DeviceId;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap()
    }

    fn clock(entries: &[(&str, u64)]) -> VectorClock {
        entries
            .iter()
            .map(|(d, n)| (DeviceId::parse(d).unwrap(), *n))
            .collect()
    }

    fn params(
        local_version: u64,
        remote_version: u64,
        local_clock: VectorClock,
        remote_clock: VectorClock,
    ) -> DetectParams {
        DetectParams {
            local_event_id: EventId::generate(),
            remote_event_id: EventId::generate(),
            aggregate_id: ScopeId::generate(),
            local_version,
            remote_version,
            local_clock,
            remote_clock,
        }
    }

    #[test]
    fn concurrent_clocks_yield_a_medium_concurrent_conflict() {
        let p = params(2, 3, clock(&[("a", 5), ("b", 2)]), clock(&[("a", 3), ("b", 4)]));
        let detected = p.detect().unwrap();
        assert_eq!(detected, ConflictType::ConcurrentModification);

        let conflict = SyncConflict::detected(p, detected, now());
        assert!(conflict.is_true_conflict());
        assert_eq!(conflict.severity(), Severity::Medium);
        assert_eq!(conflict.suggest_resolution(), Resolution::Deferred);
    }

    #[test]
    fn causally_ordered_histories_do_not_conflict() {
        let p = params(2, 3, clock(&[("a", 3)]), clock(&[("a", 5), ("b", 2)]));
        assert_eq!(p.detect(), None);
        let reverse = params(3, 2, clock(&[("a", 5), ("b", 2)]), clock(&[("a", 3)]));
        assert_eq!(reverse.detect(), None);
    }

    #[test]
    fn equal_clocks_with_diverged_versions_mismatch() {
        let c = clock(&[("a", 4)]);
        let p = params(2, 5, c.clone(), c.clone());
        assert_eq!(p.detect(), Some(ConflictType::VersionMismatch));

        let conflict = SyncConflict::detected(p, ConflictType::VersionMismatch, now());
        // |2 - 5| > 1.
        assert_eq!(conflict.severity(), Severity::High);
        let near = SyncConflict::detected(
            params(2, 3, c.clone(), c.clone()),
            ConflictType::VersionMismatch,
            now(),
        );
        assert_eq!(near.severity(), Severity::Low);

        let same = params(4, 4, c.clone(), c);
        assert_eq!(same.detect(), None);
    }

    #[test]
    fn suggestions_follow_causal_order() {
        let behind = SyncConflict::detected(
            params(1, 2, clock(&[("a", 1)]), clock(&[("a", 3)])),
            ConflictType::VersionMismatch,
            now(),
        );
        assert_eq!(behind.suggest_resolution(), Resolution::AcceptedRemote);

        let ahead = SyncConflict::detected(
            params(2, 1, clock(&[("a", 3)]), clock(&[("a", 1)])),
            ConflictType::VersionMismatch,
            now(),
        );
        assert_eq!(ahead.suggest_resolution(), Resolution::KeptLocal);
    }

    #[test]
    fn missing_dependency_is_critical() {
        let conflict = SyncConflict::detected(
            params(0, 1, VectorClock::new(), clock(&[("b", 1)])),
            ConflictType::MissingDependency,
            now(),
        );
        assert_eq!(conflict.severity(), Severity::Critical);
        assert!(conflict.is_true_conflict());
        assert_eq!(conflict.suggest_resolution(), Resolution::AcceptedRemote);
    }

    #[test]
    fn resolving_twice_is_rejected() {
        let conflict = SyncConflict::detected(
            params(2, 3, clock(&[("a", 5), ("b", 2)]), clock(&[("a", 3), ("b", 4)])),
            ConflictType::ConcurrentModification,
            now(),
        );
        let resolved = conflict.resolve(Resolution::KeptLocal, now()).unwrap();
        assert!(!resolved.is_pending());
        assert_eq!(resolved.resolution, Some(Resolution::KeptLocal));
        assert_eq!(resolved.resolved_at, Some(now()));
        assert!(matches!(
            resolved.resolve(Resolution::AcceptedRemote, now()),
            Err(ConflictError::AlreadyResolved { .. })
        ));
    }

    #[test]
    fn resolved_at_never_precedes_detection_beyond_skew() {
        let conflict = SyncConflict::detected(
            params(2, 3, clock(&[("a", 5), ("b", 2)]), clock(&[("a", 3), ("b", 4)])),
            ConflictType::ConcurrentModification,
            now(),
        );
        let back_dated = conflict.resolve(Resolution::Deferred, now() - Duration::hours(1)).unwrap();
        assert_eq!(back_dated.resolved_at, Some(now() - Duration::seconds(1)));
    }

    // -- strategies ---------------------------------------------------------

    fn record(device: &str, at: DateTime<Utc>, payload: ScopeEvent) -> EventRecord {
        EventRecord {
            event_id: EventId::generate(),
            aggregate_id: ScopeId::generate(),
            version: 2,
            vector_clock: clock(&[(device, 2)]),
            payload,
            recorded_at: at,
            origin: DeviceId::parse(device).unwrap(),
        }
    }

    fn context(local: EventRecord, remote: EventRecord) -> ConflictContext {
        let p = DetectParams {
            local_event_id: local.event_id,
            remote_event_id: remote.event_id,
            aggregate_id: local.aggregate_id,
            local_version: local.version,
            remote_version: remote.version,
            local_clock: local.vector_clock.clone(),
            remote_clock: remote.vector_clock.clone(),
        };
        ConflictContext {
            conflict: SyncConflict::detected(p, ConflictType::ConcurrentModification, now()),
            local: Some(local),
            remote,
        }
    }

    fn title_event(at: DateTime<Utc>) -> ScopeEvent {
        ScopeEvent::TitleChanged {
            title: scope_core::ScopeTitle::parse("t").unwrap(),
            at,
        }
    }

    fn aspect_event(key: &str, at: DateTime<Utc>) -> ScopeEvent {
        ScopeEvent::AspectSet {
            key: scope_core::AspectKey::parse(key).unwrap(),
            values: vec![scope_core::AspectValue::parse("v").unwrap()],
            at,
        }
    }

    #[test]
    fn last_write_wins_by_timestamp_then_device() {
        let older = record("a", now(), title_event(now()));
        let newer = record("b", now() + Duration::seconds(5), title_event(now()));
        let out = resolve_conflicts(
            vec![context(older.clone(), newer.clone())],
            ResolutionStrategy::LastWriteWins,
            now(),
        )
        .unwrap();
        assert!(out[0].apply_remote);
        assert_eq!(out[0].conflict.resolution, Some(Resolution::AcceptedRemote));

        // Tie: the greater device id wins.
        let tie_local = record("b", now(), title_event(now()));
        let tie_remote = record("a", now(), title_event(now()));
        let out = resolve_conflicts(
            vec![context(tie_local, tie_remote)],
            ResolutionStrategy::LastWriteWins,
            now(),
        )
        .unwrap();
        assert!(!out[0].apply_remote);
        assert_eq!(out[0].conflict.resolution, Some(Resolution::KeptLocal));
    }

    #[test]
    fn keep_local_keep_remote_and_manual() {
        let make = || context(record("a", now(), title_event(now())), record("b", now(), title_event(now())));

        let kept = resolve_conflicts(vec![make()], ResolutionStrategy::KeepLocal, now()).unwrap();
        assert!(!kept[0].apply_remote);

        let taken = resolve_conflicts(vec![make()], ResolutionStrategy::KeepRemote, now()).unwrap();
        assert!(taken[0].apply_remote);

        let manual = resolve_conflicts(vec![make()], ResolutionStrategy::Manual, now()).unwrap();
        assert!(!manual[0].apply_remote);
        assert_eq!(manual[0].conflict.resolution, Some(Resolution::Deferred));
    }

    #[test]
    fn merge_unions_disjoint_aspect_keys() {
        let local = record("a", now(), aspect_event("priority", now()));
        let remote = record("b", now(), aspect_event("status", now()));
        let out =
            resolve_conflicts(vec![context(local, remote)], ResolutionStrategy::Merge, now())
                .unwrap();
        assert!(out[0].apply_remote);
        assert_eq!(out[0].conflict.resolution, Some(Resolution::Merged));
    }

    #[test]
    fn merge_same_key_takes_the_later_write() {
        let local = record("a", now() + Duration::seconds(5), aspect_event("priority", now()));
        let remote = record("b", now(), aspect_event("priority", now()));
        let out =
            resolve_conflicts(vec![context(local, remote)], ResolutionStrategy::Merge, now())
                .unwrap();
        assert!(!out[0].apply_remote);
        assert_eq!(out[0].conflict.resolution, Some(Resolution::Merged));
    }

    #[test]
    fn structural_conflicts_always_defer() {
        let remote = record("b", now(), title_event(now()));
        let p = DetectParams {
            local_event_id: remote.event_id,
            remote_event_id: remote.event_id,
            aggregate_id: remote.aggregate_id,
            local_version: 0,
            remote_version: remote.version,
            local_clock: VectorClock::new(),
            remote_clock: remote.vector_clock.clone(),
        };
        let ctx = ConflictContext {
            conflict: SyncConflict::detected(p, ConflictType::MissingDependency, now()),
            local: None,
            remote,
        };
        // Even an eager strategy cannot auto-resolve a structural conflict.
        let out = resolve_conflicts(vec![ctx], ResolutionStrategy::KeepRemote, now()).unwrap();
        assert!(!out[0].apply_remote);
        assert_eq!(out[0].conflict.resolution, Some(Resolution::Deferred));
    }

    #[test]
    fn merge_defers_non_aspect_pairs() {
        let local = record("a", now(), title_event(now()));
        let remote = record("b", now(), aspect_event("priority", now()));
        let out =
            resolve_conflicts(vec![context(local, remote)], ResolutionStrategy::Merge, now())
                .unwrap();
        assert!(!out[0].apply_remote);
        assert_eq!(out[0].conflict.resolution, Some(Resolution::Deferred));
    }
}
