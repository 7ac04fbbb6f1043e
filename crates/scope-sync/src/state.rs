use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use scope_core::{DeviceId, VectorClock};

/// Upper bound on the queued-change counter.
pub const MAX_PENDING_CHANGES: u32 = 1_000_000;

/// Tolerance when checking persisted timestamps against each other.
const CLOCK_SKEW_TOLERANCE_SECS: i64 = 1;

// ---------------------------------------------------------------------------
// Status & failures
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncStatus {
    NeverSynced,
    InProgress,
    Success,
    Failed,
    Offline,
}

/// Violation of the sync state machine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateError {
    #[error("sync state cannot {event} while {from:?}")]
    InvalidTransition {
        from: SyncStatus,
        event: &'static str,
    },
    #[error("a sync round for device {device} is already in progress")]
    SyncInProgress { device: DeviceId },
    #[error("pending-change increment must be positive")]
    ZeroIncrement,
    #[error("persisted sync state for {device} is inconsistent: {detail}")]
    Corrupt { device: DeviceId, detail: String },
}

// ---------------------------------------------------------------------------
// SyncState
// ---------------------------------------------------------------------------

/// Per-remote-device synchronization lifecycle.
///
/// Values are immutable; every transition consumes the state and returns
/// the successor, or a [`StateError`] when the transition is not in the
/// machine:
///
/// ```text
/// NEVER_SYNCED ──startSync──▶ IN_PROGRESS ──success──▶ SUCCESS
///   SUCCESS/FAILED ─startSync─▶ IN_PROGRESS ──failed───▶ FAILED
///   any ──markOffline──▶ OFFLINE ──markOnline──▶ NEVER_SYNCED | SUCCESS
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncState {
    device_id: DeviceId,
    last_sync_at: Option<DateTime<Utc>>,
    remote_vector_clock: VectorClock,
    last_successful_push: Option<DateTime<Utc>>,
    last_successful_pull: Option<DateTime<Utc>>,
    status: SyncStatus,
    pending_changes: u32,
}

impl SyncState {
    /// Fresh state for a device we have never exchanged events with.
    pub fn new(device_id: DeviceId) -> Self {
        Self {
            device_id,
            last_sync_at: None,
            remote_vector_clock: VectorClock::new(),
            last_successful_push: None,
            last_successful_pull: None,
            status: SyncStatus::NeverSynced,
            pending_changes: 0,
        }
    }

    // -- accessors ----------------------------------------------------------

    pub fn device_id(&self) -> &DeviceId {
        &self.device_id
    }

    pub fn status(&self) -> SyncStatus {
        self.status
    }

    pub fn last_sync_at(&self) -> Option<DateTime<Utc>> {
        self.last_sync_at
    }

    pub fn remote_vector_clock(&self) -> &VectorClock {
        &self.remote_vector_clock
    }

    pub fn last_successful_push(&self) -> Option<DateTime<Utc>> {
        self.last_successful_push
    }

    pub fn last_successful_pull(&self) -> Option<DateTime<Utc>> {
        self.last_successful_pull
    }

    pub fn pending_changes(&self) -> u32 {
        self.pending_changes
    }

    // -- derived ------------------------------------------------------------

    pub fn can_sync(&self) -> bool {
        !matches!(self.status, SyncStatus::InProgress | SyncStatus::Offline)
    }

    pub fn needs_sync(&self) -> bool {
        self.can_sync() && (self.pending_changes > 0 || self.status == SyncStatus::Failed)
    }

    pub fn is_stale(&self, threshold: Duration, now: DateTime<Utc>) -> bool {
        match self.last_sync_at {
            None => true,
            Some(at) => now - at > threshold,
        }
    }

    // -- transitions --------------------------------------------------------

    pub fn start_sync(self) -> Result<Self, StateError> {
        match self.status {
            SyncStatus::NeverSynced | SyncStatus::Success | SyncStatus::Failed => Ok(Self {
                status: SyncStatus::InProgress,
                ..self
            }),
            SyncStatus::InProgress => Err(StateError::SyncInProgress {
                device: self.device_id,
            }),
            SyncStatus::Offline => Err(StateError::InvalidTransition {
                from: self.status,
                event: "start a sync round",
            }),
        }
    }

    pub fn mark_sync_success(
        self,
        merged_remote_clock: VectorClock,
        now: DateTime<Utc>,
    ) -> Result<Self, StateError> {
        if self.status != SyncStatus::InProgress {
            return Err(StateError::InvalidTransition {
                from: self.status,
                event: "complete a sync round",
            });
        }
        Ok(Self {
            status: SyncStatus::Success,
            last_sync_at: Some(now),
            last_successful_push: Some(now),
            last_successful_pull: Some(now),
            remote_vector_clock: merged_remote_clock,
            pending_changes: 0,
            ..self
        })
    }

    pub fn mark_sync_failed(self) -> Result<Self, StateError> {
        if self.status != SyncStatus::InProgress {
            return Err(StateError::InvalidTransition {
                from: self.status,
                event: "fail a sync round",
            });
        }
        Ok(Self {
            status: SyncStatus::Failed,
            ..self
        })
    }

    /// Any state may go offline; the rest of the record is kept for the
    /// return trip.
    pub fn mark_offline(self) -> Self {
        Self {
            status: SyncStatus::Offline,
            ..self
        }
    }

    /// Return from offline: back to `Success` when we have synced before,
    /// `NeverSynced` otherwise.
    pub fn mark_online(self) -> Result<Self, StateError> {
        if self.status != SyncStatus::Offline {
            return Err(StateError::InvalidTransition {
                from: self.status,
                event: "come back online",
            });
        }
        let status = if self.last_sync_at.is_some() {
            SyncStatus::Success
        } else {
            SyncStatus::NeverSynced
        };
        Ok(Self { status, ..self })
    }

    /// Record `n` new local changes awaiting the next round; the counter
    /// saturates at [`MAX_PENDING_CHANGES`].
    pub fn increment_pending(self, n: u32) -> Result<Self, StateError> {
        if n == 0 {
            return Err(StateError::ZeroIncrement);
        }
        Ok(Self {
            pending_changes: self
                .pending_changes
                .saturating_add(n)
                .min(MAX_PENDING_CHANGES),
            ..self
        })
    }

    /// Re-validate a state loaded from storage: the push/pull stamps may
    /// not run ahead of `last_sync_at` beyond clock-skew tolerance.
    pub fn validated(self) -> Result<Self, StateError> {
        let limit = self
            .last_sync_at
            .map(|at| at + Duration::seconds(CLOCK_SKEW_TOLERANCE_SECS));
        for (label, stamp) in [
            ("last_successful_push", self.last_successful_push),
            ("last_successful_pull", self.last_successful_pull),
        ] {
            if let Some(stamp) = stamp
                && limit.is_none_or(|limit| stamp > limit)
            {
                return Err(StateError::Corrupt {
                    device: self.device_id.clone(),
                    detail: format!("{label} {stamp} is ahead of last_sync_at"),
                });
            }
        }
        Ok(self)
    }
}
