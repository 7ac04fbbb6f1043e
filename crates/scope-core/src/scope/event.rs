use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::alias::AliasKind;
use crate::ids::ScopeId;
use crate::value::{AliasName, AspectKey, AspectValue, ScopeDescription, ScopeTitle};

// ---------------------------------------------------------------------------
// Scope domain events
// ---------------------------------------------------------------------------

/// Every mutation of a scope aggregate, as appended to the event log.
///
/// `Created` is always the first event of an aggregate; replaying the full
/// sequence reproduces the aggregate state exactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ScopeEvent {
    Created {
        id: ScopeId,
        parent_id: Option<ScopeId>,
        title: ScopeTitle,
        description: Option<ScopeDescription>,
        canonical_alias: AliasName,
        at: DateTime<Utc>,
    },
    TitleChanged {
        title: ScopeTitle,
        at: DateTime<Utc>,
    },
    DescriptionChanged {
        description: Option<ScopeDescription>,
        at: DateTime<Utc>,
    },
    AspectSet {
        key: AspectKey,
        values: Vec<AspectValue>,
        at: DateTime<Utc>,
    },
    AspectRemoved {
        key: AspectKey,
        at: DateTime<Utc>,
    },
    Moved {
        new_parent: Option<ScopeId>,
        at: DateTime<Utc>,
    },
    AliasAdded {
        name: AliasName,
        kind: AliasKind,
        at: DateTime<Utc>,
    },
    AliasRemoved {
        name: AliasName,
        at: DateTime<Utc>,
    },
    AliasRenamed {
        old: AliasName,
        new: AliasName,
        at: DateTime<Utc>,
    },
    CanonicalReplaced {
        old: AliasName,
        new: AliasName,
        at: DateTime<Utc>,
    },
    Deleted {
        at: DateTime<Utc>,
    },
}

impl ScopeEvent {
    /// Event timestamp, regardless of variant.
    pub fn at(&self) -> DateTime<Utc> {
        match self {
            Self::Created { at, .. }
            | Self::TitleChanged { at, .. }
            | Self::DescriptionChanged { at, .. }
            | Self::AspectSet { at, .. }
            | Self::AspectRemoved { at, .. }
            | Self::Moved { at, .. }
            | Self::AliasAdded { at, .. }
            | Self::AliasRemoved { at, .. }
            | Self::AliasRenamed { at, .. }
            | Self::CanonicalReplaced { at, .. }
            | Self::Deleted { at } => *at,
        }
    }

    pub fn is_deletion(&self) -> bool {
        matches!(self, Self::Deleted { .. })
    }
}
