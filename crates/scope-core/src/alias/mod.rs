mod generate;
mod service;

#[cfg(test)]
mod tests;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{AliasId, ScopeId};
use crate::value::AliasName;

pub use generate::{MAX_GENERATION_RETRIES, generate_alias_name};
pub use service::AliasService;

// ---------------------------------------------------------------------------
// Alias records
// ---------------------------------------------------------------------------

/// Whether an alias is the scope's single primary name or an extra one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AliasKind {
    Canonical,
    Custom,
}

/// One alias row: a globally unique name bound to a scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopeAlias {
    pub id: AliasId,
    pub scope_id: ScopeId,
    pub name: AliasName,
    pub kind: AliasKind,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ScopeAlias {
    pub fn new(
        scope_id: ScopeId,
        name: AliasName,
        kind: AliasKind,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: AliasId::generate(),
            scope_id,
            name,
            kind,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_canonical(&self) -> bool {
        self.kind == AliasKind::Canonical
    }
}

/// Legal kind changes for an existing alias row.
///
/// A canonical alias never silently degrades: demotion happens only through
/// `replace_canonical`, which installs the successor in the same operation.
pub fn is_valid_kind_transition(old: Option<AliasKind>, new: AliasKind) -> bool {
    match (old, new) {
        (None, _) => true,
        (Some(AliasKind::Canonical), AliasKind::Custom) => false,
        (Some(from), to) => from == to || (from == AliasKind::Custom && to == AliasKind::Canonical),
    }
}

// ---------------------------------------------------------------------------
// Failures
// ---------------------------------------------------------------------------

/// Business-rule failure in alias management.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AliasError {
    #[error("alias {name:?} already names scope {existing}")]
    Duplicate {
        name: AliasName,
        existing: ScopeId,
        attempted: ScopeId,
    },
    #[error("no alias named {name:?}")]
    NotFound { name: AliasName },
    #[error("alias {name:?} is canonical and can only be replaced, not removed")]
    CannotRemoveCanonical { name: AliasName },
    #[error("could not generate a unique alias after {attempts} attempts")]
    GenerationFailed { attempts: u32 },
    #[error("alias kind may not change from {from:?} to {to:?}")]
    InvalidTransition { from: AliasKind, to: AliasKind },
    #[error("scope {scope} has no canonical alias")]
    NoCanonical { scope: ScopeId },
}
