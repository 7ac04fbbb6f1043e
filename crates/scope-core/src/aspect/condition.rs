use serde::{Deserialize, Serialize};

use super::AspectMap;
use crate::value::{AspectKey, AspectValue};

// ---------------------------------------------------------------------------
// Conditional predicates over a scope's other aspects
// ---------------------------------------------------------------------------

/// Predicate evaluated against a scope's aspect map, used to gate
/// `Required` and `Forbidden` rules on the presence or value of *other*
/// aspects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AspectCondition {
    /// True when at least one value under `key` equals `value`.
    Equals { key: AspectKey, value: AspectValue },
    /// True when `key` is present with at least one value.
    Exists { key: AspectKey },
    And(Vec<AspectCondition>),
    Or(Vec<AspectCondition>),
    Not(Box<AspectCondition>),
}

impl AspectCondition {
    pub fn matches(&self, aspects: &AspectMap) -> bool {
        match self {
            Self::Equals { key, value } => aspects
                .get(key)
                .is_some_and(|values| values.contains(value)),
            Self::Exists { key } => aspects.get(key).is_some_and(|values| !values.is_empty()),
            Self::And(all) => all.iter().all(|c| c.matches(aspects)),
            Self::Or(any) => any.iter().any(|c| c.matches(aspects)),
            Self::Not(inner) => !inner.matches(aspects),
        }
    }
}
