mod condition;
mod definition;
mod duration;
mod entry;
mod filter_eval;
mod rule;


use std::collections::BTreeMap;

use crate::value::{AspectKey, AspectValue, ValueError};

pub use condition::AspectCondition;
pub use definition::{AspectDefinition, AspectType, DefinitionLookup};
pub use duration::{IsoDuration, IsoDurationError};
pub use entry::parse_aspect_entry;
pub use filter_eval::evaluate;
pub use rule::{AspectRule, CustomFn, CustomPredicates};

/// A scope's metadata: each key carries a non-empty, order-preserving list
/// of values. Whether more than one value is legal is decided by the key's
/// [`AspectDefinition`].
pub type AspectMap = BTreeMap<AspectKey, Vec<AspectValue>>;

// ---------------------------------------------------------------------------
// Validation failures
// ---------------------------------------------------------------------------

/// Failure of typed aspect validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AspectError {
    #[error("aspect {key:?}: {value:?} is not a number")]
    InvalidNumeric { key: String, value: String },
    #[error("aspect {key:?}: {value:?} is not a boolean (true/false/yes/no/1/0)")]
    InvalidBoolean { key: String, value: String },
    #[error("aspect {key:?}: {value:?} is not an ISO-8601 duration")]
    InvalidDuration { key: String, value: String },
    #[error("aspect {key:?}: {value:?} is not one of the allowed values")]
    ValueNotAllowed { key: String, value: String },
    #[error("aspect {key:?} does not allow multiple values (got {count})")]
    MultipleNotAllowed { key: String, count: usize },
    #[error("aspect {key:?} is required: {message}")]
    RequiredMissing { key: String, message: String },
    #[error("aspect {key:?} is forbidden here: {message}")]
    ForbiddenPresent { key: String, message: String },
    #[error("aspect {key:?}: {message}")]
    RuleViolation { key: String, message: String },
    #[error("aspect {key:?}: no custom predicate named {name:?} is registered")]
    UnknownPredicate { key: String, name: String },
    #[error("invalid aspect entry {entry:?}: expected key:value or key=value")]
    EntryFormat { entry: String },
    #[error("invalid aspect entry {entry:?}: {source}")]
    EntryValue {
        entry: String,
        #[source]
        source: ValueError,
    },
}
