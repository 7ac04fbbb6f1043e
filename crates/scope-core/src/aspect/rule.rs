use std::collections::BTreeMap;
use std::sync::Arc;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::condition::AspectCondition;
use super::{AspectError, AspectMap};
use crate::value::{AspectValue, ValueError};

// ---------------------------------------------------------------------------
// Custom predicate registry
// ---------------------------------------------------------------------------

pub type CustomFn = Arc<dyn Fn(&AspectValue) -> bool + Send + Sync>;

/// Named caller-supplied predicates for [`AspectRule::Custom`].
///
/// Rules reference predicates by name so definitions stay serializable and
/// comparable; the registry travels alongside them at validation time.
#[derive(Default, Clone)]
pub struct CustomPredicates(BTreeMap<String, CustomFn>);

impl CustomPredicates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        name: impl Into<String>,
        predicate: impl Fn(&AspectValue) -> bool + Send + Sync + 'static,
    ) {
        self.0.insert(name.into(), Arc::new(predicate));
    }

    pub fn get(&self, name: &str) -> Option<&CustomFn> {
        self.0.get(name)
    }
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

/// A conditional validation rule attached to an aspect definition.
///
/// `Required` and `Forbidden` look at the whole value list and are gated by
/// a condition over the scope's *other* aspects; `Range`, `Pattern` and
/// `Custom` apply to each value element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AspectRule {
    /// Numeric bounds, inclusive on both ends. A non-numeric value fails.
    Range {
        min: Option<f64>,
        max: Option<f64>,
        message: String,
    },
    /// Regex applied to the raw value string.
    Pattern { pattern: String, message: String },
    /// The aspect must be present when `condition` holds.
    Required {
        condition: AspectCondition,
        message: String,
    },
    /// The aspect must be absent when `condition` holds.
    Forbidden {
        condition: AspectCondition,
        message: String,
    },
    /// Caller-supplied predicate, resolved by name through
    /// [`CustomPredicates`].
    Custom { name: String, message: String },
}

impl AspectRule {
    /// Build a pattern rule, validating the regex up front.
    pub fn pattern(pattern: &str, message: impl Into<String>) -> Result<Self, ValueError> {
        Regex::new(pattern).map_err(|_| ValueError::InvalidFormat {
            field: "aspect rule pattern",
            value: pattern.to_string(),
        })?;
        Ok(Self::Pattern {
            pattern: pattern.to_string(),
            message: message.into(),
        })
    }

    /// Evaluate this rule for an aspect under `key` carrying `values`
    /// (empty when the aspect is absent), in the context of the scope's
    /// other aspects.
    pub fn evaluate(
        &self,
        key: &str,
        values: &[AspectValue],
        others: &AspectMap,
        customs: &CustomPredicates,
    ) -> Result<(), AspectError> {
        match self {
            Self::Required { condition, message } => {
                if values.is_empty() && condition.matches(others) {
                    return Err(AspectError::RequiredMissing {
                        key: key.to_string(),
                        message: message.clone(),
                    });
                }
                Ok(())
            }
            Self::Forbidden { condition, message } => {
                if !values.is_empty() && condition.matches(others) {
                    return Err(AspectError::ForbiddenPresent {
                        key: key.to_string(),
                        message: message.clone(),
                    });
                }
                Ok(())
            }
            Self::Range { min, max, message } => {
                for value in values {
                    let Ok(number) = value.as_str().parse::<f64>() else {
                        return Err(AspectError::RuleViolation {
                            key: key.to_string(),
                            message: message.clone(),
                        });
                    };
                    let below = min.is_some_and(|m| number < m);
                    let above = max.is_some_and(|m| number > m);
                    if !number.is_finite() || below || above {
                        return Err(AspectError::RuleViolation {
                            key: key.to_string(),
                            message: message.clone(),
                        });
                    }
                }
                Ok(())
            }
            Self::Pattern { pattern, message } => {
                let Ok(regex) = Regex::new(pattern) else {
                    return Err(AspectError::RuleViolation {
                        key: key.to_string(),
                        message: message.clone(),
                    });
                };
                for value in values {
                    if !regex.is_match(value.as_str()) {
                        return Err(AspectError::RuleViolation {
                            key: key.to_string(),
                            message: message.clone(),
                        });
                    }
                }
                Ok(())
            }
            Self::Custom { name, message } => {
                let Some(predicate) = customs.get(name) else {
                    return Err(AspectError::UnknownPredicate {
                        key: key.to_string(),
                        name: name.clone(),
                    });
                };
                for value in values {
                    if !predicate(value) {
                        return Err(AspectError::RuleViolation {
                            key: key.to_string(),
                            message: message.clone(),
                        });
                    }
                }
                Ok(())
            }
        }
    }
}
