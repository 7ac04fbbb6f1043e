use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::duration::IsoDuration;
use super::rule::{AspectRule, CustomPredicates};
use super::{AspectError, AspectMap};
use crate::value::{AspectKey, AspectValue};

// ---------------------------------------------------------------------------
// Aspect types
// ---------------------------------------------------------------------------

/// The value domain of an aspect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AspectType {
    /// Closed set of values whose declaration order is the sort order.
    Ordered { values: Vec<AspectValue> },
    /// Finite decimal numbers.
    Numeric,
    /// `true/false/yes/no/1/0`, case-insensitive.
    Boolean,
    /// Free text; always valid.
    Text,
    /// ISO-8601 duration (`PnYnMnDTnHnMnS` or `PnW`).
    Duration,
}

const BOOLEAN_FORMS: &[&str] = &["true", "false", "yes", "no", "1", "0"];

impl AspectType {
    pub fn is_valid_value(&self, value: &AspectValue) -> bool {
        match self {
            Self::Ordered { values } => values.contains(value),
            Self::Numeric => value
                .as_str()
                .parse::<f64>()
                .is_ok_and(|n| n.is_finite()),
            Self::Boolean => BOOLEAN_FORMS
                .iter()
                .any(|form| form.eq_ignore_ascii_case(value.as_str())),
            Self::Text => true,
            Self::Duration => value.as_str().parse::<IsoDuration>().is_ok(),
        }
    }

    /// Compare two raw value strings under this type's order.
    ///
    /// Only `Ordered` (declaration index) and `Numeric` (numeric value)
    /// supply an order; everything else returns `None`.
    pub fn compare_raw(&self, a: &str, b: &str) -> Option<Ordering> {
        match self {
            Self::Ordered { values } => {
                let ia = values.iter().position(|v| v.as_str() == a)?;
                let ib = values.iter().position(|v| v.as_str() == b)?;
                Some(ia.cmp(&ib))
            }
            Self::Numeric => {
                let na: f64 = a.parse().ok()?;
                let nb: f64 = b.parse().ok()?;
                na.partial_cmp(&nb)
            }
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Definitions
// ---------------------------------------------------------------------------

/// Typed schema for one aspect key: its value domain, cardinality, and
/// conditional validation rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AspectDefinition {
    pub key: AspectKey,
    pub aspect_type: AspectType,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub allow_multiple: bool,
    #[serde(default)]
    pub rules: Vec<AspectRule>,
}

impl AspectDefinition {
    pub fn new(key: AspectKey, aspect_type: AspectType) -> Self {
        Self {
            key,
            aspect_type,
            description: None,
            allow_multiple: false,
            rules: Vec::new(),
        }
    }

    pub fn multi_valued(mut self) -> Self {
        self.allow_multiple = true;
        self
    }

    pub fn with_rule(mut self, rule: AspectRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn is_valid_value(&self, value: &AspectValue) -> bool {
        self.aspect_type.is_valid_value(value)
    }

    pub fn compare_values(&self, a: &AspectValue, b: &AspectValue) -> Option<Ordering> {
        self.aspect_type.compare_raw(a.as_str(), b.as_str())
    }

    /// Validate a value list for this aspect (empty = aspect absent) against
    /// the type, cardinality, and every rule. `others` is the scope's aspect
    /// map used by conditional rules.
    pub fn validate_values(
        &self,
        values: &[AspectValue],
        others: &AspectMap,
        customs: &CustomPredicates,
    ) -> Result<(), AspectError> {
        let key = self.key.as_str();
        if !self.allow_multiple && values.len() > 1 {
            return Err(AspectError::MultipleNotAllowed {
                key: key.to_string(),
                count: values.len(),
            });
        }
        for value in values {
            self.check_type(value)?;
        }
        for rule in &self.rules {
            rule.evaluate(key, values, others, customs)?;
        }
        Ok(())
    }

    fn check_type(&self, value: &AspectValue) -> Result<(), AspectError> {
        if self.aspect_type.is_valid_value(value) {
            return Ok(());
        }
        let key = self.key.to_string();
        let value = value.to_string();
        Err(match self.aspect_type {
            AspectType::Numeric => AspectError::InvalidNumeric { key, value },
            AspectType::Boolean => AspectError::InvalidBoolean { key, value },
            AspectType::Duration => AspectError::InvalidDuration { key, value },
            AspectType::Ordered { .. } => AspectError::ValueNotAllowed { key, value },
            // Text never fails the type check.
            AspectType::Text => unreachable!("text values are always valid"),
        })
    }
}

// ---------------------------------------------------------------------------
// Definition lookup
// ---------------------------------------------------------------------------

/// Read access to aspect definitions, as needed by filter evaluation and
/// validation call sites.
pub trait DefinitionLookup {
    fn definition(&self, key: &str) -> Option<&AspectDefinition>;
}

impl DefinitionLookup for BTreeMap<AspectKey, AspectDefinition> {
    fn definition(&self, key: &str) -> Option<&AspectDefinition> {
        self.get(key)
    }
}

/// The empty registry: no keys are defined.
impl DefinitionLookup for () {
    fn definition(&self, _key: &str) -> Option<&AspectDefinition> {
        None
    }
}
