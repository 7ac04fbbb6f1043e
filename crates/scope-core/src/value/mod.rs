use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};


// ---------------------------------------------------------------------------
// Validation failures
// ---------------------------------------------------------------------------

/// Construction failure of a value object. The `field` names the object kind
/// for user-facing messages.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValueError {
    #[error("{field} must not be empty")]
    Empty { field: &'static str },
    #[error("{field} must be at least {min} characters, got {actual}")]
    TooShort {
        field: &'static str,
        min: usize,
        actual: usize,
    },
    #[error("{field} must be at most {max} characters, got {actual}")]
    TooLong {
        field: &'static str,
        max: usize,
        actual: usize,
    },
    #[error("{field} contains invalid characters: {value:?}")]
    InvalidCharacters {
        field: &'static str,
        value: String,
    },
    #[error("{field} has invalid format: {value:?}")]
    InvalidFormat {
        field: &'static str,
        value: String,
    },
    #[error("aspect key {key:?} is reserved")]
    ReservedKey { key: String },
}

/// Declare the serde/FromStr/Display plumbing shared by the validated
/// string newtypes below. Each type keeps its own `parse`.
macro_rules! string_object {
    ($name:ident) => {
        impl FromStr for $name {
            type Err = ValueError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValueError;

            fn try_from(s: String) -> Result<Self, Self::Error> {
                Self::parse(&s)
            }
        }

        impl From<$name> for String {
            fn from(v: $name) -> Self {
                v.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }
    };
}

// ---------------------------------------------------------------------------
// AliasName
// ---------------------------------------------------------------------------

/// Globally unique, human-readable scope name.
///
/// Normalized to lowercase at construction; pattern `[a-z][a-z0-9_-]{1,63}`,
/// so 2 to 64 characters overall.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AliasName(String);

string_object!(AliasName);

impl AliasName {
    pub const MIN_LEN: usize = 2;
    pub const MAX_LEN: usize = 64;

    pub fn parse(s: &str) -> Result<Self, ValueError> {
        const FIELD: &str = "alias name";
        let normalized = s.trim().to_lowercase();
        if normalized.is_empty() {
            return Err(ValueError::Empty { field: FIELD });
        }
        if normalized.len() < Self::MIN_LEN {
            return Err(ValueError::TooShort {
                field: FIELD,
                min: Self::MIN_LEN,
                actual: normalized.len(),
            });
        }
        if normalized.len() > Self::MAX_LEN {
            return Err(ValueError::TooLong {
                field: FIELD,
                max: Self::MAX_LEN,
                actual: normalized.len(),
            });
        }
        let mut chars = normalized.chars();
        let head_ok = chars.next().is_some_and(|c| c.is_ascii_lowercase());
        let tail_ok = chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-');
        if !head_ok || !tail_ok {
            return Err(ValueError::InvalidCharacters {
                field: FIELD,
                value: normalized,
            });
        }
        Ok(Self(normalized))
    }
}

// ---------------------------------------------------------------------------
// AspectKey
// ---------------------------------------------------------------------------

/// Default reserved aspect keys; rejected at construction.
pub const RESERVED_ASPECT_KEYS: &[&str] = &["id", "type", "scope", "alias"];

/// Name of a typed metadata entry: `[a-zA-Z][a-zA-Z0-9_-]{0,63}`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AspectKey(String);

string_object!(AspectKey);

// Keyed maps look aspects up by plain string (e.g. filter identifiers).
impl std::borrow::Borrow<str> for AspectKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AspectKey {
    pub const MAX_LEN: usize = 64;

    pub fn parse(s: &str) -> Result<Self, ValueError> {
        Self::parse_with_reserved(s, RESERVED_ASPECT_KEYS)
    }

    /// Parse against a caller-supplied reserved set.
    pub fn parse_with_reserved(s: &str, reserved: &[&str]) -> Result<Self, ValueError> {
        const FIELD: &str = "aspect key";
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ValueError::Empty { field: FIELD });
        }
        if trimmed.len() > Self::MAX_LEN {
            return Err(ValueError::TooLong {
                field: FIELD,
                max: Self::MAX_LEN,
                actual: trimmed.len(),
            });
        }
        let mut chars = trimmed.chars();
        let head_ok = chars.next().is_some_and(|c| c.is_ascii_alphabetic());
        let tail_ok =
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !head_ok || !tail_ok {
            return Err(ValueError::InvalidCharacters {
                field: FIELD,
                value: trimmed.to_string(),
            });
        }
        if reserved.iter().any(|r| r.eq_ignore_ascii_case(trimmed)) {
            return Err(ValueError::ReservedKey {
                key: trimmed.to_string(),
            });
        }
        Ok(Self(trimmed.to_string()))
    }
}

// ---------------------------------------------------------------------------
// AspectValue
// ---------------------------------------------------------------------------

/// A single metadata value: non-empty after trimming, at most 512 characters.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AspectValue(String);

string_object!(AspectValue);

impl AspectValue {
    pub const MAX_LEN: usize = 512;

    pub fn parse(s: &str) -> Result<Self, ValueError> {
        const FIELD: &str = "aspect value";
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ValueError::Empty { field: FIELD });
        }
        if trimmed.chars().count() > Self::MAX_LEN {
            return Err(ValueError::TooLong {
                field: FIELD,
                max: Self::MAX_LEN,
                actual: trimmed.chars().count(),
            });
        }
        Ok(Self(trimmed.to_string()))
    }
}

// ---------------------------------------------------------------------------
// ScopeTitle / ScopeDescription
// ---------------------------------------------------------------------------

/// Scope title: trimmed, 1 to 200 characters. Sibling uniqueness compares
/// the [`normalized`](Self::normalized) form.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ScopeTitle(String);

string_object!(ScopeTitle);

impl ScopeTitle {
    pub const MAX_LEN: usize = 200;

    pub fn parse(s: &str) -> Result<Self, ValueError> {
        const FIELD: &str = "title";
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ValueError::Empty { field: FIELD });
        }
        if trimmed.chars().count() > Self::MAX_LEN {
            return Err(ValueError::TooLong {
                field: FIELD,
                max: Self::MAX_LEN,
                actual: trimmed.chars().count(),
            });
        }
        Ok(Self(trimmed.to_string()))
    }

    /// The form sibling-uniqueness is checked under: trim + lowercase.
    pub fn normalized(&self) -> String {
        self.0.to_lowercase()
    }
}

/// Optional scope description: trimmed, at most 1000 characters.
/// A blank input is represented as `None` by [`ScopeDescription::parse_opt`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ScopeDescription(String);

string_object!(ScopeDescription);

impl ScopeDescription {
    pub const MAX_LEN: usize = 1000;

    pub fn parse(s: &str) -> Result<Self, ValueError> {
        const FIELD: &str = "description";
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ValueError::Empty { field: FIELD });
        }
        if trimmed.chars().count() > Self::MAX_LEN {
            return Err(ValueError::TooLong {
                field: FIELD,
                max: Self::MAX_LEN,
                actual: trimmed.chars().count(),
            });
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Blank input maps to `None`; anything else is validated as usual.
    pub fn parse_opt(s: &str) -> Result<Option<Self>, ValueError> {
        if s.trim().is_empty() {
            return Ok(None);
        }
        Self::parse(s).map(Some)
    }
}

// ---------------------------------------------------------------------------
// ContextViewKey
// ---------------------------------------------------------------------------

/// Stable slug identifying a context view: `[a-z][a-z0-9-]{0,63}`,
/// lowercased at construction.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContextViewKey(String);

string_object!(ContextViewKey);

impl ContextViewKey {
    pub const MAX_LEN: usize = 64;

    pub fn parse(s: &str) -> Result<Self, ValueError> {
        const FIELD: &str = "context view key";
        let normalized = s.trim().to_lowercase();
        if normalized.is_empty() {
            return Err(ValueError::Empty { field: FIELD });
        }
        if normalized.len() > Self::MAX_LEN {
            return Err(ValueError::TooLong {
                field: FIELD,
                max: Self::MAX_LEN,
                actual: normalized.len(),
            });
        }
        let mut chars = normalized.chars();
        let head_ok = chars.next().is_some_and(|c| c.is_ascii_lowercase());
        let tail_ok = chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
        if !head_ok || !tail_ok {
            return Err(ValueError::InvalidCharacters {
                field: FIELD,
                value: normalized,
            });
        }
        Ok(Self(normalized))
    }
}
