use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::value::ValueError;

// ---------------------------------------------------------------------------
// ULID-backed identifiers
// ---------------------------------------------------------------------------

/// Declare an opaque, time-ordered ULID identifier newtype.
///
/// The canonical text form is the 26-character Crockford base32 encoding,
/// uppercase on output; parsing accepts either case.
macro_rules! ulid_id {
    ($(#[$doc:meta])* $name:ident, $field:literal) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(Ulid);

        impl $name {
            /// Generate a fresh, time-ordered identifier.
            pub fn generate() -> Self {
                Self(Ulid::new())
            }

            /// The raw 128 bits of the identifier.
            pub fn to_u128(self) -> u128 {
                self.0.0
            }

            pub fn from_u128(bits: u128) -> Self {
                Self(Ulid(bits))
            }
        }

        impl FromStr for $name {
            type Err = ValueError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ulid::from_string(s.trim())
                    .map(Self)
                    .map_err(|_| ValueError::InvalidFormat {
                        field: $field,
                        value: s.to_string(),
                    })
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValueError;

            fn try_from(s: String) -> Result<Self, Self::Error> {
                s.parse()
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.to_string()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

ulid_id!(
    /// Identity of a [`Scope`](crate::scope::Scope) aggregate.
    ScopeId,
    "scope id"
);
ulid_id!(
    /// Identity of an alias record, independent from the scope it names.
    /// Also the seed for deterministic alias-name generation.
    AliasId,
    "alias id"
);
ulid_id!(
    /// Identity of an appended domain event.
    EventId,
    "event id"
);
ulid_id!(
    /// Identity of a detected sync conflict.
    ConflictId,
    "conflict id"
);
ulid_id!(
    /// Identity of a saved context view.
    ContextViewId,
    "context view id"
);

// ---------------------------------------------------------------------------
// DeviceId
// ---------------------------------------------------------------------------

/// Opaque identity of a device participating in synchronization.
///
/// Non-blank after trimming; otherwise unconstrained. Lexicographic order is
/// meaningful: it breaks last-write-wins timestamp ties.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DeviceId(String);

impl DeviceId {
    pub fn parse(s: &str) -> Result<Self, ValueError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ValueError::Empty { field: "device id" });
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for DeviceId {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for DeviceId {
    type Error = ValueError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<DeviceId> for String {
    fn from(id: DeviceId) -> Self {
        id.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_unique_and_parseable() {
        let a = ScopeId::generate();
        let b = ScopeId::generate();
        assert_ne!(a, b);
        let text = a.to_string();
        assert_eq!(text.len(), 26);
        assert_eq!(text.parse::<ScopeId>().unwrap(), a);
    }

    #[test]
    fn parse_accepts_lowercase() {
        let id = ScopeId::generate();
        let lower = id.to_string().to_lowercase();
        assert_eq!(lower.parse::<ScopeId>().unwrap(), id);
    }

    #[test]
    fn malformed_id_is_invalid_format() {
        let err = "not-a-ulid".parse::<ScopeId>().unwrap_err();
        assert!(matches!(err, ValueError::InvalidFormat { .. }));
    }

    #[test]
    fn device_id_trims_and_rejects_blank() {
        assert_eq!(DeviceId::parse("  laptop  ").unwrap().as_str(), "laptop");
        assert!(matches!(
            DeviceId::parse("   "),
            Err(ValueError::Empty { .. })
        ));
    }
}
