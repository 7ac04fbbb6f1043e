use super::AspectError;
use crate::value::{AspectKey, AspectValue};

// ---------------------------------------------------------------------------
// `key:value` / `key=value` entry parsing
// ---------------------------------------------------------------------------

/// Split a CLI-style aspect entry at the first `:` or `=` — whichever
/// occurs first — and validate both sides.
pub fn parse_aspect_entry(entry: &str) -> Result<(AspectKey, AspectValue), AspectError> {
    let colon = entry.find(':');
    let equals = entry.find('=');
    let split_at = match (colon, equals) {
        (Some(c), Some(e)) => c.min(e),
        (Some(c), None) => c,
        (None, Some(e)) => e,
        (None, None) => {
            return Err(AspectError::EntryFormat {
                entry: entry.to_string(),
            });
        }
    };

    let raw_key = entry[..split_at].trim();
    let raw_value = entry[split_at + 1..].trim();
    if raw_key.is_empty() || raw_value.is_empty() {
        return Err(AspectError::EntryFormat {
            entry: entry.to_string(),
        });
    }

    let key = AspectKey::parse(raw_key).map_err(|source| AspectError::EntryValue {
        entry: entry.to_string(),
        source,
    })?;
    let value = AspectValue::parse(raw_value).map_err(|source| AspectError::EntryValue {
        entry: entry.to_string(),
        source,
    })?;
    Ok((key, value))
}
