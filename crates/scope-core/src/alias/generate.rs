use crate::ids::AliasId;
use crate::value::AliasName;

/// Collision retry budget for canonical alias generation.
pub const MAX_GENERATION_RETRIES: u32 = 10;

// ---------------------------------------------------------------------------
// Embedded dictionaries
// ---------------------------------------------------------------------------
// 32 words each so a 5-bit slice of the ULID indexes them directly. The
// lists are part of the wire contract: devices running the same build
// derive identical names from the same AliasId.

const ADJECTIVES: [&str; 32] = [
    "amber", "bold", "brisk", "calm", "clear", "crisp", "deep", "dry",
    "early", "fair", "fleet", "fond", "glad", "grand", "keen", "kind",
    "late", "light", "lone", "loud", "mild", "neat", "pale", "plain",
    "proud", "quick", "quiet", "sharp", "soft", "still", "warm", "wise",
];

const NOUNS: [&str; 32] = [
    "anchor", "basin", "beacon", "bridge", "brook", "cairn", "canyon", "cedar",
    "cliff", "comet", "coral", "crane", "delta", "ember", "fjord", "garnet",
    "glade", "grove", "harbor", "heron", "inlet", "jasper", "lagoon", "maple",
    "meadow", "mesa", "orchard", "otter", "prairie", "ridge", "summit", "willow",
];

// ---------------------------------------------------------------------------
// Deterministic name derivation
// ---------------------------------------------------------------------------

/// Derive an alias name from the bits of an [`AliasId`].
///
/// Layout over the ULID's 80 random bits: the top five select the
/// adjective, the next five the noun, and the low 24 become the hex
/// suffix. The result always satisfies the [`AliasName`] pattern.
pub fn generate_alias_name(id: AliasId) -> AliasName {
    let bits = id.to_u128();
    // Random portion of a ULID is the low 80 bits.
    let adjective = ADJECTIVES[((bits >> 75) & 0x1f) as usize];
    let noun = NOUNS[((bits >> 70) & 0x1f) as usize];
    let suffix = (bits & 0xff_ffff) as u32;
    let name = format!("{adjective}-{noun}-{suffix:06x}");
    AliasName::parse(&name).expect("generated names always match the alias pattern")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_is_deterministic() {
        let id = AliasId::from_u128(0x0123_4567_89ab_cdef_0123_4567_89ab_cdef);
        assert_eq!(generate_alias_name(id), generate_alias_name(id));
    }

    #[test]
    fn generated_names_have_the_expected_shape() {
        for _ in 0..64 {
            let name = generate_alias_name(AliasId::generate());
            let parts: Vec<&str> = name.as_str().split('-').collect();
            let suffix = parts.last().unwrap();
            assert_eq!(suffix.len(), 6, "hex suffix in {name}");
            assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
            assert!(ADJECTIVES.contains(&parts[0]));
        }
    }

    #[test]
    fn distinct_ids_usually_produce_distinct_names() {
        let a = generate_alias_name(AliasId::from_u128(1));
        let b = generate_alias_name(AliasId::from_u128(2));
        assert_ne!(a, b);
    }
}
