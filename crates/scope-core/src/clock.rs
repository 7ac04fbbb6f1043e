use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use crate::ids::DeviceId;

// ---------------------------------------------------------------------------
// VectorClock
// ---------------------------------------------------------------------------

/// Per-device monotonic counters establishing causal order between events.
///
/// Devices absent from the map count as zero, so clocks over different
/// device sets still compare. Zero counters are never stored, keeping map
/// equality aligned with clock equality. All operations return new clocks;
/// a clock value never mutates in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct VectorClock(BTreeMap<DeviceId, u64>);

impl<'de> Deserialize<'de> for VectorClock {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<DeviceId, u64>::deserialize(deserializer)?;
        Ok(raw.into_iter().collect())
    }
}

impl VectorClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counter for `device`, zero when absent.
    pub fn get(&self, device: &DeviceId) -> u64 {
        self.0.get(device).copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn devices(&self) -> impl Iterator<Item = &DeviceId> {
        self.0.keys()
    }

    /// A copy with `device`'s counter advanced by one.
    #[must_use]
    pub fn increment(&self, device: &DeviceId) -> Self {
        let mut next = self.0.clone();
        *next.entry(device.clone()).or_insert(0) += 1;
        Self(next)
    }

    /// Pointwise maximum of both clocks.
    #[must_use]
    pub fn merge(&self, other: &Self) -> Self {
        let mut merged = self.0.clone();
        for (device, &counter) in &other.0 {
            let entry = merged.entry(device.clone()).or_insert(0);
            *entry = (*entry).max(counter);
        }
        Self(merged)
    }

    /// Strict causal precedence: everywhere ≤, somewhere <.
    pub fn happened_before(&self, other: &Self) -> bool {
        let all_le = self
            .0
            .iter()
            .all(|(device, &counter)| counter <= other.get(device));
        if !all_le {
            return false;
        }
        self.0
            .keys()
            .chain(other.0.keys())
            .any(|device| self.get(device) < other.get(device))
    }

    /// Neither clock precedes the other and they differ.
    pub fn is_concurrent_with(&self, other: &Self) -> bool {
        !self.happened_before(other) && !other.happened_before(self) && self != other
    }
}

impl FromIterator<(DeviceId, u64)> for VectorClock {
    fn from_iter<I: IntoIterator<Item = (DeviceId, u64)>>(iter: I) -> Self {
        Self(iter.into_iter().filter(|(_, n)| *n > 0).collect())
    }
}

impl fmt::Display for VectorClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (device, counter)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{device}:{counter}")?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dev(s: &str) -> DeviceId {
        DeviceId::parse(s).unwrap()
    }

    fn clock(entries: &[(&str, u64)]) -> VectorClock {
        entries.iter().map(|(d, n)| (dev(d), *n)).collect()
    }

    #[test]
    fn missing_devices_count_as_zero() {
        let c = clock(&[("a", 3)]);
        assert_eq!(c.get(&dev("a")), 3);
        assert_eq!(c.get(&dev("b")), 0);
    }

    #[test]
    fn increment_advances_one_device() {
        let c = clock(&[("a", 1)]).increment(&dev("a")).increment(&dev("b"));
        assert_eq!(c.get(&dev("a")), 2);
        assert_eq!(c.get(&dev("b")), 1);
    }

    #[test]
    fn happened_before_is_strict() {
        let lo = clock(&[("a", 3)]);
        let hi = clock(&[("a", 5), ("b", 2)]);
        assert!(lo.happened_before(&hi));
        assert!(!hi.happened_before(&lo));
        assert!(!lo.happened_before(&lo));
    }

    #[test]
    fn concurrent_clocks_are_detected() {
        let left = clock(&[("a", 5), ("b", 2)]);
        let right = clock(&[("a", 3), ("b", 4)]);
        assert!(left.is_concurrent_with(&right));
        assert!(right.is_concurrent_with(&left));
    }

    #[test]
    fn trichotomy_holds() {
        let cases = [
            (clock(&[("a", 1)]), clock(&[("a", 2)])),
            (clock(&[("a", 5), ("b", 2)]), clock(&[("a", 3), ("b", 4)])),
            (clock(&[("a", 2)]), clock(&[("a", 2)])),
            (clock(&[]), clock(&[("a", 1)])),
            (clock(&[]), clock(&[])),
        ];
        for (a, b) in cases {
            let relations = [
                a.happened_before(&b),
                b.happened_before(&a),
                a.is_concurrent_with(&b),
                a == b,
            ];
            assert_eq!(
                relations.iter().filter(|r| **r).count(),
                1,
                "exactly one relation must hold for {a} vs {b}"
            );
        }
    }

    #[test]
    fn merge_laws() {
        let a = clock(&[("a", 5), ("b", 2)]);
        let b = clock(&[("a", 3), ("b", 4)]);
        let c = clock(&[("c", 7)]);
        // Commutative, associative, idempotent.
        assert_eq!(a.merge(&b), b.merge(&a));
        assert_eq!(a.merge(&b).merge(&c), a.merge(&b.merge(&c)));
        assert_eq!(a.merge(&a), a);
        // Pointwise max.
        let m = a.merge(&b);
        assert_eq!(m.get(&dev("a")), 5);
        assert_eq!(m.get(&dev("b")), 4);
    }

    #[test]
    fn display_is_compact() {
        assert_eq!(clock(&[("a", 3), ("b", 4)]).to_string(), "{a:3,b:4}");
        assert_eq!(VectorClock::new().to_string(), "{}");
    }
}
