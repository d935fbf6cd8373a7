//! Confidence scores.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A confidence score, always within `[0.0, 1.0]`.
///
/// Out-of-range inputs are clamped and `NaN` becomes `0.0`, so the type is totally
/// ordered and safe to compare.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "f32", into = "f32")]
pub struct Confidence(f32);

impl Confidence {
    pub const ZERO: Confidence = Confidence(0.0);
    pub const CERTAIN: Confidence = Confidence(1.0);

    pub fn new(value: f32) -> Self {
        if value.is_nan() {
            return Self::ZERO;
        }
        Self(value.clamp(0.0, 1.0))
    }

    pub fn value(&self) -> f32 {
        self.0
    }

    /// Optimistic aggregation: one confident source is enough.
    pub fn aggregate(self, other: Confidence) -> Confidence {
        if other.0 > self.0 {
            other
        } else {
            self
        }
    }
}

impl Default for Confidence {
    fn default() -> Self {
        Self::CERTAIN
    }
}

impl From<f32> for Confidence {
    fn from(value: f32) -> Self {
        Self::new(value)
    }
}

impl From<Confidence> for f32 {
    fn from(value: Confidence) -> Self {
        value.0
    }
}

impl Eq for Confidence {}

impl PartialOrd for Confidence {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Confidence {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_confidence_clamping() {
        assert_eq!(Confidence::new(1.5).value(), 1.0);
        assert_eq!(Confidence::new(-0.5).value(), 0.0);
        assert_eq!(Confidence::new(f32::NAN).value(), 0.0);
        assert_eq!(Confidence::new(0.42).value(), 0.42);
    }

    #[test]
    fn test_confidence_aggregate() {
        let low = Confidence::new(0.3);
        let high = Confidence::new(0.9);
        assert_eq!(low.aggregate(high), high);
        assert_eq!(high.aggregate(low), high);
    }

    #[test]
    fn test_confidence_deserialize_clamps() {
        let parsed: Confidence = serde_json::from_str("7.0").unwrap();
        assert_eq!(parsed, Confidence::CERTAIN);
    }

    proptest! {
        #[test]
        fn confidence_always_in_unit_range(raw in proptest::num::f32::ANY) {
            let c = Confidence::new(raw).value();
            prop_assert!((0.0..=1.0).contains(&c));
        }

        #[test]
        fn aggregate_never_decreases(a in 0.0f32..=1.0, b in 0.0f32..=1.0) {
            let before = Confidence::new(a);
            let after = before.aggregate(Confidence::new(b));
            prop_assert!(after >= before);
        }
    }
}
