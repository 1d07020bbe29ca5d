use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, RiskError};

/// Which side of the pivot gets compressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlowDirection {
    /// Values below the pivot.
    #[serde(alias = "D", alias = "d")]
    Down,
    /// Values above the pivot.
    #[serde(alias = "U", alias = "u")]
    Up,
}

impl FromStr for BlowDirection {
    type Err = RiskError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "down" | "d" => Ok(BlowDirection::Down),
            "up" | "u" => Ok(BlowDirection::Up),
            other => Err(RiskError::invalid(
                "blow_direction",
                format!("expected 'down'/'D' or 'up'/'U', got '{other}'"),
            )),
        }
    }
}

impl fmt::Display for BlowDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlowDirection::Down => write!(f, "down"),
            BlowDirection::Up => write!(f, "up"),
        }
    }
}

/// One-sided exponential stretch/compression around `pivot`.
///
/// The distance to the pivot on the selected side is multiplied by
/// `exp(-factor_percent / 100)`: a positive factor pulls values towards the
/// pivot, a negative one pushes them away. `shift` is then added to every
/// value, transformed or not.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BlowTransform {
    pub pivot: f64,
    pub factor_percent: f64,
    pub direction: BlowDirection,
    pub shift: f64,
}

impl BlowTransform {
    pub fn validate(&self) -> Result<()> {
        for (name, v) in [
            ("blow_point", self.pivot),
            ("blow_factor", self.factor_percent),
            ("blow_shift", self.shift),
        ] {
            if !v.is_finite() {
                return Err(RiskError::invalid(name, format!("must be finite, got {v}")));
            }
        }
        Ok(())
    }

    fn multiplier(&self) -> f64 {
        (-self.factor_percent / 100.0).exp()
    }

    pub fn apply(&self, value: f64) -> f64 {
        let m = self.multiplier();
        let blown = match self.direction {
            BlowDirection::Down if value < self.pivot => self.pivot - (self.pivot - value) * m,
            BlowDirection::Up if value > self.pivot => self.pivot + (value - self.pivot) * m,
            _ => value,
        };
        blown + self.shift
    }

    pub fn apply_all(&self, values: &[f64]) -> Vec<f64> {
        values.iter().map(|&v| self.apply(v)).collect()
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    use super::*;

    fn down(pivot: f64, factor: f64) -> BlowTransform {
        BlowTransform { pivot, factor_percent: factor, direction: BlowDirection::Down, shift: 0.0 }
    }

    #[test]
    fn down_blow_stretches_values_below_pivot() {
        let dir: BlowDirection = "D".parse().unwrap();
        let t = BlowTransform { pivot: 100.0, factor_percent: -30.0, direction: dir, shift: 0.0 };
        let out = t.apply_all(&[90.0, 100.0, 110.0]);
        assert_relative_eq!(out[0], 100.0 - 10.0 * 0.3_f64.exp(), epsilon = 1e-12);
        assert_relative_eq!(out[0], 86.50141192, epsilon = 1e-6);
        assert_eq!(out[1], 100.0);
        assert_eq!(out[2], 110.0);
    }

    #[test]
    fn up_blow_only_touches_values_above_pivot() {
        let t = BlowTransform {
            pivot: 100.0,
            factor_percent: 50.0,
            direction: BlowDirection::Up,
            shift: 0.0,
        };
        let out = t.apply_all(&[90.0, 100.0, 120.0]);
        assert_eq!(out[0], 90.0);
        assert_eq!(out[1], 100.0);
        assert_relative_eq!(out[2], 100.0 + 20.0 * (-0.5_f64).exp(), epsilon = 1e-12);
    }

    #[test]
    fn shift_applies_to_untouched_values_too() {
        let t = BlowTransform { shift: 5.0, ..down(100.0, 20.0) };
        let out = t.apply_all(&[80.0, 100.0, 130.0]);
        assert_relative_eq!(out[0], 100.0 - 20.0 * (-0.2_f64).exp() + 5.0, epsilon = 1e-12);
        assert_eq!(out[1], 105.0);
        assert_eq!(out[2], 135.0);
    }

    #[test]
    fn zero_factor_is_identity_plus_shift() {
        let t = BlowTransform { shift: -1.0, ..down(50.0, 0.0) };
        assert_eq!(t.apply(10.0), 9.0);
        assert_eq!(t.apply(70.0), 69.0);
    }

    #[test]
    fn applying_twice_keeps_compressing() {
        let t = down(100.0, 30.0);
        let once = t.apply(80.0);
        let twice = t.apply(once);
        assert!(twice > once, "second pass must move further towards the pivot");
        assert!(twice < 100.0);
    }

    #[test]
    fn direction_parsing() {
        assert_eq!("down".parse::<BlowDirection>().unwrap(), BlowDirection::Down);
        assert_eq!("Up".parse::<BlowDirection>().unwrap(), BlowDirection::Up);
        assert_eq!("u".parse::<BlowDirection>().unwrap(), BlowDirection::Up);
        assert!("sideways".parse::<BlowDirection>().is_err());
    }

    #[test]
    fn validate_rejects_non_finite_parameters() {
        assert!(down(f64::NAN, 10.0).validate().is_err());
        assert!(down(100.0, f64::INFINITY).validate().is_err());
        assert!(down(100.0, -30.0).validate().is_ok());
    }

    proptest! {
        #[test]
        fn blow_is_monotonic(
            a in -1.0e6f64..1.0e6,
            b in -1.0e6f64..1.0e6,
            pivot in -1.0e5f64..1.0e5,
            factor in -100.0f64..100.0,
            up in any::<bool>(),
        ) {
            let direction = if up { BlowDirection::Up } else { BlowDirection::Down };
            let t = BlowTransform { pivot, factor_percent: factor, direction, shift: 0.0 };
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(t.apply(lo) <= t.apply(hi));
        }

        #[test]
        fn blow_preserves_side_of_pivot(
            v in -1.0e6f64..1.0e6,
            pivot in -1.0e5f64..1.0e5,
            factor in -100.0f64..100.0,
        ) {
            let t = down(pivot, factor);
            let out = t.apply(v);
            prop_assert_eq!(out < pivot, v < pivot);
        }
    }
}
