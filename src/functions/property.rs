//! Scalar properties evaluated along a parent branch
//!
//! Several branching parameters (length, start radius, start angle,
//! randomness) can vary with the position of a branch along its parent,
//! or per branch at random. A `Property` captures the three user-facing
//! flavors.

use serde::{Deserialize, Serialize};

use crate::math::geometry::lerp;
use crate::math::SimpleRng;

/// A scalar parameter evaluated at a fractional position along a branch.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub enum Property {
    /// Same value everywhere.
    Constant(f32),
    /// Uniform random draw per evaluation.
    Random { min: f32, max: f32 },
    /// Linear ramp over the parent from `start` to `end`.
    Ramp { start: f32, end: f32 },
}

impl Property {
    pub fn execute(&self, factor: f32, rng: &mut SimpleRng) -> f32 {
        match *self {
            Property::Constant(value) => value,
            Property::Random { min, max } => rng.range(min, max),
            Property::Ramp { start, end } => lerp(start, end, factor.clamp(0.0, 1.0)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant() {
        let mut rng = SimpleRng::new(0);
        assert_eq!(Property::Constant(4.0).execute(0.3, &mut rng), 4.0);
    }

    #[test]
    fn test_ramp_clamps_factor() {
        let mut rng = SimpleRng::new(0);
        let ramp = Property::Ramp {
            start: 1.0,
            end: 3.0,
        };
        assert_eq!(ramp.execute(0.5, &mut rng), 2.0);
        assert_eq!(ramp.execute(-1.0, &mut rng), 1.0);
        assert_eq!(ramp.execute(2.0, &mut rng), 3.0);
    }

    #[test]
    fn test_random_within_bounds() {
        let mut rng = SimpleRng::new(5);
        let prop = Property::Random { min: 2.0, max: 5.0 };
        for _ in 0..100 {
            let v = prop.execute(0.0, &mut rng);
            assert!((2.0..5.0).contains(&v));
        }
    }
}
