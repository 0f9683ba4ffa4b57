//! Crown shape envelope
//!
//! Height-dependent multiplier on branch length enforcing a tree
//! silhouette, following the Weber & Penn shape table. `ratio` is the
//! normalized distance from the crown top (1 at the crown base, 0 at the
//! top).

use serde::{Deserialize, Serialize};

/// Minimum branch length multiplier
const MIN_RATIO: f32 = 0.2;
/// Variable range (1.0 - MIN_RATIO)
const RATIO_RANGE: f32 = 0.8;
/// Base value for tapered shapes
const TAPER_BASE: f32 = 0.5;
/// Variable range for tapered shapes
const TAPER_RANGE: f32 = 0.5;
/// Height where the flame shape peaks
const FLAME_PEAK: f32 = 0.7;
/// Falloff zone (1.0 - FLAME_PEAK)
const FLAME_FALLOFF: f32 = 0.3;

/// Crown silhouette shapes
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CrownShape {
    Conical,
    Spherical,
    Hemispherical,
    #[default]
    Cylindrical,
    TaperedCylindrical,
    Flame,
    InverseConical,
    TendFlame,
}

/// Branch length multiplier for `shape` at the given height ratio.
pub fn shape_ratio(shape: CrownShape, ratio: f32) -> f32 {
    let ratio = ratio.clamp(0.0, 1.0);

    match shape {
        CrownShape::Conical => MIN_RATIO + RATIO_RANGE * ratio,
        CrownShape::Spherical => MIN_RATIO + RATIO_RANGE * (std::f32::consts::PI * ratio).sin(),
        CrownShape::Hemispherical => {
            MIN_RATIO + RATIO_RANGE * (std::f32::consts::FRAC_PI_2 * ratio).sin()
        }
        CrownShape::Cylindrical => 1.0,
        CrownShape::TaperedCylindrical => TAPER_BASE + TAPER_RANGE * ratio,
        CrownShape::Flame => {
            if ratio <= FLAME_PEAK {
                ratio / FLAME_PEAK
            } else {
                (1.0 - ratio) / FLAME_FALLOFF
            }
        }
        CrownShape::InverseConical => 1.0 - RATIO_RANGE * ratio,
        CrownShape::TendFlame => {
            if ratio <= FLAME_PEAK {
                TAPER_BASE + TAPER_RANGE * ratio / FLAME_PEAK
            } else {
                TAPER_BASE + TAPER_RANGE * (1.0 - ratio) / FLAME_FALLOFF
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cylindrical_is_identity() {
        for i in 0..=10 {
            let ratio = i as f32 / 10.0;
            assert_eq!(shape_ratio(CrownShape::Cylindrical, ratio), 1.0);
        }
    }

    #[test]
    fn test_conical_monotone_non_decreasing() {
        let mut prev = shape_ratio(CrownShape::Conical, 0.0);
        for i in 1..=20 {
            let current = shape_ratio(CrownShape::Conical, i as f32 / 20.0);
            assert!(current >= prev);
            prev = current;
        }
    }

    #[test]
    fn test_conical_endpoints() {
        assert!((shape_ratio(CrownShape::Conical, 0.0) - 0.2).abs() < 1e-6);
        assert!((shape_ratio(CrownShape::Conical, 1.0) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_ratio_is_clamped() {
        assert_eq!(
            shape_ratio(CrownShape::Conical, -1.0),
            shape_ratio(CrownShape::Conical, 0.0)
        );
        assert_eq!(
            shape_ratio(CrownShape::Conical, 2.0),
            shape_ratio(CrownShape::Conical, 1.0)
        );
    }

    #[test]
    fn test_flame_peaks_at_seventy_percent() {
        assert!((shape_ratio(CrownShape::Flame, 0.7) - 1.0).abs() < 1e-6);
        assert!(shape_ratio(CrownShape::Flame, 0.3) < 1.0);
        assert!(shape_ratio(CrownShape::Flame, 0.9) < 1.0);
    }

    #[test]
    fn test_inverse_conical_decreasing() {
        assert!((shape_ratio(CrownShape::InverseConical, 0.0) - 1.0).abs() < 1e-6);
        assert!(
            (shape_ratio(CrownShape::InverseConical, 1.0) - 0.2).abs() < 1e-6
        );
    }
}
