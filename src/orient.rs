//! Orientation classification for clips and screens.
//!
//! A single pure function decides which bucket a width/height pair belongs
//! to. The same function classifies the viewport, so a clip and the screen it
//! best fits always agree on terminology.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Aspect classification of a width/height pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Orientation {
    Portrait,
    Landscape,
    Square,
}

impl Orientation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Portrait => "portrait",
            Self::Landscape => "landscape",
            Self::Square => "square",
        }
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Default width/height ratio slack treated as square.
pub const DEFAULT_SQUARE_TOLERANCE: f64 = 0.08;

/// Classify a width/height pair.
///
/// Unknown dimensions (either side zero) land in the square bucket so a clip
/// with failed metadata stays schedulable. The tolerance edge is inclusive:
/// a ratio of exactly `1 + tolerance` still counts as square.
pub fn classify(width: u32, height: u32, tolerance: f64) -> Orientation {
    if width == 0 || height == 0 {
        return Orientation::Square;
    }
    let ratio = f64::from(width) / f64::from(height);
    if (ratio - 1.0).abs() <= tolerance {
        Orientation::Square
    } else if ratio > 1.0 {
        Orientation::Landscape
    } else {
        Orientation::Portrait
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOL: f64 = DEFAULT_SQUARE_TOLERANCE;

    #[test]
    fn zero_dimensions_are_square() {
        assert_eq!(classify(0, 1080, TOL), Orientation::Square);
        assert_eq!(classify(1920, 0, TOL), Orientation::Square);
        assert_eq!(classify(0, 0, TOL), Orientation::Square);
    }

    #[test]
    fn exact_unity_ratio_is_square() {
        assert_eq!(classify(1080, 1080, TOL), Orientation::Square);
        assert_eq!(classify(1, 1, TOL), Orientation::Square);
    }

    #[test]
    fn wide_is_landscape_and_tall_is_portrait() {
        assert_eq!(classify(1920, 1080, TOL), Orientation::Landscape);
        assert_eq!(classify(1080, 1920, TOL), Orientation::Portrait);
    }

    #[test]
    fn tolerance_edge_is_inclusive_square() {
        // 1.25 and 0.25 are exact in binary, so this probes the edge itself.
        assert_eq!(classify(1250, 1000, 0.25), Orientation::Square);
        assert_eq!(classify(1000, 1250, 0.25), Orientation::Square);
        assert_eq!(classify(1251, 1000, 0.25), Orientation::Landscape);
    }

    #[test]
    fn near_square_falls_inside_default_tolerance() {
        assert_eq!(classify(1079, 1000, TOL), Orientation::Square);
        assert_eq!(classify(1000, 1079, TOL), Orientation::Square);
        assert_eq!(classify(1100, 1000, TOL), Orientation::Landscape);
        assert_eq!(classify(1000, 1100, TOL), Orientation::Portrait);
    }

    #[test]
    fn swap_symmetry_outside_tolerance() {
        for (w, h) in [(1920u32, 1080u32), (2560, 1080), (640, 360), (4096, 2160)] {
            assert_eq!(classify(w, h, TOL), Orientation::Landscape);
            assert_eq!(classify(h, w, TOL), Orientation::Portrait);
        }
    }

    #[test]
    fn classification_is_deterministic() {
        for _ in 0..8 {
            assert_eq!(classify(1280, 720, TOL), classify(1280, 720, TOL));
        }
    }
}
