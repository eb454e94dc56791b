//! HSV color conversion and target color segmentation.
//!
//! Channel scaling follows the common 8-bit machine-vision convention:
//! hue in [0, 180), saturation and value in [0, 255]. The target color
//! range is supplied externally and static for the process lifetime.

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use shared::Frame;

/// An 8-bit HSV triple (hue halved into [0, 180)).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hsv {
    /// Hue, degrees / 2, in [0, 180)
    pub h: u8,
    /// Saturation in [0, 255]
    pub s: u8,
    /// Value in [0, 255]
    pub v: u8,
}

impl Hsv {
    /// Create a new HSV triple
    pub const fn new(h: u8, s: u8, v: u8) -> Self {
        Self { h, s, v }
    }
}

/// Inclusive lower/upper HSV bounds defining the target's color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorRange {
    /// Minimum HSV values of the target
    pub lower: Hsv,
    /// Maximum HSV values of the target
    pub upper: Hsv,
}

impl ColorRange {
    /// Create a new range
    pub const fn new(lower: Hsv, upper: Hsv) -> Self {
        Self { lower, upper }
    }

    /// Inclusive membership test on all three channels.
    pub fn contains(&self, hsv: Hsv) -> bool {
        self.lower.h <= hsv.h
            && hsv.h <= self.upper.h
            && self.lower.s <= hsv.s
            && hsv.s <= self.upper.s
            && self.lower.v <= hsv.v
            && hsv.v <= self.upper.v
    }
}

impl Default for ColorRange {
    /// The production target disk color (red-orange).
    fn default() -> Self {
        Self {
            lower: Hsv::new(1, 125, 50),
            upper: Hsv::new(14, 255, 200),
        }
    }
}

/// Convert one RGB pixel to HSV.
pub fn rgb_to_hsv(r: u8, g: u8, b: u8) -> Hsv {
    let rf = r as f64;
    let gf = g as f64;
    let bf = b as f64;

    let max = rf.max(gf).max(bf);
    let min = rf.min(gf).min(bf);
    let delta = max - min;

    let v = max;
    let s = if max > 0.0 { delta / max * 255.0 } else { 0.0 };

    let hue_deg = if delta == 0.0 {
        0.0
    } else if max == rf {
        60.0 * ((gf - bf) / delta).rem_euclid(6.0)
    } else if max == gf {
        60.0 * ((bf - rf) / delta + 2.0)
    } else {
        60.0 * ((rf - gf) / delta + 4.0)
    };

    let h = ((hue_deg / 2.0).round() as u16) % 180;
    Hsv::new(h as u8, s.round() as u8, v.round() as u8)
}

/// Threshold a frame to a binary mask of in-range pixels.
pub fn hsv_mask(frame: &Frame, range: &ColorRange) -> Array2<bool> {
    let (rows, cols, _) = frame.dim();
    let mut mask = Array2::from_elem((rows, cols), false);
    for row in 0..rows {
        for col in 0..cols {
            let hsv = rgb_to_hsv(
                frame[[row, col, 0]],
                frame[[row, col, 1]],
                frame[[row, col, 2]],
            );
            mask[[row, col]] = range.contains(hsv);
        }
    }
    mask
}
