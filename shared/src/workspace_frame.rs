//! Mapping between the calibrated pixel frame and physical workspace units.
//!
//! The overhead camera is mounted with the image column axis running along
//! the physical y axis and the row axis along physical x, so each physical
//! axis is sourced from the *other* pixel coordinate. The mapping is two
//! independent linear maps fixed by the workspace's pixel-per-inch scale
//! and origin offset.

use serde::{Deserialize, Serialize};

use crate::types::{PhysicalPoint, PixelPoint};

/// Affine per-axis mapping from calibrated pixel coordinates to physical
/// workspace units (inches), shoulder joint at the physical origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceFrame {
    /// Physical x at pixel row zero
    pub x_offset: f64,
    /// Physical x change per pixel row
    pub x_per_row: f64,
    /// Physical y at pixel column zero
    pub y_offset: f64,
    /// Physical y change per pixel column
    pub y_per_col: f64,
}

impl WorkspaceFrame {
    /// Convert a calibrated-frame pixel point to physical units.
    ///
    /// Rounded to two decimal places; downstream movement-threshold
    /// comparisons rely on the fixed precision.
    pub fn to_physical(&self, px: PixelPoint) -> PhysicalPoint {
        PhysicalPoint::new(
            self.x_offset + self.x_per_row * px.y,
            self.y_offset + self.y_per_col * px.x,
        )
        .rounded()
    }

    /// Inverse mapping: where a physical point lands in the calibrated
    /// pixel frame. Used to express calibration reference marks in pixels.
    pub fn to_pixel(&self, p: PhysicalPoint) -> PixelPoint {
        PixelPoint::new(
            (p.y - self.y_offset) / self.y_per_col,
            (p.x - self.x_offset) / self.x_per_row,
        )
    }
}

impl Default for WorkspaceFrame {
    /// The production mounting geometry: a 23"×12" field of view imaged to
    /// a 640×334 calibrated frame, physical origin 11.5" from the frame's
    /// top-left corner on both axes, both axes decreasing with pixels.
    fn default() -> Self {
        Self {
            x_offset: 11.5,
            x_per_row: -12.0 / 334.0,
            y_offset: 11.5,
            y_per_col: -23.0 / 640.0,
        }
    }
}
