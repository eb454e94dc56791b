//! Core joint and coordinate types.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// The two rotational joints of the planar arm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Joint {
    /// Proximal joint at the arm base.
    Shoulder,
    /// Distal joint between the two links.
    Elbow,
}

impl fmt::Display for Joint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Joint::Shoulder => write!(f, "shoulder"),
            Joint::Elbow => write!(f, "elbow"),
        }
    }
}

/// A commanded joint angle pair, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JointAngles {
    /// Shoulder (proximal) angle in degrees
    pub shoulder: f64,
    /// Elbow (distal) angle in degrees
    pub elbow: f64,
}

impl JointAngles {
    /// Create a new joint angle pair
    pub fn new(shoulder: f64, elbow: f64) -> Self {
        Self { shoulder, elbow }
    }

    /// The neutral (straight-out) pose
    pub fn neutral() -> Self {
        Self {
            shoulder: 0.0,
            elbow: 0.0,
        }
    }
}

/// Mechanical range of motion for both joints, symmetric about zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JointLimits {
    /// Maximum shoulder excursion from zero, in degrees
    pub shoulder_max: f64,
    /// Maximum elbow excursion from zero, in degrees
    pub elbow_max: f64,
}

impl Default for JointLimits {
    fn default() -> Self {
        Self {
            shoulder_max: 90.0,
            elbow_max: 158.0,
        }
    }
}

/// A joint angle outside its mechanical range.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("{joint} angle {angle:.2}° outside ±{limit:.0}° range")]
pub struct JointLimitError {
    /// Joint that was out of range
    pub joint: Joint,
    /// Requested angle in degrees
    pub angle: f64,
    /// Symmetric limit in degrees
    pub limit: f64,
}

impl JointLimits {
    /// Check a joint angle pair against the mechanical ranges.
    pub fn check(&self, angles: &JointAngles) -> Result<(), JointLimitError> {
        if angles.shoulder.abs() > self.shoulder_max {
            return Err(JointLimitError {
                joint: Joint::Shoulder,
                angle: angles.shoulder,
                limit: self.shoulder_max,
            });
        }
        if angles.elbow.abs() > self.elbow_max {
            return Err(JointLimitError {
                joint: Joint::Elbow,
                angle: angles.elbow,
                limit: self.elbow_max,
            });
        }
        Ok(())
    }
}

/// A point in pixel coordinates (column x, row y).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PixelPoint {
    /// Column coordinate
    pub x: f64,
    /// Row coordinate
    pub y: f64,
}

impl PixelPoint {
    /// Create a new pixel point
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A point in physical workspace units (inches), shoulder joint at the origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhysicalPoint {
    /// Physical x coordinate
    pub x: f64,
    /// Physical y coordinate
    pub y: f64,
}

impl PhysicalPoint {
    /// Create a new physical point
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Round both coordinates to two decimal places.
    ///
    /// Downstream movement-threshold comparisons rely on this fixed
    /// precision for stability.
    pub fn rounded(self) -> Self {
        Self {
            x: (self.x * 100.0).round() / 100.0,
            y: (self.y * 100.0).round() / 100.0,
        }
    }
}

/// Servo pulse-width range for one joint, in microseconds.
///
/// Persisted by the config store and consumed by the servo driver; the core
/// treats the values as opaque calibration data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PulseRange {
    /// Pulse width at the servo minimum position
    pub min: u32,
    /// Pulse width at the servo maximum position
    pub max: u32,
}

impl Default for PulseRange {
    fn default() -> Self {
        Self {
            min: 500,
            max: 2500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limits_accept_in_range() {
        let limits = JointLimits::default();
        assert!(limits
            .check(&JointAngles::new(-90.0, 158.0))
            .is_ok());
        assert!(limits.check(&JointAngles::neutral()).is_ok());
    }

    #[test]
    fn limits_reject_out_of_range() {
        let limits = JointLimits::default();
        let err = limits
            .check(&JointAngles::new(91.0, 0.0))
            .unwrap_err();
        assert_eq!(err.joint, Joint::Shoulder);

        let err = limits
            .check(&JointAngles::new(0.0, -158.5))
            .unwrap_err();
        assert_eq!(err.joint, Joint::Elbow);
    }

    #[test]
    fn physical_point_rounding() {
        let p = PhysicalPoint::new(1.2345, -6.789).rounded();
        assert_eq!(p, PhysicalPoint::new(1.23, -6.79));
    }
}
