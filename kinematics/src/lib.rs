//! Planar two-link inverse kinematics.
//!
//! Pure geometry: no hardware types, no side effects. [`solve`] returns
//! both elbow-down and elbow-up solutions for a reachable target; the
//! caller disambiguates (the control loop prefers continuity with the
//! previous pose).

use serde::{Deserialize, Serialize};
use thiserror::Error;

use shared::JointAngles;

/// Link lengths of the arm, in consistent physical units (inches).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ArmGeometry {
    /// Proximal (shoulder-to-elbow) link length
    a: f64,
    /// Distal (elbow-to-effector) link length
    b: f64,
}

/// Link lengths must be strictly positive.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("link lengths must be positive, got a={a}, b={b}")]
pub struct InvalidGeometry {
    /// Rejected proximal length
    pub a: f64,
    /// Rejected distal length
    pub b: f64,
}

impl ArmGeometry {
    /// Create a validated geometry.
    pub fn new(a: f64, b: f64) -> Result<Self, InvalidGeometry> {
        if a > 0.0 && b > 0.0 {
            Ok(Self { a, b })
        } else {
            Err(InvalidGeometry { a, b })
        }
    }

    /// Proximal link length
    pub fn proximal(&self) -> f64 {
        self.a
    }

    /// Distal link length
    pub fn distal(&self) -> f64 {
        self.b
    }

    /// Furthest reachable distance from the shoulder
    pub fn max_reach(&self) -> f64 {
        self.a + self.b
    }

    /// Closest reachable distance from the shoulder
    pub fn min_reach(&self) -> f64 {
        (self.a - self.b).abs()
    }
}

impl Default for ArmGeometry {
    /// The production arm: 6.0" upper and 4.5" lower link.
    fn default() -> Self {
        Self { a: 6.0, b: 4.5 }
    }
}

/// Both inverse kinematics solutions for a reachable target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IkSolutions {
    /// Solution with negative elbow angle
    pub elbow_down: JointAngles,
    /// Solution with positive elbow angle
    pub elbow_up: JointAngles,
}

impl IkSolutions {
    /// The two solutions in a fixed order (elbow-down first).
    pub fn as_array(&self) -> [JointAngles; 2] {
        [self.elbow_down, self.elbow_up]
    }
}

/// Inverse kinematics failure.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum IkError {
    /// Target distance exceeds `a + b` or falls inside `|a - b|`.
    #[error("target ({x:.2}, {y:.2}) unreachable: distance {distance:.3} outside [{min:.3}, {max:.3}]")]
    UnreachableTarget {
        /// Target x
        x: f64,
        /// Target y
        y: f64,
        /// Distance from the shoulder origin
        distance: f64,
        /// Closest reachable distance
        min: f64,
        /// Furthest reachable distance
        max: f64,
    },
}

/// Solve for the joint angles placing the end effector at `(x, y)`, with
/// the shoulder joint at the origin.
///
/// With `d² = x² + y²` and `c = (d² − a² − b²) / 2ab`, a target is
/// reachable iff `|c| ≤ 1`; the two symmetric solutions are
/// `elbow = ±acos(c)` and
/// `shoulder = atan2(y, x) − atan2(b·sin e, a + b·cos e)`.
///
/// Angles are degrees; math is radians internally. At the exact origin the
/// bearing term `atan2(0, 0)` is 0 (guaranteed by IEEE 754 / `f64::atan2`),
/// so the result is deterministic even though the physical bearing is
/// undefined there.
pub fn solve(x: f64, y: f64, geometry: &ArmGeometry) -> Result<IkSolutions, IkError> {
    let a = geometry.proximal();
    let b = geometry.distal();

    let d2 = x * x + y * y;
    let c = (d2 - a * a - b * b) / (2.0 * a * b);
    if c.abs() > 1.0 {
        return Err(IkError::UnreachableTarget {
            x,
            y,
            distance: d2.sqrt(),
            min: geometry.min_reach(),
            max: geometry.max_reach(),
        });
    }

    let bearing = y.atan2(x);
    let pair = |elbow: f64| {
        let shoulder = bearing - (b * elbow.sin()).atan2(a + b * elbow.cos());
        JointAngles::new(shoulder.to_degrees(), elbow.to_degrees())
    };

    let elbow = c.acos();
    Ok(IkSolutions {
        elbow_down: pair(-elbow),
        elbow_up: pair(elbow),
    })
}

/// Forward kinematics: end-effector position for a joint angle pair.
pub fn forward(angles: &JointAngles, geometry: &ArmGeometry) -> (f64, f64) {
    let shoulder = angles.shoulder.to_radians();
    let elbow = angles.elbow.to_radians();
    let a = geometry.proximal();
    let b = geometry.distal();

    let x = a * shoulder.cos() + b * (shoulder + elbow).cos();
    let y = a * shoulder.sin() + b * (shoulder + elbow).sin();
    (x, y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn geometry() -> ArmGeometry {
        ArmGeometry::default()
    }

    fn assert_round_trips(x: f64, y: f64) {
        let solutions = solve(x, y, &geometry()).unwrap();
        for angles in solutions.as_array() {
            let (fx, fy) = forward(&angles, &geometry());
            assert_relative_eq!(fx, x, epsilon = 1e-6);
            assert_relative_eq!(fy, y, epsilon = 1e-6);
        }
    }

    #[test]
    fn forward_reproduces_both_solutions() {
        for &(x, y) in &[
            (5.0, 3.0),
            (10.0, 0.0),
            (2.0, -1.0),
            (0.0, 8.0),
            (-4.0, 4.0),
            (1.6, 0.0),
        ] {
            assert_round_trips(x, y);
        }
    }

    #[test]
    fn solutions_are_symmetric_in_elbow() {
        let solutions = solve(5.0, 3.0, &geometry()).unwrap();
        assert_relative_eq!(
            solutions.elbow_down.elbow,
            -solutions.elbow_up.elbow,
            epsilon = 1e-9
        );
        assert_ne!(solutions.elbow_down.shoulder, solutions.elbow_up.shoulder);
    }

    #[test]
    fn unreachable_beyond_max_reach() {
        let eps = 1e-6;
        let d = geometry().max_reach() + eps;
        let err = solve(d, 0.0, &geometry()).unwrap_err();
        assert!(matches!(err, IkError::UnreachableTarget { .. }));
    }

    #[test]
    fn unreachable_inside_min_reach() {
        let eps = 1e-6;
        let d = geometry().min_reach() - eps;
        let err = solve(0.0, d, &geometry()).unwrap_err();
        assert!(matches!(err, IkError::UnreachableTarget { .. }));
    }

    #[test]
    fn reachable_just_inside_boundary() {
        let eps = 1e-6;
        let d = geometry().max_reach() - eps;
        let solutions = solve(d, 0.0, &geometry()).unwrap();
        // At full extension both elbow angles collapse toward zero
        assert!(solutions.elbow_up.elbow.abs() < 1.0);
        assert_round_trips(d, 0.0);
    }

    #[test]
    fn fully_folded_boundary_is_reachable() {
        let d = geometry().min_reach() + 1e-6;
        assert!(solve(d, 0.0, &geometry()).is_ok());
    }

    #[test]
    fn origin_is_unreachable_for_unequal_links() {
        // min_reach = 1.5 for the default arm, so (0, 0) has |c| > 1
        let err = solve(0.0, 0.0, &geometry()).unwrap_err();
        assert!(matches!(err, IkError::UnreachableTarget { .. }));
    }

    #[test]
    fn origin_shoulder_bearing_is_deterministic_for_equal_links() {
        // Equal links fold back onto the origin; atan2(0, 0) = 0 puts the
        // shoulder bearing along +x
        let geometry = ArmGeometry::new(5.0, 5.0).unwrap();
        let solutions = solve(0.0, 0.0, &geometry).unwrap();
        assert_relative_eq!(solutions.elbow_up.elbow, 180.0, epsilon = 1e-9);
        let (fx, fy) = forward(&solutions.elbow_up, &geometry);
        assert_relative_eq!(fx, 0.0, epsilon = 1e-9);
        assert_relative_eq!(fy, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn rejects_non_positive_links() {
        assert!(ArmGeometry::new(0.0, 4.5).is_err());
        assert!(ArmGeometry::new(6.0, -1.0).is_err());
    }
}
