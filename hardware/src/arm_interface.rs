//! Arm actuation trait for the control loop.

use shared::{DeviceError, Joint};

/// Interface for arm actuation
///
/// Abstracts the servo hardware for testability in control workflows.
/// The two joints are independently addressable; the underlying driver
/// maps joint angles to servo pulses using the persisted pulse-range
/// calibration.
pub trait ArmInterface {
    /// Command one joint to an angle in degrees, or release motor power.
    ///
    /// # Arguments
    /// * `joint` - Which joint to command
    /// * `angle` - Target angle in degrees; `None` depowers the servo
    fn set_angle(&mut self, joint: Joint, angle: Option<f64>) -> Result<(), DeviceError>;
}
