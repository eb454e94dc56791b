//! Device interfaces for the SCARA arm.
//!
//! The control loop talks to the arm and the camera only through the
//! traits here (frame acquisition lives in `shared::camera_interface`);
//! real servo and camera drivers implement them on the robot, and the
//! mocks in [`mock`] stand in for tests and demos.

pub mod arm_interface;
pub mod mock;

pub use arm_interface::ArmInterface;
pub use mock::{ArmCommand, RecordingArm, ScriptedCamera};
