//! Shared components for the SCARA arm control system.
//!
//! Core geometry and joint types, the persisted calibration artifacts (warp
//! matrix and servo pulse ranges), the plain-text configuration store, and
//! the fixed mapping between the calibrated pixel frame and physical
//! workspace units.

pub mod camera_interface;
pub mod config_storage;
pub mod image_size;
pub mod types;
pub mod warp;
pub mod workspace_frame;

pub use camera_interface::{DeviceError, Frame, FrameSource};
pub use config_storage::{ArmConfig, ConfigError, ConfigStore};
pub use image_size::ImageSize;
pub use types::{
    Joint, JointAngles, JointLimitError, JointLimits, PhysicalPoint, PixelPoint, PulseRange,
};
pub use warp::{fit_warp_matrix, CalibrationSample, WarpFitError, WarpMatrix};
pub use workspace_frame::WorkspaceFrame;
