//! Orchestration for the SCARA arm: the camera calibration procedure and
//! the autonomous target-tracking loop.

pub mod calibrate;
pub mod tracker;

pub use calibrate::{run_calibration, CalibrationError, REFERENCE_MARKS};
pub use tracker::{ControlState, CycleOutcome, TargetTracker, TrackerConfig, TrackerError, TrackerState};
