//! Frame source abstraction shared by perception and the device layer.

use ndarray::Array3;
use thiserror::Error;

use crate::image_size::ImageSize;

/// A raw camera frame: `(height, width, 3)` RGB bytes.
pub type Frame = Array3<u8>;

/// A failure reported by an underlying device (camera or actuator).
///
/// Device failures are fatal to the current mode; the control loop still
/// runs its depower sequence on the way out.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("device error: {message}")]
pub struct DeviceError {
    /// Driver-supplied description
    pub message: String,
}

impl DeviceError {
    /// Create a new device error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Interface for frame acquisition.
///
/// Abstracts the camera hardware for testability. Calls are blocking and
/// run to completion; the capture rate is bounded by the caller.
pub trait FrameSource {
    /// Capture one frame.
    fn capture(&mut self) -> Result<Frame, DeviceError>;

    /// The fixed resolution of captured frames.
    fn resolution(&self) -> ImageSize;
}
