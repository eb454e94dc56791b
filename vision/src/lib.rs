//! Perception pipeline for the overhead workspace camera.
//!
//! Turns a raw fisheye frame into the physical coordinate of the target
//! disk: undistortion through precomputed remap tables, HSV color
//! segmentation, shape-qualified blob selection, moment centroid,
//! perspective rectification through the calibrated warp matrix, and
//! conversion to workspace units.
//!
//! Every stage is a pure transform of the previous stage's output; all
//! failure modes resolve to an absent observation rather than an error.

pub mod blob;
pub mod color;
pub mod fisheye;
pub mod pipeline;
pub mod undistort;

pub use blob::{Blob, BlobFilters, BoundingBox};
pub use color::{ColorRange, Hsv};
pub use fisheye::FisheyeModel;
pub use pipeline::{DebugBundle, PerceptionContext};
pub use undistort::UndistortionMap;
