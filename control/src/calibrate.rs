//! Camera calibration procedure.
//!
//! An operator places the calibration disk on four known workspace marks;
//! for each, the perception front end (undistortion + segmentation +
//! centroid) records where the disk actually lands in raw pixel space.
//! The four correspondences are fitted to a perspective transform, which
//! the caller persists wholesale through the config store.

use thiserror::Error;

use shared::{
    fit_warp_matrix, CalibrationSample, DeviceError, FrameSource, PhysicalPoint, WarpFitError,
    WarpMatrix, WorkspaceFrame,
};
use vision::{pipeline, BlobFilters, ColorRange, UndistortionMap};

/// The four physical reference marks, in workspace units.
///
/// Spread across both workspace halves so the correspondences are far
/// from collinear.
pub const REFERENCE_MARKS: [PhysicalPoint; 4] = [
    PhysicalPoint::new(0.0, 10.5),
    PhysicalPoint::new(0.0, -10.5),
    PhysicalPoint::new(7.0, 7.0),
    PhysicalPoint::new(7.0, -7.0),
];

/// Errors from a calibration attempt. All are fatal to the attempt only;
/// nothing is persisted on failure.
#[derive(Debug, Error)]
pub enum CalibrationError {
    /// The observed points do not determine a stable transform
    #[error(transparent)]
    Degenerate(#[from] WarpFitError),
    /// No qualifying marker blob was visible for a reference point
    #[error("calibration marker not visible at reference point {index} ({x:.1}, {y:.1})", x = .reference.x, y = .reference.y)]
    TargetNotVisible {
        /// Zero-based reference point index
        index: usize,
        /// The reference point the operator was asked to mark
        reference: PhysicalPoint,
    },
    /// The camera failed during sample collection
    #[error(transparent)]
    Device(#[from] DeviceError),
}

/// Collect the four correspondences and fit the warp matrix.
///
/// `ready` is called before each capture with the reference point the
/// operator should place the marker on; it blocks (e.g. on operator
/// input) until the marker is in place.
pub fn run_calibration<C: FrameSource>(
    camera: &mut C,
    undistortion: &UndistortionMap,
    color_range: &ColorRange,
    filters: &BlobFilters,
    workspace: &WorkspaceFrame,
    mut ready: impl FnMut(usize, PhysicalPoint),
) -> Result<WarpMatrix, CalibrationError> {
    let mut samples = Vec::with_capacity(REFERENCE_MARKS.len());

    for (index, &mark) in REFERENCE_MARKS.iter().enumerate() {
        ready(index, mark);

        let frame = camera.capture()?;
        let observed = pipeline::raw_centroid(&frame, undistortion, color_range, filters)
            .ok_or(CalibrationError::TargetNotVisible {
                index,
                reference: mark,
            })?;
        let expected = workspace.to_pixel(mark);
        log::info!(
            "calibration point {}: physical ({:.1}, {:.1}) observed at pixel ({:.1}, {:.1})",
            index + 1,
            mark.x,
            mark.y,
            observed.x,
            observed.y
        );
        samples.push(CalibrationSample::new(expected, observed));
    }

    let samples: [CalibrationSample; 4] = samples
        .try_into()
        .expect("exactly four reference marks are collected");
    let warp = fit_warp_matrix(&samples)?;
    log::info!("perspective calibration fitted");
    Ok(warp)
}
