//! The end-to-end perception pipeline.
//!
//! Stages: undistort → HSV segment → blob select → centroid → perspective
//! correct → unit convert. Each stage is a pure transform; every failure
//! mode (no qualifying blob, degenerate moments, vanishing projective
//! denominator) resolves to an absent observation rather than an error.

use std::path::Path;

use ndarray::Array2;

use shared::{Frame, PhysicalPoint, PixelPoint, WarpMatrix, WorkspaceFrame};

use crate::blob::{self, Blob, BlobFilters};
use crate::color::{self, ColorRange};
use crate::undistort::UndistortionMap;

/// Immutable perception configuration and calibration artifacts, shared
/// read-only by every cycle.
#[derive(Debug, Clone)]
pub struct PerceptionContext {
    /// Lens correction tables for the active resolution
    pub undistortion: UndistortionMap,
    /// Perspective calibration from the config store
    pub warp: WarpMatrix,
    /// Target color bounds
    pub color_range: ColorRange,
    /// Blob qualification thresholds
    pub filters: BlobFilters,
    /// Calibrated-pixel to physical-unit mapping
    pub workspace: WorkspaceFrame,
}

impl PerceptionContext {
    /// Locate the target in a raw frame, in physical workspace units.
    pub fn locate(&self, frame: &Frame) -> Option<PhysicalPoint> {
        let centroid = raw_centroid(frame, &self.undistortion, &self.color_range, &self.filters)?;
        let corrected = self.warp.apply(centroid)?;
        Some(self.workspace.to_physical(corrected))
    }

    /// Stages 1–4 only: the target's centroid in raw undistorted pixel
    /// space. This is what the calibration procedure records against each
    /// reference point.
    pub fn raw_centroid(&self, frame: &Frame) -> Option<PixelPoint> {
        raw_centroid(frame, &self.undistortion, &self.color_range, &self.filters)
    }

    /// Like [`locate`](Self::locate), additionally returning the
    /// intermediate artifacts for visualization. Not used on the control
    /// path.
    pub fn locate_debug(&self, frame: &Frame) -> (Option<PhysicalPoint>, DebugBundle) {
        let undistorted = self.undistortion.remap(frame);
        let mask = color::hsv_mask(&undistorted, &self.color_range);
        let candidates = blob::find_blobs(&mask);
        let selected = blob::select_target(&candidates, &self.filters).copied();

        let observation = selected
            .and_then(|blob| centroid_of(&blob))
            .and_then(|c| self.warp.apply(c))
            .map(|corrected| self.workspace.to_physical(corrected));

        let bundle = DebugBundle {
            undistorted,
            mask,
            candidates,
            selected,
        };
        (observation, bundle)
    }
}

/// Run perception stages 1–4 on a raw frame.
pub fn raw_centroid(
    frame: &Frame,
    undistortion: &UndistortionMap,
    color_range: &ColorRange,
    filters: &BlobFilters,
) -> Option<PixelPoint> {
    let undistorted = undistortion.remap(frame);
    let mask = color::hsv_mask(&undistorted, color_range);
    let blobs = blob::find_blobs(&mask);
    let target = blob::select_target(&blobs, filters)?;
    centroid_of(target)
}

/// A blob's centroid, guarding the degenerate zero-area case.
fn centroid_of(blob: &Blob) -> Option<PixelPoint> {
    if blob.area == 0 {
        return None;
    }
    Some(blob.centroid)
}

/// Intermediate artifacts of one perception cycle, for visualization.
#[derive(Debug, Clone)]
pub struct DebugBundle {
    /// Frame after lens correction
    pub undistorted: Frame,
    /// Binary segmentation mask
    pub mask: Array2<bool>,
    /// All connected components found in the mask
    pub candidates: Vec<Blob>,
    /// The qualifying blob chosen as the target, if any
    pub selected: Option<Blob>,
}

impl DebugBundle {
    /// Dump the undistorted frame and mask as PNGs into a directory.
    pub fn save_to_dir(&self, dir: &Path) -> std::io::Result<()> {
        std::fs::create_dir_all(dir)?;

        let (rows, cols, _) = self.undistorted.dim();
        let rgb: Vec<u8> = self.undistorted.iter().copied().collect();
        let rgb_image = image::RgbImage::from_raw(cols as u32, rows as u32, rgb)
            .expect("frame dimensions match buffer length");
        rgb_image
            .save(dir.join("undistorted.png"))
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;

        let mask: Vec<u8> = self.mask.iter().map(|&m| if m { 255 } else { 0 }).collect();
        let mask_image = image::GrayImage::from_raw(cols as u32, rows as u32, mask)
            .expect("mask dimensions match buffer length");
        mask_image
            .save(dir.join("mask.png"))
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;
    use shared::ImageSize;

    const TARGET_RGB: [u8; 3] = [200, 60, 20];

    fn size() -> ImageSize {
        ImageSize::from_width_height(160, 120)
    }

    /// Frame with a square target-colored patch centered at (cx, cy).
    fn frame_with_target(size: ImageSize, cx: usize, cy: usize, half: usize) -> Frame {
        let mut frame = Frame::zeros((size.height, size.width, 3));
        for row in cy - half..=cy + half {
            for col in cx - half..=cx + half {
                for ch in 0..3 {
                    frame[[row, col, ch]] = TARGET_RGB[ch];
                }
            }
        }
        frame
    }

    fn context() -> PerceptionContext {
        PerceptionContext {
            undistortion: UndistortionMap::identity(size()),
            warp: WarpMatrix::identity(),
            color_range: ColorRange::default(),
            filters: BlobFilters::default(),
            workspace: WorkspaceFrame {
                x_offset: 0.0,
                x_per_row: 0.1,
                y_offset: 0.0,
                y_per_col: 0.1,
            },
        }
    }

    #[test]
    fn locates_target_in_physical_units() {
        let frame = frame_with_target(size(), 40, 70, 15);
        let observed = context().locate(&frame).unwrap();
        assert_relative_eq!(observed.x, 7.0, epsilon = 1e-9);
        assert_relative_eq!(observed.y, 4.0, epsilon = 1e-9);
    }

    #[test]
    fn empty_frame_is_not_found() {
        let frame = Frame::zeros((size().height, size().width, 3));
        assert!(context().locate(&frame).is_none());
    }

    #[test]
    fn undersized_target_is_not_found() {
        // 9x9 patch: square, but below the minimum width
        let frame = frame_with_target(size(), 40, 70, 4);
        assert!(context().locate(&frame).is_none());
    }

    #[test]
    fn vanishing_denominator_is_not_found() {
        let mut ctx = context();
        // Denominator row annihilates the target centroid (40, 70)
        ctx.warp = WarpMatrix::from_row_values(&[
            1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 1.0, 0.0, -40.0,
        ]);
        let frame = frame_with_target(size(), 40, 70, 15);
        assert!(ctx.locate(&frame).is_none());
    }

    #[test]
    fn tolerates_background_noise() {
        let mut frame = frame_with_target(size(), 40, 70, 15);
        // Sprinkle dim gray speckle everywhere; none of it is in the
        // target color range, and isolated pixels fail the size filter
        // anyway
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for row in 0..size().height {
            for col in 0..size().width {
                if frame[[row, col, 0]] == 0 && rng.random_bool(0.05) {
                    let v = rng.random_range(10..60);
                    for ch in 0..3 {
                        frame[[row, col, ch]] = v;
                    }
                }
            }
        }
        let observed = context().locate(&frame).unwrap();
        assert_relative_eq!(observed.x, 7.0, epsilon = 1e-9);
        assert_relative_eq!(observed.y, 4.0, epsilon = 1e-9);
    }

    #[test]
    fn debug_bundle_exposes_selection() {
        let frame = frame_with_target(size(), 40, 70, 15);
        let (observation, bundle) = context().locate_debug(&frame);
        assert!(observation.is_some());
        assert_eq!(bundle.candidates.len(), 1);
        let selected = bundle.selected.unwrap();
        assert_eq!(selected.bbox.width, 31);
        assert!(bundle.mask[[70, 40]]);
    }

    #[test]
    fn debug_and_control_paths_agree() {
        let frame = frame_with_target(size(), 40, 70, 15);
        let ctx = context();
        let (debug_obs, _) = ctx.locate_debug(&frame);
        assert_eq!(ctx.locate(&frame), debug_obs);
    }
}
