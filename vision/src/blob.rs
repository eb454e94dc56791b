//! Connected-component blob extraction and target selection.
//!
//! The segmentation mask is labeled with an 8-connectivity flood fill;
//! each component carries its pixel area, bounding box and area-weighted
//! centroid. Target selection keeps only near-square components above a
//! minimum size and picks the largest survivor.

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use shared::PixelPoint;

/// Bounding box for a detected blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Top left x coordinate
    pub x_min: usize,
    /// Top left y coordinate
    pub y_min: usize,
    /// Width of the bounding box
    pub width: usize,
    /// Height of the bounding box
    pub height: usize,
}

impl BoundingBox {
    /// Absolute difference between width and height, in pixels.
    pub fn squareness_deviation(&self) -> usize {
        self.width.abs_diff(self.height)
    }
}

/// One connected component of the segmentation mask.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Blob {
    /// Pixel count (zeroth image moment)
    pub area: usize,
    /// Axis-aligned bounds
    pub bbox: BoundingBox,
    /// Area-weighted centroid (first moments over the zeroth)
    pub centroid: PixelPoint,
}

/// Shape and size qualification for target candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobFilters {
    /// Maximum allowed |width − height| of the bounding box, in pixels
    pub squareness_tolerance: usize,
    /// Bounding width must strictly exceed this, in pixels
    pub min_width: usize,
}

impl Default for BlobFilters {
    /// Production values: the target disk images as a near-square blob
    /// comfortably wider than sensor noise speckle.
    fn default() -> Self {
        Self {
            squareness_tolerance: 3,
            min_width: 19,
        }
    }
}

impl BlobFilters {
    /// Whether a blob qualifies as a target candidate.
    pub fn qualifies(&self, blob: &Blob) -> bool {
        blob.bbox.squareness_deviation() <= self.squareness_tolerance
            && blob.bbox.width > self.min_width
    }
}

/// Extract all connected components of a binary mask.
///
/// 8-connectivity flood fill; the returned blobs are ordered by first
/// encounter in raster scan order, which makes downstream tie-breaking
/// deterministic. Components always hold at least one pixel, so the
/// centroid division is guarded by construction (and checked anyway).
pub fn find_blobs(mask: &Array2<bool>) -> Vec<Blob> {
    let (rows, cols) = mask.dim();
    let mut visited = Array2::from_elem((rows, cols), false);
    let mut blobs = Vec::new();

    let neighbors = [
        (-1i64, -1i64),
        (-1, 0),
        (-1, 1),
        (0, -1),
        (0, 1),
        (1, -1),
        (1, 0),
        (1, 1),
    ];

    for i in 0..rows {
        for j in 0..cols {
            if !mask[[i, j]] || visited[[i, j]] {
                continue;
            }

            let mut area = 0usize;
            let mut sum_x = 0.0;
            let mut sum_y = 0.0;
            let mut min_row = i;
            let mut max_row = i;
            let mut min_col = j;
            let mut max_col = j;

            let mut stack = vec![(i, j)];
            visited[[i, j]] = true;
            while let Some((y, x)) = stack.pop() {
                area += 1;
                sum_x += x as f64;
                sum_y += y as f64;
                min_row = min_row.min(y);
                max_row = max_row.max(y);
                min_col = min_col.min(x);
                max_col = max_col.max(x);

                for (dy, dx) in neighbors {
                    let ny = y as i64 + dy;
                    let nx = x as i64 + dx;
                    if ny < 0 || nx < 0 || ny >= rows as i64 || nx >= cols as i64 {
                        continue;
                    }
                    let (ny, nx) = (ny as usize, nx as usize);
                    if mask[[ny, nx]] && !visited[[ny, nx]] {
                        visited[[ny, nx]] = true;
                        stack.push((ny, nx));
                    }
                }
            }

            if area == 0 {
                continue;
            }
            blobs.push(Blob {
                area,
                bbox: BoundingBox {
                    x_min: min_col,
                    y_min: min_row,
                    width: max_col - min_col + 1,
                    height: max_row - min_row + 1,
                },
                centroid: PixelPoint::new(sum_x / area as f64, sum_y / area as f64),
            });
        }
    }
    blobs
}

/// Pick the target among qualifying blobs: greatest area, ties broken by
/// first encounter in raster scan order.
pub fn select_target<'a>(blobs: &'a [Blob], filters: &BlobFilters) -> Option<&'a Blob> {
    let mut best: Option<&Blob> = None;
    for blob in blobs.iter().filter(|b| filters.qualifies(b)) {
        match best {
            Some(current) if blob.area <= current.area => {}
            _ => best = Some(blob),
        }
    }
    best
}
