//! Per-pixel remapping through precomputed undistortion tables.

use ndarray::Array2;

use shared::{Frame, ImageSize};

/// Precomputed source-coordinate tables for lens undistortion.
///
/// `map_x[[row, col]]` / `map_y[[row, col]]` give the source pixel sampled
/// (with bilinear interpolation) for each corrected output pixel. Derived
/// once from the lens model at startup; immutable for the process lifetime
/// and shared read-only by every perception cycle.
#[derive(Debug, Clone)]
pub struct UndistortionMap {
    map_x: Array2<f32>,
    map_y: Array2<f32>,
    size: ImageSize,
}

impl UndistortionMap {
    /// Build a map by evaluating `f(col, row) -> (src_x, src_y)` at every
    /// output pixel.
    pub fn from_fn(size: ImageSize, f: impl Fn(usize, usize) -> (f32, f32)) -> Self {
        let mut map_x = Array2::zeros((size.height, size.width));
        let mut map_y = Array2::zeros((size.height, size.width));
        for row in 0..size.height {
            for col in 0..size.width {
                let (sx, sy) = f(col, row);
                map_x[[row, col]] = sx;
                map_y[[row, col]] = sy;
            }
        }
        Self { map_x, map_y, size }
    }

    /// The identity map: every pixel samples itself. Useful for tests and
    /// for bypassing lens correction.
    pub fn identity(size: ImageSize) -> Self {
        Self::from_fn(size, |col, row| (col as f32, row as f32))
    }

    /// Output (and expected input) frame size.
    pub fn size(&self) -> ImageSize {
        self.size
    }

    /// Source coordinate sampled for one output pixel.
    pub fn source_for(&self, col: usize, row: usize) -> (f32, f32) {
        (self.map_x[[row, col]], self.map_y[[row, col]])
    }

    /// Remap a frame through the tables.
    ///
    /// Bilinear interpolation per channel; samples falling outside the
    /// source frame contribute a constant black border.
    pub fn remap(&self, frame: &Frame) -> Frame {
        let (rows, cols, channels) = frame.dim();
        debug_assert_eq!((cols, rows), (self.size.width, self.size.height));

        let mut out = Frame::zeros((self.size.height, self.size.width, channels));
        for row in 0..self.size.height {
            for col in 0..self.size.width {
                let sx = self.map_x[[row, col]];
                let sy = self.map_y[[row, col]];
                for ch in 0..channels {
                    out[[row, col, ch]] = sample_bilinear(frame, sx, sy, ch);
                }
            }
        }
        out
    }
}

/// Bilinear sample of one channel, constant zero outside the frame.
fn sample_bilinear(frame: &Frame, x: f32, y: f32, channel: usize) -> u8 {
    let (rows, cols, _) = frame.dim();

    let x0 = x.floor();
    let y0 = y.floor();
    let fx = (x - x0) as f64;
    let fy = (y - y0) as f64;

    let fetch = |xi: f64, yi: f64| -> f64 {
        if xi < 0.0 || yi < 0.0 || xi >= cols as f64 || yi >= rows as f64 {
            0.0
        } else {
            frame[[yi as usize, xi as usize, channel]] as f64
        }
    };

    let x0 = x0 as f64;
    let y0 = y0 as f64;
    let value = fetch(x0, y0) * (1.0 - fx) * (1.0 - fy)
        + fetch(x0 + 1.0, y0) * fx * (1.0 - fy)
        + fetch(x0, y0 + 1.0) * (1.0 - fx) * fy
        + fetch(x0 + 1.0, y0 + 1.0) * fx * fy;
    value.round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_size() -> ImageSize {
        ImageSize::from_width_height(8, 6)
    }

    fn gradient_frame(size: ImageSize) -> Frame {
        Frame::from_shape_fn((size.height, size.width, 3), |(row, col, ch)| {
            (row * 20 + col * 3 + ch) as u8
        })
    }

    #[test]
    fn identity_map_is_identity() {
        let size = small_size();
        let frame = gradient_frame(size);
        let out = UndistortionMap::identity(size).remap(&frame);
        assert_eq!(out, frame);
    }

    #[test]
    fn half_pixel_shift_averages_neighbors() {
        let size = small_size();
        let mut frame = Frame::zeros((size.height, size.width, 3));
        frame[[2, 3, 0]] = 100;
        frame[[2, 4, 0]] = 200;

        let map = UndistortionMap::from_fn(size, |col, row| (col as f32 + 0.5, row as f32));
        let out = map.remap(&frame);
        assert_eq!(out[[2, 3, 0]], 150);
    }

    #[test]
    fn out_of_bounds_samples_are_black() {
        let size = small_size();
        let frame = Frame::from_elem((size.height, size.width, 3), 255);
        let map = UndistortionMap::from_fn(size, |col, row| {
            (col as f32 - 100.0, row as f32 - 100.0)
        });
        let out = map.remap(&frame);
        assert!(out.iter().all(|&v| v == 0));
    }
}
