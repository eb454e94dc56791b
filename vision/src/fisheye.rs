//! Wide-angle lens model and undistortion map derivation.
//!
//! The camera uses an equidistant ("fisheye") projection: a ray at angle θ
//! from the optical axis lands at normalized radius `θ_d = θ(1 + k1·θ² +
//! k2·θ⁴ + k3·θ⁶ + k4·θ⁸)`. The intrinsic matrix and distortion
//! coefficients come from a one-time lens calibration at full sensor
//! resolution; operational captures run at a smaller resolution, so the
//! intrinsics are rescaled before the remap tables are built.

use nalgebra::Matrix3;
use serde::{Deserialize, Serialize};

use shared::ImageSize;

use crate::undistort::UndistortionMap;

/// Fixed-point iterations for inverting the radial distortion polynomial.
const UNDISTORT_ITERS: usize = 10;

/// Intrinsic and distortion parameters of the fisheye lens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FisheyeModel {
    /// Intrinsic matrix at the calibration resolution
    k: [[f64; 3]; 3],
    /// Equidistant distortion coefficients k1..k4
    d: [f64; 4],
    /// Resolution of the lens calibration images
    calibration_size: ImageSize,
}

impl FisheyeModel {
    /// Create a model from an intrinsic matrix, distortion coefficients and
    /// the resolution the lens was calibrated at.
    pub fn new(k: Matrix3<f64>, d: [f64; 4], calibration_size: ImageSize) -> Self {
        let mut rows = [[0.0; 3]; 3];
        for (r, row) in rows.iter_mut().enumerate() {
            for (c, v) in row.iter_mut().enumerate() {
                *v = k[(r, c)];
            }
        }
        Self {
            k: rows,
            d,
            calibration_size,
        }
    }

    /// Intrinsic matrix rescaled to the active capture resolution.
    ///
    /// Focal lengths and principal point scale with the width ratio; the
    /// homogeneous element stays 1.
    pub fn scaled_k(&self, size: ImageSize) -> Matrix3<f64> {
        let scale = size.width as f64 / self.calibration_size.width as f64;
        let mut k = Matrix3::from_fn(|r, c| self.k[r][c]) * scale;
        k[(2, 2)] = 1.0;
        k
    }

    /// Forward radial distortion: θ → θ_d.
    fn distort_theta(&self, theta: f64) -> f64 {
        let t2 = theta * theta;
        theta
            * (1.0
                + self.d[0] * t2
                + self.d[1] * t2 * t2
                + self.d[2] * t2 * t2 * t2
                + self.d[3] * t2 * t2 * t2 * t2)
    }

    /// Inverse radial distortion: θ_d → θ, by fixed-point iteration.
    fn undistort_theta(&self, theta_d: f64) -> f64 {
        let mut theta = theta_d;
        for _ in 0..UNDISTORT_ITERS {
            theta -= self.distort_theta(theta) - theta_d;
        }
        theta
    }

    /// Undistort a normalized distorted point to perspective coordinates.
    fn undistort_normalized(&self, xd: f64, yd: f64) -> (f64, f64) {
        let r_d = (xd * xd + yd * yd).sqrt();
        if r_d < 1e-12 {
            return (xd, yd);
        }
        let theta = self.undistort_theta(r_d);
        let scale = theta.tan() / r_d;
        (xd * scale, yd * scale)
    }

    /// Estimate the rectified camera matrix for the active resolution.
    ///
    /// The four edge midpoints of the frame are undistorted and the new
    /// focal length chosen between the tightest and loosest fit:
    /// `balance` = 0 keeps maximum resolution (edges may crop), 1 keeps the
    /// whole field of view.
    pub fn estimate_new_k(&self, size: ImageSize, balance: f64) -> Matrix3<f64> {
        let balance = balance.clamp(0.0, 1.0);
        let w = size.width as f64;
        let h = size.height as f64;

        let k = self.scaled_k(size);
        let fx = k[(0, 0)];
        let fy = k[(1, 1)];
        let cx = k[(0, 2)];
        let cy = k[(1, 2)];
        let aspect = fy / fx;

        // Undistort the edge midpoints, y pre-scaled to unit aspect
        let midpoints = [
            (w / 2.0, 0.0),
            (w, h / 2.0),
            (w / 2.0, h),
            (0.0, h / 2.0),
        ];
        let undistorted: Vec<(f64, f64)> = midpoints
            .iter()
            .map(|&(u, v)| {
                let xd = (u - cx) / fx;
                let yd = (v - cy) / fy / aspect;
                self.undistort_normalized(xd, yd)
            })
            .collect();

        let n = undistorted.len() as f64;
        let cn_x = undistorted.iter().map(|p| p.0).sum::<f64>() / n;
        let cn_y = undistorted.iter().map(|p| p.1).sum::<f64>() / n;

        let min_x = undistorted.iter().map(|p| p.0).fold(f64::INFINITY, f64::min);
        let max_x = undistorted
            .iter()
            .map(|p| p.0)
            .fold(f64::NEG_INFINITY, f64::max);
        let min_y = undistorted.iter().map(|p| p.1).fold(f64::INFINITY, f64::min);
        let max_y = undistorted
            .iter()
            .map(|p| p.1)
            .fold(f64::NEG_INFINITY, f64::max);

        let f1 = w * 0.5 / (cn_x - min_x);
        let f2 = w * 0.5 / (max_x - cn_x);
        let f3 = h * 0.5 * aspect / (cn_y - min_y);
        let f4 = h * 0.5 * aspect / (max_y - cn_y);

        let f_min = f1.min(f2).min(f3.min(f4));
        let f_max = f1.max(f2).max(f3.max(f4));
        let f = balance * f_min + (1.0 - balance) * f_max;

        let mut new_k = Matrix3::identity();
        new_k[(0, 0)] = f;
        new_k[(1, 1)] = f * aspect;
        new_k[(0, 2)] = -cn_x * f + w * 0.5;
        new_k[(1, 2)] = -cn_y * f * aspect + h * 0.5;
        new_k
    }

    /// Build per-pixel remap tables for the active resolution.
    ///
    /// For each rectified output pixel: back-project through the new camera
    /// matrix, apply the forward distortion, and project through the scaled
    /// intrinsics to find the source pixel. Derived once outside the hot
    /// loop; the tables are immutable afterwards.
    pub fn undistortion_map(&self, size: ImageSize, balance: f64) -> UndistortionMap {
        let k = self.scaled_k(size);
        let fx = k[(0, 0)];
        let fy = k[(1, 1)];
        let cx = k[(0, 2)];
        let cy = k[(1, 2)];

        let new_k = self.estimate_new_k(size, balance);
        log::debug!(
            "undistortion map for {size}: focal {:.1} px, principal point ({:.1}, {:.1})",
            new_k[(0, 0)],
            new_k[(0, 2)],
            new_k[(1, 2)]
        );
        let nfx = new_k[(0, 0)];
        let nfy = new_k[(1, 1)];
        let ncx = new_k[(0, 2)];
        let ncy = new_k[(1, 2)];

        UndistortionMap::from_fn(size, |col, row| {
            let x = (col as f64 - ncx) / nfx;
            let y = (row as f64 - ncy) / nfy;
            let r = (x * x + y * y).sqrt();
            let theta = r.atan();
            let theta_d = self.distort_theta(theta);
            let scale = if r > 1e-8 { theta_d / r } else { 1.0 };
            let xd = x * scale;
            let yd = y * scale;
            ((fx * xd + cx) as f32, (fy * yd + cy) as f32)
        })
    }
}

impl Default for FisheyeModel {
    /// The production lens: Inland 130° wide-angle module, calibrated at
    /// the full 2592×1944 sensor resolution.
    fn default() -> Self {
        Self {
            k: [
                [1462.6951722364404, 0.0, 1299.7703062382923],
                [0.0, 1470.2235929713356, 1117.7747313303344],
                [0.0, 0.0, 1.0],
            ],
            d: [
                0.009814035612875105,
                -0.11013806105044097,
                0.10444574816339373,
                -0.026263330725614136,
            ],
            calibration_size: ImageSize::from_width_height(2592, 1944),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn capture_size() -> ImageSize {
        ImageSize::from_width_height(640, 480)
    }

    #[test]
    fn scaled_k_preserves_homogeneous_element() {
        let model = FisheyeModel::default();
        let k = model.scaled_k(capture_size());
        assert_relative_eq!(k[(2, 2)], 1.0, epsilon = 1e-12);
        // 640/2592 scaling applied to the focal length
        assert_relative_eq!(
            k[(0, 0)],
            1462.6951722364404 * 640.0 / 2592.0,
            epsilon = 1e-9
        );
    }

    #[test]
    fn theta_inversion_round_trips() {
        let model = FisheyeModel::default();
        for &theta in &[0.0, 0.1, 0.4, 0.8, 1.1] {
            let theta_d = model.distort_theta(theta);
            assert_relative_eq!(model.undistort_theta(theta_d), theta, epsilon = 1e-9);
        }
    }

    #[test]
    fn distortion_free_model_has_centered_principal_point() {
        let size = capture_size();
        let k = Matrix3::new(500.0, 0.0, 320.0, 0.0, 500.0, 240.0, 0.0, 0.0, 1.0);
        let model = FisheyeModel::new(k, [0.0; 4], size);
        let new_k = model.estimate_new_k(size, 0.0);
        assert_relative_eq!(new_k[(0, 2)], 320.0, epsilon = 1.0);
        assert_relative_eq!(new_k[(1, 2)], 240.0, epsilon = 1.0);
    }

    #[test]
    fn balance_zero_uses_larger_focal_than_balance_one() {
        let model = FisheyeModel::default();
        let tight = model.estimate_new_k(capture_size(), 0.0);
        let full = model.estimate_new_k(capture_size(), 1.0);
        assert!(tight[(0, 0)] >= full[(0, 0)]);
    }

    #[test]
    fn map_center_stays_near_center() {
        // The optical axis is a fixed point of the radial model, so the
        // principal point of the new camera maps back to the principal
        // point of the scaled intrinsics.
        let size = capture_size();
        let k = Matrix3::new(400.0, 0.0, 320.0, 0.0, 400.0, 240.0, 0.0, 0.0, 1.0);
        let model = FisheyeModel::new(k, [0.01, -0.002, 0.0, 0.0], size);
        let map = model.undistortion_map(size, 0.0);
        let new_k = model.estimate_new_k(size, 0.0);
        let (sx, sy) = map.source_for(
            new_k[(0, 2)].round() as usize,
            new_k[(1, 2)].round() as usize,
        );
        assert_relative_eq!(sx as f64, 320.0, epsilon = 2.0);
        assert_relative_eq!(sy as f64, 240.0, epsilon = 2.0);
    }
}
