//! Perspective (homography) calibration between raw pixel space and the
//! calibrated pixel frame.
//!
//! Stores the 3×3 projective transform fitted from four point
//! correspondences during camera calibration, and the direct linear fit
//! that produces it.

use nalgebra::{DMatrix, DVector, Matrix3};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::PixelPoint;

/// Number of point correspondences consumed by the perspective fit.
///
/// Exactly four non-degenerate correspondences determine a homography;
/// over-determined fits are not supported.
pub const CALIBRATION_POINTS: usize = 4;

/// Denominators below this magnitude are treated as a degenerate projection.
const PROJECTION_EPS: f64 = 1e-9;

/// A 3×3 perspective transform from raw undistorted pixel space to the
/// calibrated pixel frame aligned with the physical workspace axes.
///
/// Applied to homogeneous coordinates:
/// ```text
/// x' = (m00·x + m01·y + m02) / (m20·x + m21·y + m22)
/// y' = (m10·x + m11·y + m12) / (m20·x + m21·y + m22)
/// ```
///
/// Produced by [`fit_warp_matrix`], persisted in the config store, and
/// replaced wholesale on recalibration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WarpMatrix {
    m: [[f64; 3]; 3],
}

impl WarpMatrix {
    /// Identity transform (calibrated frame equals raw frame).
    pub fn identity() -> Self {
        Self::from_matrix(&Matrix3::identity())
    }

    /// Build from a nalgebra matrix.
    pub fn from_matrix(m: &Matrix3<f64>) -> Self {
        let mut rows = [[0.0; 3]; 3];
        for (r, row) in rows.iter_mut().enumerate() {
            for (c, v) in row.iter_mut().enumerate() {
                *v = m[(r, c)];
            }
        }
        Self { m: rows }
    }

    /// View as a nalgebra matrix.
    pub fn as_matrix(&self) -> Matrix3<f64> {
        Matrix3::from_fn(|r, c| self.m[r][c])
    }

    /// Row-major element order, as persisted by the config store.
    pub fn to_row_values(&self) -> [f64; 9] {
        let mut out = [0.0; 9];
        for r in 0..3 {
            for c in 0..3 {
                out[3 * r + c] = self.m[r][c];
            }
        }
        out
    }

    /// Rebuild from row-major element order.
    pub fn from_row_values(values: &[f64; 9]) -> Self {
        let mut rows = [[0.0; 3]; 3];
        for r in 0..3 {
            for c in 0..3 {
                rows[r][c] = values[3 * r + c];
            }
        }
        Self { m: rows }
    }

    /// Whether the transform is usable (non-degenerate).
    pub fn is_invertible(&self) -> bool {
        self.as_matrix().determinant().abs() > PROJECTION_EPS
    }

    /// Map a pixel point through the transform as a homogeneous coordinate.
    ///
    /// Returns `None` when the projective denominator is numerically zero;
    /// the caller must treat the observation as invalid rather than
    /// propagate infinity.
    pub fn apply(&self, p: PixelPoint) -> Option<PixelPoint> {
        let m = &self.m;
        let denom = m[2][0] * p.x + m[2][1] * p.y + m[2][2];
        if denom.abs() < PROJECTION_EPS {
            return None;
        }
        let x = (m[0][0] * p.x + m[0][1] * p.y + m[0][2]) / denom;
        let y = (m[1][0] * p.x + m[1][1] * p.y + m[1][2]) / denom;
        Some(PixelPoint::new(x, y))
    }
}

/// One calibration correspondence: where a reference point should land in
/// the calibrated frame, and where its marker was actually observed in the
/// raw undistorted frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationSample {
    /// Expected position in the calibrated pixel frame
    pub expected: PixelPoint,
    /// Observed raw pixel centroid of the calibration marker
    pub observed: PixelPoint,
}

impl CalibrationSample {
    /// Create a new correspondence
    pub fn new(expected: PixelPoint, observed: PixelPoint) -> Self {
        Self { expected, observed }
    }
}

/// Errors from the perspective fit.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum WarpFitError {
    /// The point configuration does not determine a stable homography.
    ///
    /// Persisting a matrix fitted from such points would corrupt all
    /// subsequent perception, so the fit refuses instead.
    #[error("degenerate calibration point configuration: {reason}")]
    DegenerateConfiguration {
        /// Human-readable description of the degeneracy
        reason: String,
    },
}

/// Twice the signed triangle area; near zero means collinear points.
fn doubled_triangle_area(a: PixelPoint, b: PixelPoint, c: PixelPoint) -> f64 {
    (b.x - a.x) * (c.y - a.y) - (c.x - a.x) * (b.y - a.y)
}

/// Reject point sets containing a near-collinear triple.
///
/// Collinear correspondences make the DLT system rank-deficient; the
/// threshold is in squared pixels, far below any sane marker spacing.
fn check_non_collinear(points: &[PixelPoint; 4], label: &str) -> Result<(), WarpFitError> {
    const MIN_DOUBLED_AREA: f64 = 1.0;
    for i in 0..2 {
        for j in (i + 1)..3 {
            for k in (j + 1)..4 {
                if doubled_triangle_area(points[i], points[j], points[k]).abs() < MIN_DOUBLED_AREA {
                    return Err(WarpFitError::DegenerateConfiguration {
                        reason: format!(
                            "{label} points {}, {} and {} are nearly collinear",
                            i + 1,
                            j + 1,
                            k + 1
                        ),
                    });
                }
            }
        }
    }
    Ok(())
}

/// Fit the perspective transform from exactly four correspondences.
///
/// Solves `expected ~ H · observed` with the bottom-right element pinned
/// to 1: each correspondence contributes two rows to an 8×8 linear system
/// solved via SVD (robust to ill-conditioned systems). Four non-degenerate
/// correspondences are satisfied exactly.
pub fn fit_warp_matrix(
    samples: &[CalibrationSample; CALIBRATION_POINTS],
) -> Result<WarpMatrix, WarpFitError> {
    let observed = [
        samples[0].observed,
        samples[1].observed,
        samples[2].observed,
        samples[3].observed,
    ];
    let expected = [
        samples[0].expected,
        samples[1].expected,
        samples[2].expected,
        samples[3].expected,
    ];
    check_non_collinear(&observed, "observed")?;
    check_non_collinear(&expected, "expected")?;

    let mut a = DMatrix::<f64>::zeros(2 * CALIBRATION_POINTS, 8);
    let mut b = DVector::<f64>::zeros(2 * CALIBRATION_POINTS);
    for (i, sample) in samples.iter().enumerate() {
        let x = sample.observed.x;
        let y = sample.observed.y;
        let u = sample.expected.x;
        let v = sample.expected.y;

        let r0 = 2 * i;
        let r1 = 2 * i + 1;

        a[(r0, 0)] = x;
        a[(r0, 1)] = y;
        a[(r0, 2)] = 1.0;
        a[(r0, 6)] = -u * x;
        a[(r0, 7)] = -u * y;
        b[r0] = u;

        a[(r1, 3)] = x;
        a[(r1, 4)] = y;
        a[(r1, 5)] = 1.0;
        a[(r1, 6)] = -v * x;
        a[(r1, 7)] = -v * y;
        b[r1] = v;
    }

    let svd = a.svd(true, true);

    // A near-singular system means the points do not determine the
    // transform even when no triple is exactly collinear.
    let sigma = &svd.singular_values;
    let condition = sigma.min() / sigma.max();
    if !condition.is_finite() || condition < 1e-12 {
        return Err(WarpFitError::DegenerateConfiguration {
            reason: format!("near-singular correspondence system (conditioning {condition:.2e})"),
        });
    }

    let h = svd
        .solve(&b, 1e-12)
        .map_err(|_| WarpFitError::DegenerateConfiguration {
            reason: "SVD solve failed".to_string(),
        })?;

    let m = Matrix3::new(h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], 1.0);
    let warp = WarpMatrix::from_matrix(&m);
    if !warp.is_invertible() {
        return Err(WarpFitError::DegenerateConfiguration {
            reason: "fitted matrix is singular".to_string(),
        });
    }
    Ok(warp)
}
