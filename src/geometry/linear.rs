//! Fixed-size matrix and vector helpers for the odometry pipeline.
//!
//! All pose math runs on nalgebra types; `Mat` only appears at the OpenCV
//! boundary. The helpers here synthesize the calibration matrix and move
//! 3x3 / 3x1 blocks across that boundary.

use anyhow::Result;
use nalgebra::{Matrix3, Vector3};
use opencv::core::{self, Mat};
use opencv::prelude::*;

/// Focal-length heuristic applied to both axes. No external calibration is
/// accepted, so intrinsics are synthesized from the frame dimensions alone.
const FOCAL_FACTOR: f64 = 0.9;

/// Synthesize the calibration matrix for a frame of the given size:
/// fx = 0.9·w, fy = 0.9·h, principal point at the image center.
pub fn calibration_matrix(width: i32, height: i32) -> Matrix3<f64> {
    let (w, h) = (width as f64, height as f64);
    Matrix3::new(
        FOCAL_FACTOR * w, 0.0, w / 2.0,
        0.0, FOCAL_FACTOR * h, h / 2.0,
        0.0, 0.0, 1.0,
    )
}

/// Convert a nalgebra 3x3 into a CV_64F Mat for calib3d calls.
pub fn matrix3_to_mat(m: &Matrix3<f64>) -> Result<Mat> {
    let mat = Mat::from_slice_2d(&[
        [m[(0, 0)], m[(0, 1)], m[(0, 2)]],
        [m[(1, 0)], m[(1, 1)], m[(1, 2)]],
        [m[(2, 0)], m[(2, 1)], m[(2, 2)]],
    ])?;
    Ok(mat.try_clone()?)
}

/// Convert a continuous 3x3 CV_64F Mat to a nalgebra Matrix3.
pub fn mat_to_matrix3(mat: &Mat) -> Result<Matrix3<f64>> {
    let mut arr = [0.0f64; 9];
    for (i, v) in arr.iter_mut().enumerate() {
        *v = *mat.at::<f64>(i as i32)?;
    }
    Ok(Matrix3::from_row_slice(&arr))
}

/// Read the first three scalars of a translation Mat, tolerating CV_64F or
/// CV_32F storage. Returns None when the Mat is too small or typed otherwise.
pub fn read_vec3(mat: &Mat) -> Option<Vector3<f64>> {
    if mat.rows() * mat.cols() < 3 {
        return None;
    }
    match mat.depth() {
        core::CV_64F => Some(Vector3::new(
            *mat.at::<f64>(0).ok()?,
            *mat.at::<f64>(1).ok()?,
            *mat.at::<f64>(2).ok()?,
        )),
        core::CV_32F => Some(Vector3::new(
            f64::from(*mat.at::<f32>(0).ok()?),
            f64::from(*mat.at::<f32>(1).ok()?),
            f64::from(*mat.at::<f32>(2).ok()?),
        )),
        _ => None,
    }
}

/// True when no component is NaN or infinite.
pub fn vec3_is_finite(v: &Vector3<f64>) -> bool {
    v.iter().all(|c| c.is_finite())
}

/// True when no entry is NaN or infinite.
pub fn matrix3_is_finite(m: &Matrix3<f64>) -> bool {
    m.iter().all(|c| c.is_finite())
}
