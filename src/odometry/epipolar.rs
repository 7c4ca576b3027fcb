//! Epipolar geometry attempt: model estimation and pose recovery.
//!
//! The essential-matrix path is preferred. When only fundamental estimation
//! is offered, the essential matrix is derived as `E = Kᵀ·F·K`. With neither,
//! the engine falls back to median flow.

use anyhow::Result;
use nalgebra::{Matrix3, Vector3};
use opencv::calib3d;
use opencv::core::{Mat, Point2f, Vector};
use opencv::prelude::*;

use crate::geometry::{mat_to_matrix3, matrix3_to_mat, read_vec3};

/// RANSAC confidence for model estimation.
const RANSAC_CONFIDENCE: f64 = 0.999;
/// Reprojection threshold in pixels, shared by both estimators.
const RANSAC_THRESHOLD: f64 = 1.5;
const RANSAC_MAX_ITERS: i32 = 1000;

/// Which estimation entry points the vision capability offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GeometryCapability {
    #[default]
    Essential,
    Fundamental,
    Unavailable,
}

impl GeometryCapability {
    pub fn label(self) -> &'static str {
        match self {
            Self::Essential => "essential",
            Self::Fundamental => "fundamental",
            Self::Unavailable => "missing",
        }
    }
}

/// Output of a pose recovery: relative rotation, unit-scale translation
/// direction (sign and magnitude ambiguous), and the cheirality inlier count.
pub struct PoseRecovery {
    pub rotation: Matrix3<f64>,
    /// None when the translation Mat could not be read back.
    pub translation: Option<Vector3<f64>>,
    pub inlier_count: usize,
}

/// Derive the essential matrix from a fundamental matrix and intrinsics.
pub fn essential_from_fundamental(k: &Matrix3<f64>, f: &Matrix3<f64>) -> Matrix3<f64> {
    k.transpose() * f * k
}

/// Thin wrapper over the calib3d estimation entry points, parameterized by
/// the available capability so degraded paths stay reachable.
pub struct EpipolarEstimator {
    capability: GeometryCapability,
}

impl EpipolarEstimator {
    pub fn new(capability: GeometryCapability) -> Self {
        Self { capability }
    }

    pub fn capability(&self) -> GeometryCapability {
        self.capability
    }

    /// Estimate an essential matrix for the kept correspondences. `mask`
    /// receives per-correspondence inlier flags. Returns None when the
    /// capability is unavailable or the estimator produced an empty model.
    pub fn estimate(
        &self,
        previous: &Vector<Point2f>,
        current: &Vector<Point2f>,
        calibration: &Matrix3<f64>,
        mask: &mut Mat,
    ) -> Result<Option<Mat>> {
        match self.capability {
            GeometryCapability::Essential => {
                let k = matrix3_to_mat(calibration)?;
                let essential = calib3d::find_essential_mat(
                    previous,
                    current,
                    &k,
                    calib3d::RANSAC,
                    RANSAC_CONFIDENCE,
                    RANSAC_THRESHOLD,
                    RANSAC_MAX_ITERS,
                    mask,
                )?;
                Ok((!essential.empty()).then_some(essential))
            }
            GeometryCapability::Fundamental => {
                let fundamental = calib3d::find_fundamental_mat(
                    previous,
                    current,
                    calib3d::FM_RANSAC,
                    RANSAC_THRESHOLD,
                    RANSAC_CONFIDENCE,
                    RANSAC_MAX_ITERS,
                    mask,
                )?;
                if fundamental.empty() {
                    return Ok(None);
                }
                let f = mat_to_matrix3(&fundamental)?;
                let e = essential_from_fundamental(calibration, &f);
                Ok(Some(matrix3_to_mat(&e)?))
            }
            GeometryCapability::Unavailable => Ok(None),
        }
    }

    /// Decompose an essential matrix into rotation, translation direction,
    /// and inlier count. The mask is refined in place by the cheirality
    /// check.
    pub fn recover(
        &self,
        essential: &Mat,
        previous: &Vector<Point2f>,
        current: &Vector<Point2f>,
        calibration: &Matrix3<f64>,
        mask: &mut Mat,
    ) -> Result<PoseRecovery> {
        let k = matrix3_to_mat(calibration)?;
        let mut rotation = Mat::default();
        let mut translation = Mat::default();
        let inlier_count =
            calib3d::recover_pose(essential, previous, current, &k, &mut rotation, &mut translation, mask)?;
        Ok(PoseRecovery {
            rotation: mat_to_matrix3(&rotation)?,
            translation: read_vec3(&translation),
            inlier_count: inlier_count.max(0) as usize,
        })
    }
}

/// Read the first `len` inlier flags out of a mask Mat. Missing entries
/// count as outliers.
pub fn mask_flags(mask: &Mat, len: usize) -> Vec<bool> {
    (0..len)
        .map(|i| mask.at::<u8>(i as i32).map(|v| *v != 0).unwrap_or(false))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn derived_essential_matches_ktfk() {
        let k = Matrix3::new(500.0, 0.0, 320.0, 0.0, 450.0, 240.0, 0.0, 0.0, 1.0);
        let f = Matrix3::new(
            0.0, -1e-6, 1e-3,
            1e-6, 0.0, -2e-3,
            -1e-3, 2e-3, 0.1,
        );
        let e = essential_from_fundamental(&k, &f);
        let expected = k.transpose() * f * k;
        assert_relative_eq!(e, expected, epsilon = 1e-12);
    }

    #[test]
    fn unavailable_capability_yields_no_model() {
        let estimator = EpipolarEstimator::new(GeometryCapability::Unavailable);
        let pts = Vector::<Point2f>::new();
        let mut mask = Mat::default();
        let result = estimator
            .estimate(&pts, &pts, &Matrix3::identity(), &mut mask)
            .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn capability_labels() {
        assert_eq!(GeometryCapability::Essential.label(), "essential");
        assert_eq!(GeometryCapability::Fundamental.label(), "fundamental");
        assert_eq!(GeometryCapability::Unavailable.label(), "missing");
    }
}
