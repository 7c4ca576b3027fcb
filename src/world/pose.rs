//! Accumulated camera-to-world pose.

use nalgebra::{Matrix3, Vector3};

use crate::geometry::{matrix3_is_finite, vec3_is_finite};

/// Accumulated camera-to-world transform.
///
/// The rotation is a raw 3x3 matrix. It is nominally orthonormal, but repeated
/// composition without re-orthonormalization may drift; that drift is accepted
/// behavior and is not corrected here.
#[derive(Debug, Clone, PartialEq)]
pub struct Pose {
    pub rotation: Matrix3<f64>,
    pub position: Vector3<f64>,
}

impl Pose {
    /// Identity rotation at the origin.
    pub fn identity() -> Self {
        Self {
            rotation: Matrix3::identity(),
            position: Vector3::zeros(),
        }
    }

    /// Compose a relative rotation and a unit-scale translation direction
    /// into this pose: `R' = R·R_rel`, `p' = p + R·(step·t)`.
    ///
    /// The candidate is returned unvalidated; callers check `is_finite`
    /// before committing.
    pub fn compose_step(
        &self,
        rotation: &Matrix3<f64>,
        translation: &Vector3<f64>,
        step: f64,
    ) -> Pose {
        Pose {
            rotation: self.rotation * rotation,
            position: self.position + self.rotation * (translation * step),
        }
    }

    /// Every rotation entry and position component is finite.
    pub fn is_finite(&self) -> bool {
        matrix3_is_finite(&self.rotation) && vec3_is_finite(&self.position)
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::identity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn compose_step_matches_formula_exactly() {
        let pose = Pose {
            rotation: Matrix3::new(0.0, -1.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0),
            position: Vector3::new(1.0, 2.0, 3.0),
        };
        let r = Matrix3::identity();
        let t = Vector3::new(0.5, -1.0, 2.0);

        let next = pose.compose_step(&r, &t, 0.12);

        let expected = pose.position + pose.rotation * (t * 0.12);
        assert_eq!(next.position, expected);
        assert_eq!(next.rotation, pose.rotation * r);
    }

    #[test]
    fn compose_step_from_identity() {
        let next = Pose::identity().compose_step(
            &Matrix3::identity(),
            &Vector3::new(0.0, 0.0, 1.0),
            0.12,
        );
        assert_relative_eq!(next.position.z, 0.12);
        assert_relative_eq!(next.position.x, 0.0);
    }

    #[test]
    fn is_finite_rejects_nan_anywhere() {
        let mut pose = Pose::identity();
        assert!(pose.is_finite());

        pose.position.y = f64::NAN;
        assert!(!pose.is_finite());

        let mut pose = Pose::identity();
        pose.rotation[(0, 2)] = f64::INFINITY;
        assert!(!pose.is_finite());
    }
}
