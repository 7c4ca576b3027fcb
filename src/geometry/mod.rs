//! Geometry utilities: calibration synthesis, Mat/nalgebra interop.

pub mod linear;

pub use linear::{
    calibration_matrix, mat_to_matrix3, matrix3_is_finite, matrix3_to_mat, read_vec3,
    vec3_is_finite,
};
