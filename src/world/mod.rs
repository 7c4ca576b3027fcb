//! World-frame state: accumulated pose, trajectory, and landmark cloud.

pub mod pose;
pub mod store;

pub use pose::Pose;
pub use store::{LandmarkBuffer, LandmarkPoint, TrajectorySample, WorldState, LANDMARK_CAPACITY};
