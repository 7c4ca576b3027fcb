//! Structural session errors.
//!
//! Per-cycle recoverable conditions (insufficient matches, too-few inliers,
//! invalid numerics, motion-too-small) are reported through `CycleReport`
//! and never raised as errors; the kinds here end or prevent a session.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    /// A cycle was requested before the session was started.
    #[error("odometry pipeline is not initialized; call start() first")]
    UninitializedPipeline,
    /// The capture source failed to open or to deliver a first frame.
    #[error("capture source unavailable: {0}")]
    CaptureUnavailable(String),
}
