//! Capture sources: paired color/grayscale frames polled by the session.

pub mod camera;

pub use camera::CameraCapture;

use anyhow::Result;
use opencv::core::Mat;

/// One frame pair borrowed from the capture source. Dimensions are stable
/// for the lifetime of the source.
pub struct FramePair<'a> {
    pub color: &'a Mat,
    pub gray: &'a Mat,
}

/// Poll-style frame supplier. Returns nothing when no frame is ready this
/// tick; the caller simply skips the cycle (frames drop, they never queue).
pub trait CaptureSource {
    fn grab(&mut self) -> Result<Option<FramePair<'_>>>;
    fn frame_size(&self) -> (i32, i32);
}
