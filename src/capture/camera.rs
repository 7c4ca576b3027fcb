//! VideoCapture-backed source for live cameras and video files.

use anyhow::Result;
use opencv::core::{AlgorithmHint, Mat};
use opencv::imgproc;
use opencv::prelude::*;
use opencv::videoio::{self, VideoCapture};
use tracing::info;

use crate::capture::{CaptureSource, FramePair};
use crate::session::SessionError;

pub struct CameraCapture {
    cap: VideoCapture,
    color: Mat,
    gray: Mat,
    width: i32,
    height: i32,
}

impl CameraCapture {
    /// Open a live camera by index, requesting the given frame size. The
    /// driver may pick a different size; `probe` pins the real one.
    pub fn open_camera(index: i32, width: i32, height: i32) -> Result<Self> {
        let mut cap = VideoCapture::new(index, videoio::CAP_ANY)?;
        if !cap.is_opened()? {
            return Err(
                SessionError::CaptureUnavailable(format!("camera {index} did not open")).into(),
            );
        }
        cap.set(videoio::CAP_PROP_FRAME_WIDTH, f64::from(width))?;
        cap.set(videoio::CAP_PROP_FRAME_HEIGHT, f64::from(height))?;
        Self::from_open(cap)
    }

    /// Open a video file for offline playback.
    pub fn open_file(path: &str) -> Result<Self> {
        let cap = VideoCapture::from_file(path, videoio::CAP_ANY)?;
        if !cap.is_opened()? {
            return Err(
                SessionError::CaptureUnavailable(format!("cannot open video {path}")).into(),
            );
        }
        Self::from_open(cap)
    }

    fn from_open(cap: VideoCapture) -> Result<Self> {
        let width = cap.get(videoio::CAP_PROP_FRAME_WIDTH)? as i32;
        let height = cap.get(videoio::CAP_PROP_FRAME_HEIGHT)? as i32;
        info!(width, height, "capture source open");
        Ok(Self {
            cap,
            color: Mat::default(),
            gray: Mat::default(),
            width,
            height,
        })
    }

    /// Read one frame to confirm the source delivers and to pin the real
    /// frame size (some backends only report it after the first read).
    pub fn probe(&mut self) -> Result<(i32, i32)> {
        let dims = self.grab()?.map(|pair| (pair.color.cols(), pair.color.rows()));
        match dims {
            Some((w, h)) => {
                self.width = w;
                self.height = h;
                Ok((w, h))
            }
            None => {
                Err(SessionError::CaptureUnavailable("source produced no frame".into()).into())
            }
        }
    }

    /// The color frame of the most recent successful grab.
    pub fn color(&self) -> &Mat {
        &self.color
    }
}

impl CaptureSource for CameraCapture {
    fn grab(&mut self) -> Result<Option<FramePair<'_>>> {
        if !self.cap.read(&mut self.color)? || self.color.empty() {
            return Ok(None);
        }
        imgproc::cvt_color(
            &self.color,
            &mut self.gray,
            imgproc::COLOR_BGR2GRAY,
            0,
            AlgorithmHint::ALGO_HINT_DEFAULT,
        )?;
        Ok(Some(FramePair {
            color: &self.color,
            gray: &self.gray,
        }))
    }

    fn frame_size(&self) -> (i32, i32) {
        (self.width, self.height)
    }
}
