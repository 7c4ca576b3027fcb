//! Session object owning the odometry engine, world state, and projector.
//!
//! Single-threaded and cooperative: the host drives one odometry+render
//! cycle per tick and observes the running flag at loop head only. An error
//! escaping a cycle is fail-stop — the session stops itself and the
//! diagnostic surfaces to the host. Recovery is always user-initiated.

use anyhow::Result;
use opencv::core::{KeyPoint, Vector};
use tracing::{error, info};

use crate::capture::CaptureSource;
use crate::odometry::{CycleReport, GeometryCapability, OdometryEngine};
use crate::session::SessionError;
use crate::viz::{DrawSurface, MapMode, MapProjector, ViewEvent};
use crate::world::WorldState;

/// Engine construction parameters.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub frame_width: i32,
    pub frame_height: i32,
    pub n_features: i32,
    pub capability: GeometryCapability,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            frame_width: 640,
            frame_height: 480,
            n_features: 1200,
            capability: GeometryCapability::Essential,
        }
    }
}

pub struct VoSession {
    engine: OdometryEngine,
    world: WorldState,
    projector: MapProjector,
    running: bool,
    cycles: u64,
}

impl VoSession {
    /// Build the full pipeline. The world starts reset: identity pose and a
    /// single origin trajectory sample.
    pub fn new(config: &SessionConfig) -> Result<Self> {
        let engine = OdometryEngine::new(
            config.frame_width,
            config.frame_height,
            config.n_features,
            config.capability,
        )?;
        let mut world = WorldState::new();
        world.reset();
        Ok(Self {
            engine,
            world,
            projector: MapProjector::new(),
            running: false,
            cycles: 0,
        })
    }

    /// Mark the session running. The capture source must already deliver a
    /// frame; a dead source errors and leaves the session not-running.
    pub fn start(&mut self, capture: &mut dyn CaptureSource) -> Result<()> {
        match capture.grab()? {
            Some(_) => {
                self.running = true;
                info!("session started");
                Ok(())
            }
            None => {
                Err(SessionError::CaptureUnavailable("source produced no frame".into()).into())
            }
        }
    }

    /// Cooperative stop; an in-flight cycle always completes first because
    /// the flag is only read between cycles.
    pub fn stop(&mut self) {
        if self.running {
            info!(cycles = self.cycles, "session stopped");
        }
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Run one odometry cycle on the latest available frame. Returns None
    /// when the source had no frame this tick (the frame is dropped, never
    /// queued). A cycle error stops the session before propagating.
    pub fn cycle(&mut self, capture: &mut dyn CaptureSource) -> Result<Option<CycleReport>> {
        if !self.running {
            return Err(SessionError::UninitializedPipeline.into());
        }
        match self.run_cycle(capture) {
            Ok(report) => Ok(report),
            Err(e) => {
                self.running = false;
                error!(error = %e, "odometry cycle failed; session stopped");
                Err(e)
            }
        }
    }

    fn run_cycle(&mut self, capture: &mut dyn CaptureSource) -> Result<Option<CycleReport>> {
        let Some(frame) = capture.grab()? else {
            return Ok(None);
        };
        let report = self.engine.process_frame(frame.gray, &mut self.world)?;
        self.cycles += 1;
        Ok(Some(report))
    }

    /// Render the current world snapshot under the active map mode.
    pub fn render(&self, surface: &mut dyn DrawSurface) -> Result<()> {
        self.projector
            .render(surface, self.world.trajectory(), self.world.landmarks())
    }

    /// Full reset: trajectory back to the origin sample, landmarks cleared,
    /// rotation to identity. The previous-frame slot is left alone, matching
    /// the capture lifecycle rather than the world lifecycle.
    pub fn reset_world(&mut self) {
        self.world.reset();
        info!("world state reset");
    }

    pub fn reset_view(&mut self) {
        self.projector.reset_view();
    }

    /// Switch projection modes. World buffers are untouched; only rendering
    /// changes.
    pub fn toggle_map_mode(&mut self) -> MapMode {
        let mode = self.projector.toggle_mode();
        info!(mode = mode.label(), "map mode switched");
        mode
    }

    pub fn handle_view_event(&mut self, event: ViewEvent) {
        self.projector.handle_event(event);
    }

    pub fn world(&self) -> &WorldState {
        &self.world
    }

    pub fn map_mode(&self) -> MapMode {
        self.projector.mode()
    }

    /// Keypoints of the most recent frame, for the host's feature overlay.
    pub fn last_keypoints(&self) -> Option<&Vector<KeyPoint>> {
        self.engine.last_keypoints()
    }

    /// One-line cycle summary for the status overlay.
    pub fn summary(&self, report: &CycleReport) -> String {
        format!(
            "features {} | matches {} (keep {}) | pose: {} | traj {} | map {}",
            report.n_features,
            report.n_matches,
            report.n_kept,
            report.outcome.describe(),
            self.world.trajectory().len(),
            self.world.landmarks().len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::FramePair;
    use opencv::core::Mat;
    use opencv::prelude::*;

    /// Capture stub that never has a frame.
    struct EmptySource;

    impl CaptureSource for EmptySource {
        fn grab(&mut self) -> Result<Option<FramePair<'_>>> {
            Ok(None)
        }
        fn frame_size(&self) -> (i32, i32) {
            (640, 480)
        }
    }

    /// Capture stub delivering the same blank frame forever.
    struct BlankSource {
        color: Mat,
        gray: Mat,
    }

    impl BlankSource {
        fn new() -> Self {
            let color = Mat::zeros(480, 640, opencv::core::CV_8UC3)
                .unwrap()
                .to_mat()
                .unwrap();
            let gray = Mat::zeros(480, 640, opencv::core::CV_8UC1)
                .unwrap()
                .to_mat()
                .unwrap();
            Self { color, gray }
        }
    }

    impl CaptureSource for BlankSource {
        fn grab(&mut self) -> Result<Option<FramePair<'_>>> {
            Ok(Some(FramePair {
                color: &self.color,
                gray: &self.gray,
            }))
        }
        fn frame_size(&self) -> (i32, i32) {
            (640, 480)
        }
    }

    #[test]
    fn cycle_before_start_is_uninitialized_pipeline() {
        let mut session = VoSession::new(&SessionConfig::default()).unwrap();
        let err = session.cycle(&mut EmptySource).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SessionError>(),
            Some(SessionError::UninitializedPipeline)
        ));
        assert!(!session.is_running());
    }

    #[test]
    fn start_fails_on_dead_source_and_stays_not_running() {
        let mut session = VoSession::new(&SessionConfig::default()).unwrap();
        let err = session.start(&mut EmptySource).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SessionError>(),
            Some(SessionError::CaptureUnavailable(_))
        ));
        assert!(!session.is_running());
    }

    #[test]
    fn missing_frames_are_skipped_not_errors() {
        let mut session = VoSession::new(&SessionConfig::default()).unwrap();
        session.start(&mut BlankSource::new()).unwrap();
        let report = session.cycle(&mut EmptySource).unwrap();
        assert!(report.is_none());
        assert!(session.is_running());
    }

    #[test]
    fn mode_switch_leaves_world_contents_identical() {
        let mut session = VoSession::new(&SessionConfig::default()).unwrap();
        let mut source = BlankSource::new();
        session.start(&mut source).unwrap();
        session.cycle(&mut source).unwrap();

        let trajectory_before: Vec<_> = session.world().trajectory().to_vec();
        let landmarks_before = session.world().landmarks().len();

        assert_eq!(session.toggle_map_mode(), MapMode::Isometric);
        assert_eq!(session.world().trajectory(), trajectory_before.as_slice());
        assert_eq!(session.world().landmarks().len(), landmarks_before);

        assert_eq!(session.toggle_map_mode(), MapMode::Perspective);
        assert_eq!(session.world().trajectory(), trajectory_before.as_slice());
    }

    #[test]
    fn reset_world_restores_origin_state() {
        let mut session = VoSession::new(&SessionConfig::default()).unwrap();
        session.reset_world();
        assert_eq!(session.world().trajectory().len(), 1);
        assert!(session.world().landmarks().is_empty());
        let pose = session.world().pose().unwrap();
        assert_eq!(pose.rotation, nalgebra::Matrix3::identity());
    }
}
