//! Dual-mode map projector.
//!
//! One projector serves both rendering modes:
//! - perspective-orbit: yaw/pitch rotation, perspective divide with a clamped
//!   denominator, zoom and pan from the interactive view state
//! - isometric: a fixed transform that ignores the view state entirely
//!
//! Render pass order: background, reference grid, landmark cloud, trajectory
//! polyline with an opacity ramp favoring recent segments, start/current
//! markers, status text.

use anyhow::Result;

use crate::viz::surface::{Color, DrawSurface};
use crate::viz::view::{ViewEvent, ViewState};
use crate::world::{LandmarkBuffer, TrajectorySample};

/// Trajectory spans below this clamp to avoid divide-by-zero in autoscale.
const SPAN_FLOOR: f64 = 1e-6;
/// Fraction of the surface width the trajectory extent should occupy.
const BASE_SCALE_FACTOR: f64 = 0.7;
/// Pixels-per-unit bounds keeping degenerate spans drawable.
const SCALE_MIN: f64 = 0.05;
const SCALE_MAX: f64 = 5000.0;
/// Perspective divide floor; stops blow-up/flip behind the viewpoint.
const MIN_DENOMINATOR: f64 = 0.2;
/// Caps on drawn geometry so the pass stays cheap as buffers grow.
const MAX_DRAWN_LANDMARKS: usize = 1200;
const MAX_TRAJECTORY_SEGMENTS: usize = 300;
/// Reference grid lines per axis, spaced span/8 apart.
const GRID_LINES: usize = 8;

const BACKGROUND: Color = Color::rgba(11, 11, 11, 1.0);
const GRID: Color = Color::rgba(255, 255, 255, 0.08);
const LANDMARK: Color = Color::rgba(200, 200, 200, 0.45);
const TRAJECTORY: Color = Color::rgba(120, 170, 255, 0.95);
const START_MARKER: Color = Color::rgba(255, 210, 120, 0.95);
const CURRENT_MARKER: Color = Color::rgba(255, 120, 120, 0.95);
const TEXT: Color = Color::rgba(255, 255, 255, 0.92);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MapMode {
    #[default]
    Perspective,
    Isometric,
}

impl MapMode {
    pub fn label(self) -> &'static str {
        match self {
            Self::Perspective => "perspective",
            Self::Isometric => "isometric",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Self::Perspective => Self::Isometric,
            Self::Isometric => Self::Perspective,
        }
    }
}

/// View-state management plus the two projection models.
#[derive(Debug, Default)]
pub struct MapProjector {
    mode: MapMode,
    view: ViewState,
}

impl MapProjector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> MapMode {
        self.mode
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    /// Switch modes; buffers are untouched, only rendering changes.
    pub fn toggle_mode(&mut self) -> MapMode {
        self.mode = self.mode.toggled();
        self.mode
    }

    pub fn reset_view(&mut self) {
        self.view = ViewState::default();
    }

    /// Interaction only applies in perspective mode; isometric ignores it.
    /// A view reset is honored in either mode.
    pub fn handle_event(&mut self, event: ViewEvent) {
        if self.mode == MapMode::Perspective || event == ViewEvent::Reset {
            self.view.apply(event);
        }
    }

    /// Pixels per world unit derived from the trajectory's x/z extent. The
    /// extent always includes the origin, so a single-sample trajectory is
    /// well defined (span clamps to the floor).
    pub fn autoscale(trajectory: &[TrajectorySample], surface_width: f64) -> f64 {
        let span = trajectory_span(trajectory);
        (surface_width * BASE_SCALE_FACTOR / span).clamp(SCALE_MIN, SCALE_MAX)
    }

    /// Project a world point to surface coordinates under the active mode.
    pub fn project(&self, point: [f64; 3], scale: f64, center: (f64, f64)) -> (f64, f64) {
        match self.mode {
            MapMode::Perspective => self.project_perspective(point, scale, center),
            MapMode::Isometric => project_isometric(point, scale, center),
        }
    }

    /// Rotate by yaw about the vertical axis, then pitch about the resulting
    /// horizontal axis (right-handed), perspective-divide with a clamped
    /// denominator, then zoom and pan.
    fn project_perspective(
        &self,
        [x, y, z]: [f64; 3],
        scale: f64,
        (cx, cy): (f64, f64),
    ) -> (f64, f64) {
        let v = &self.view;
        let (sin_yaw, cos_yaw) = v.yaw.sin_cos();
        let x1 = x * cos_yaw + z * sin_yaw;
        let z1 = -x * sin_yaw + z * cos_yaw;
        let y1 = y * v.height_scale;

        let (sin_pitch, cos_pitch) = v.pitch.sin_cos();
        let y2 = y1 * cos_pitch - z1 * sin_pitch;
        let z2 = y1 * sin_pitch + z1 * cos_pitch;

        let denominator = (1.0 + z2 * v.perspective_strength).max(MIN_DENOMINATOR);
        let s = scale * v.zoom / denominator;
        (cx + v.pan_x + x1 * s, cy + v.pan_y - y2 * s)
    }

    /// Render one frame of the map from the given world snapshot.
    pub fn render(
        &self,
        surface: &mut dyn DrawSurface,
        trajectory: &[TrajectorySample],
        landmarks: &LandmarkBuffer,
    ) -> Result<()> {
        let center = (surface.width() / 2.0, surface.height() / 2.0);
        let span = trajectory_span(trajectory);
        let scale = Self::autoscale(trajectory, surface.width());

        surface.fill(BACKGROUND)?;
        self.draw_grid(surface, span, scale, center)?;
        self.draw_landmarks(surface, landmarks, scale, center)?;
        self.draw_trajectory(surface, trajectory, scale, center)?;
        self.draw_markers(surface, trajectory, scale, center)?;
        self.draw_status(surface, scale)?;
        Ok(())
    }

    fn draw_grid(
        &self,
        surface: &mut dyn DrawSurface,
        span: f64,
        scale: f64,
        center: (f64, f64),
    ) -> Result<()> {
        let spacing = span / GRID_LINES as f64;
        let half = span / 2.0;
        for i in 0..GRID_LINES {
            let offset = (i as f64 - (GRID_LINES - 1) as f64 / 2.0) * spacing;

            let (x1, y1) = self.project([offset, 0.0, -half], scale, center);
            let (x2, y2) = self.project([offset, 0.0, half], scale, center);
            surface.stroke_line(x1, y1, x2, y2, 1.0, GRID)?;

            let (x1, y1) = self.project([-half, 0.0, offset], scale, center);
            let (x2, y2) = self.project([half, 0.0, offset], scale, center);
            surface.stroke_line(x1, y1, x2, y2, 1.0, GRID)?;
        }
        Ok(())
    }

    fn draw_landmarks(
        &self,
        surface: &mut dyn DrawSurface,
        landmarks: &LandmarkBuffer,
        scale: f64,
        center: (f64, f64),
    ) -> Result<()> {
        let stride = (landmarks.len() / MAX_DRAWN_LANDMARKS).max(1);
        for point in landmarks.iter().step_by(stride) {
            let (x, y) = self.project([point.x, point.y, point.z], scale, center);
            surface.fill_rect(x, y, 1.0, 1.0, LANDMARK)?;
        }
        Ok(())
    }

    fn draw_trajectory(
        &self,
        surface: &mut dyn DrawSurface,
        trajectory: &[TrajectorySample],
        scale: f64,
        center: (f64, f64),
    ) -> Result<()> {
        if trajectory.len() < 2 {
            return Ok(());
        }
        let stride = (trajectory.len() / MAX_TRAJECTORY_SEGMENTS).max(1);
        let mut sampled: Vec<&TrajectorySample> = trajectory.iter().step_by(stride).collect();
        if !std::ptr::eq(*sampled.last().unwrap(), trajectory.last().unwrap()) {
            sampled.push(trajectory.last().unwrap());
        }

        let segments = sampled.len() - 1;
        for (i, pair) in sampled.windows(2).enumerate() {
            let (x1, y1) = self.project([pair[0].x, pair[0].y, pair[0].z], scale, center);
            let (x2, y2) = self.project([pair[1].x, pair[1].y, pair[1].z], scale, center);
            // Opacity ramps toward the most recent segment.
            let ramp = 0.25 + 0.75 * (i + 1) as f64 / segments as f64;
            surface.stroke_line(x1, y1, x2, y2, 2.0, TRAJECTORY.with_alpha(TRAJECTORY.a * ramp))?;
        }
        Ok(())
    }

    fn draw_markers(
        &self,
        surface: &mut dyn DrawSurface,
        trajectory: &[TrajectorySample],
        scale: f64,
        center: (f64, f64),
    ) -> Result<()> {
        let Some(start) = trajectory.first() else {
            return Ok(());
        };
        let (x, y) = self.project([start.x, start.y, start.z], scale, center);
        surface.fill_circle(x, y, 4.0, START_MARKER)?;

        let current = trajectory.last().unwrap();
        let (x, y) = self.project([current.x, current.y, current.z], scale, center);
        surface.fill_circle(x, y, 4.0, CURRENT_MARKER)?;
        Ok(())
    }

    fn draw_status(&self, surface: &mut dyn DrawSurface, scale: f64) -> Result<()> {
        let status = match self.mode {
            MapMode::Perspective => format!(
                "{} | scale {:.1} px/u | yaw {:.2} pitch {:.2} zoom {:.2}",
                self.mode.label(),
                scale,
                self.view.yaw,
                self.view.pitch,
                self.view.zoom
            ),
            MapMode::Isometric => {
                format!("{} | scale {:.1} px/u", self.mode.label(), scale)
            }
        };
        surface.text(&status, 12.0, 22.0, TEXT)
    }
}

/// Largest x or z extent of the trajectory, origin included, clamped to the
/// span floor.
fn trajectory_span(trajectory: &[TrajectorySample]) -> f64 {
    let (mut min_x, mut max_x, mut min_z, mut max_z) = (0.0f64, 0.0f64, 0.0f64, 0.0f64);
    for p in trajectory {
        min_x = min_x.min(p.x);
        max_x = max_x.max(p.x);
        min_z = min_z.min(p.z);
        max_z = max_z.max(p.z);
    }
    (max_x - min_x).max(max_z - min_z).max(SPAN_FLOOR)
}

/// Fixed isometric transform; ignores the interactive view state.
fn project_isometric([x, y, z]: [f64; 3], scale: f64, (cx, cy): (f64, f64)) -> (f64, f64) {
    (
        cx + (x - z) * scale,
        cy + (x + z) * scale / 2.0 - y * scale,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[derive(Debug, PartialEq, Eq, Clone, Copy)]
    enum Op {
        Fill,
        Rect,
        Line,
        Circle,
        Text,
    }

    #[derive(Default)]
    struct RecordingSurface {
        ops: Vec<Op>,
    }

    impl DrawSurface for RecordingSurface {
        fn width(&self) -> f64 {
            400.0
        }
        fn height(&self) -> f64 {
            300.0
        }
        fn fill(&mut self, _color: Color) -> Result<()> {
            self.ops.push(Op::Fill);
            Ok(())
        }
        fn fill_rect(&mut self, _x: f64, _y: f64, _w: f64, _h: f64, _color: Color) -> Result<()> {
            self.ops.push(Op::Rect);
            Ok(())
        }
        fn stroke_line(
            &mut self,
            _x1: f64,
            _y1: f64,
            _x2: f64,
            _y2: f64,
            _line_width: f64,
            _color: Color,
        ) -> Result<()> {
            self.ops.push(Op::Line);
            Ok(())
        }
        fn fill_circle(&mut self, _x: f64, _y: f64, _radius: f64, _color: Color) -> Result<()> {
            self.ops.push(Op::Circle);
            Ok(())
        }
        fn text(&mut self, _text: &str, _x: f64, _y: f64, _color: Color) -> Result<()> {
            self.ops.push(Op::Text);
            Ok(())
        }
    }

    fn sample(x: f64, z: f64) -> TrajectorySample {
        TrajectorySample { x, y: 0.0, z }
    }

    #[test]
    fn autoscale_survives_single_sample() {
        let scale = MapProjector::autoscale(&[sample(0.0, 0.0)], 400.0);
        assert!(scale.is_finite());
        assert_relative_eq!(scale, SCALE_MAX);
    }

    #[test]
    fn autoscale_tracks_extent() {
        let traj = vec![sample(0.0, 0.0), sample(10.0, 0.0)];
        let scale = MapProjector::autoscale(&traj, 400.0);
        assert_relative_eq!(scale, 400.0 * 0.7 / 10.0);
    }

    #[test]
    fn isometric_projection_matches_formula() {
        let mut projector = MapProjector::new();
        projector.toggle_mode();
        assert_eq!(projector.mode(), MapMode::Isometric);

        let (sx, sy) = projector.project([2.0, 1.0, 3.0], 10.0, (200.0, 150.0));
        assert_relative_eq!(sx, 200.0 + (2.0 - 3.0) * 10.0);
        assert_relative_eq!(sy, 150.0 + (2.0 + 3.0) * 10.0 / 2.0 - 1.0 * 10.0);
    }

    #[test]
    fn perspective_denominator_never_drops_below_floor() {
        let projector = MapProjector::new();
        // Pull the point far behind the virtual viewpoint: without the clamp
        // the denominator would be hugely negative and the point would flip.
        let (sx, sy) = projector.project([1.0, 0.0, -1e9], 10.0, (200.0, 150.0));
        assert!(sx.is_finite());
        assert!(sy.is_finite());

        // Both of these sit past the clamp, so they must project identically
        // up to the linear x/y part, which is dominated by the z coordinate.
        let v = ViewState::default();
        let denom_raw = |z: f64| {
            let (sin_yaw, cos_yaw) = v.yaw.sin_cos();
            let z1 = -1.0 * sin_yaw + z * cos_yaw;
            let (sin_pitch, cos_pitch) = v.pitch.sin_cos();
            1.0 + (z1 * cos_pitch) * v.perspective_strength
        };
        assert!(denom_raw(-1e9) < MIN_DENOMINATOR);
    }

    #[test]
    fn perspective_zoom_scales_offsets_linearly() {
        let mut projector = MapProjector::new();
        let center = (200.0, 150.0);
        let (x1, _) = projector.project([1.0, 0.0, 0.0], 10.0, center);

        projector.handle_event(ViewEvent::Wheel { notches: 1 });
        let (x2, _) = projector.project([1.0, 0.0, 0.0], 10.0, center);
        assert_relative_eq!((x2 - center.0) / (x1 - center.0), 1.1, epsilon = 1e-9);
    }

    #[test]
    fn isometric_mode_ignores_interaction() {
        let mut projector = MapProjector::new();
        projector.toggle_mode();
        let before = *projector.view();
        projector.handle_event(ViewEvent::Drag {
            dx: 100.0,
            dy: 50.0,
            pan: false,
        });
        projector.handle_event(ViewEvent::Wheel { notches: 3 });
        assert_eq!(projector.view(), &before);

        // A reset is still honored.
        projector.handle_event(ViewEvent::Reset);
        assert_eq!(projector.view(), &ViewState::default());
    }

    #[test]
    fn render_pass_order_is_stable() {
        let mut surface = RecordingSurface::default();
        let projector = MapProjector::new();
        let traj = vec![sample(0.0, 0.0), sample(1.0, 1.0), sample(2.0, 0.5)];
        let mut landmarks = LandmarkBuffer::new();
        landmarks.push(crate::world::LandmarkPoint {
            x: 0.5,
            y: 0.0,
            z: 0.5,
        });

        projector.render(&mut surface, &traj, &landmarks).unwrap();

        assert_eq!(surface.ops.first(), Some(&Op::Fill));
        assert_eq!(surface.ops.last(), Some(&Op::Text));
        // grid: 8 lines per axis
        assert_eq!(
            surface.ops.iter().filter(|&&op| op == Op::Line).count(),
            16 + 2 // grid + two trajectory segments
        );
        assert_eq!(surface.ops.iter().filter(|&&op| op == Op::Rect).count(), 1);
        assert_eq!(
            surface.ops.iter().filter(|&&op| op == Op::Circle).count(),
            2
        );
        // Landmark rects come after the grid lines, before the markers.
        let first_rect = surface.ops.iter().position(|&op| op == Op::Rect).unwrap();
        let first_circle = surface.ops.iter().position(|&op| op == Op::Circle).unwrap();
        assert!(first_rect > 16);
        assert!(first_circle > first_rect);
    }

    #[test]
    fn render_handles_empty_world() {
        let mut surface = RecordingSurface::default();
        let projector = MapProjector::new();
        let landmarks = LandmarkBuffer::new();
        projector.render(&mut surface, &[], &landmarks).unwrap();
        assert_eq!(surface.ops.first(), Some(&Op::Fill));
        assert_eq!(surface.ops.last(), Some(&Op::Text));
        assert!(!surface.ops.contains(&Op::Circle));
    }
}
