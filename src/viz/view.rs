//! Interactive view parameters for the map projector.
//!
//! `ViewState` is rendering-only state, fully independent of the odometry
//! pose. Events arrive already translated from the host window.

/// Pitch is clamped to this many radians either side of level.
pub const PITCH_LIMIT: f64 = 1.2;
pub const ZOOM_MIN: f64 = 0.2;
pub const ZOOM_MAX: f64 = 6.0;
/// Radians of orbit per pixel of pointer drag.
const ROTATE_SENSITIVITY: f64 = 0.008;

/// Interactive camera parameters for the perspective-orbit mode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewState {
    pub yaw: f64,
    pub pitch: f64,
    pub zoom: f64,
    pub pan_x: f64,
    pub pan_y: f64,
    pub perspective_strength: f64,
    pub height_scale: f64,
}

impl Default for ViewState {
    /// Three-quarter orbit that shows the ground plane immediately.
    fn default() -> Self {
        Self {
            yaw: 0.6,
            pitch: 0.9,
            zoom: 1.0,
            pan_x: 0.0,
            pan_y: 0.0,
            perspective_strength: 0.35,
            height_scale: 1.0,
        }
    }
}

/// Pointer and wheel input translated by the host.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ViewEvent {
    /// Pointer drag in pixels; `pan` is true while the modifier is held.
    Drag { dx: f64, dy: f64, pan: bool },
    /// Wheel notches; positive zooms in, ±10% per notch.
    Wheel { notches: i32 },
    /// Restore the default view.
    Reset,
}

impl ViewState {
    pub fn apply(&mut self, event: ViewEvent) {
        match event {
            ViewEvent::Drag { dx, dy, pan: true } => {
                self.pan_x += dx;
                self.pan_y += dy;
            }
            ViewEvent::Drag { dx, dy, pan: false } => {
                self.yaw += dx * ROTATE_SENSITIVITY;
                self.pitch =
                    (self.pitch + dy * ROTATE_SENSITIVITY).clamp(-PITCH_LIMIT, PITCH_LIMIT);
            }
            ViewEvent::Wheel { notches } => {
                let factor = if notches >= 0 { 1.1 } else { 0.9 };
                for _ in 0..notches.unsigned_abs() {
                    self.zoom = (self.zoom * factor).clamp(ZOOM_MIN, ZOOM_MAX);
                }
            }
            ViewEvent::Reset => *self = Self::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn pitch_clamps_at_limit() {
        let mut view = ViewState::default();
        view.apply(ViewEvent::Drag {
            dx: 0.0,
            dy: 10_000.0,
            pan: false,
        });
        assert_relative_eq!(view.pitch, PITCH_LIMIT);

        view.apply(ViewEvent::Drag {
            dx: 0.0,
            dy: -100_000.0,
            pan: false,
        });
        assert_relative_eq!(view.pitch, -PITCH_LIMIT);
    }

    #[test]
    fn wheel_zoom_is_ten_percent_per_notch_and_clamped() {
        let mut view = ViewState::default();
        view.apply(ViewEvent::Wheel { notches: 1 });
        assert_relative_eq!(view.zoom, 1.1);

        view.apply(ViewEvent::Wheel { notches: -1 });
        assert_relative_eq!(view.zoom, 1.1 * 0.9);

        view.apply(ViewEvent::Wheel { notches: 100 });
        assert_relative_eq!(view.zoom, ZOOM_MAX);
        view.apply(ViewEvent::Wheel { notches: -100 });
        assert_relative_eq!(view.zoom, ZOOM_MIN);
    }

    #[test]
    fn modifier_drag_pans_instead_of_rotating() {
        let mut view = ViewState::default();
        let yaw_before = view.yaw;
        view.apply(ViewEvent::Drag {
            dx: 12.0,
            dy: -8.0,
            pan: true,
        });
        assert_relative_eq!(view.pan_x, 12.0);
        assert_relative_eq!(view.pan_y, -8.0);
        assert_relative_eq!(view.yaw, yaw_before);
    }

    #[test]
    fn reset_restores_defaults() {
        let mut view = ViewState::default();
        view.apply(ViewEvent::Drag {
            dx: 50.0,
            dy: 20.0,
            pan: false,
        });
        view.apply(ViewEvent::Wheel { notches: 3 });
        view.apply(ViewEvent::Reset);
        assert_eq!(view, ViewState::default());
    }
}
