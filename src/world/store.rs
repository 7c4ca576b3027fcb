//! Bounded world-frame sample stores: trajectory and landmark cloud.

use std::collections::VecDeque;

use crate::world::Pose;

/// Maximum number of retained landmark points; oldest are evicted first.
pub const LANDMARK_CAPACITY: usize = 3000;

/// One accumulated camera position in world coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrajectorySample {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// A cosmetic map point derived from an inlier correspondence. Not a
/// triangulated landmark; a lateral-offset approximation at fixed depth.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LandmarkPoint {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// FIFO ring of landmark points bounded by [`LANDMARK_CAPACITY`].
#[derive(Debug, Default)]
pub struct LandmarkBuffer {
    points: VecDeque<LandmarkPoint>,
}

impl LandmarkBuffer {
    pub fn new() -> Self {
        Self {
            points: VecDeque::new(),
        }
    }

    /// Append one point, dropping the oldest when over capacity.
    pub fn push(&mut self, point: LandmarkPoint) {
        self.points.push_back(point);
        while self.points.len() > LANDMARK_CAPACITY {
            self.points.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &LandmarkPoint> {
        self.points.iter()
    }
}

/// Session-owned world state: the accumulated pose and the sample buffers.
///
/// Created empty (no pose) and populated by [`WorldState::reset`]. Pose and
/// buffers mutate at most once per committed cycle and are only torn down by
/// another reset.
#[derive(Debug, Default)]
pub struct WorldState {
    pose: Option<Pose>,
    trajectory: Vec<TrajectorySample>,
    landmarks: LandmarkBuffer,
}

impl WorldState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear both buffers, set the pose to identity at the origin, and push
    /// the origin sample that anchors index 0 of the trajectory.
    pub fn reset(&mut self) {
        self.trajectory.clear();
        self.landmarks.clear();
        self.pose = Some(Pose::identity());
        self.trajectory.push(TrajectorySample {
            x: 0.0,
            y: 0.0,
            z: 0.0,
        });
    }

    pub fn pose(&self) -> Option<&Pose> {
        self.pose.as_ref()
    }

    /// Commit a validated pose and append the matching trajectory sample.
    pub fn commit_pose(&mut self, pose: Pose) {
        self.trajectory.push(TrajectorySample {
            x: pose.position.x,
            y: pose.position.y,
            z: pose.position.z,
        });
        self.pose = Some(pose);
    }

    /// Flow-fallback update: shift the position in the ground plane without
    /// touching the rotation, then append a sample. Returns false when no
    /// pose exists yet.
    pub fn nudge_position(&mut self, dx: f64, dz: f64) -> bool {
        let Some(pose) = self.pose.as_mut() else {
            return false;
        };
        pose.position.x += dx;
        pose.position.z += dz;
        let p = pose.position;
        self.trajectory.push(TrajectorySample {
            x: p.x,
            y: p.y,
            z: p.z,
        });
        true
    }

    pub fn push_landmark(&mut self, point: LandmarkPoint) {
        self.landmarks.push(point);
    }

    pub fn trajectory(&self) -> &[TrajectorySample] {
        &self.trajectory
    }

    pub fn landmarks(&self) -> &LandmarkBuffer {
        &self.landmarks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Matrix3;

    #[test]
    fn reset_yields_origin_sample_and_identity() {
        let mut world = WorldState::new();
        world.commit_pose(Pose {
            rotation: Matrix3::from_diagonal_element(2.0),
            position: nalgebra::Vector3::new(5.0, 6.0, 7.0),
        });
        world.push_landmark(LandmarkPoint {
            x: 1.0,
            y: 0.0,
            z: 1.0,
        });

        world.reset();

        assert_eq!(
            world.trajectory(),
            &[TrajectorySample {
                x: 0.0,
                y: 0.0,
                z: 0.0
            }]
        );
        assert!(world.landmarks().is_empty());
        let pose = world.pose().unwrap();
        assert_eq!(pose.rotation, Matrix3::identity());
        assert_eq!(pose.position, nalgebra::Vector3::zeros());
    }

    #[test]
    fn landmark_buffer_keeps_exactly_last_capacity_points_in_order() {
        let mut buf = LandmarkBuffer::new();
        let total = LANDMARK_CAPACITY + 500;
        for i in 0..total {
            buf.push(LandmarkPoint {
                x: i as f64,
                y: 0.0,
                z: 0.0,
            });
        }

        assert_eq!(buf.len(), LANDMARK_CAPACITY);
        let xs: Vec<f64> = buf.iter().map(|p| p.x).collect();
        assert_eq!(xs[0], 500.0);
        assert_eq!(*xs.last().unwrap(), (total - 1) as f64);
        assert!(xs.windows(2).all(|w| w[1] == w[0] + 1.0));
    }

    #[test]
    fn nudge_requires_existing_pose() {
        let mut world = WorldState::new();
        assert!(!world.nudge_position(0.1, 0.1));
        assert!(world.trajectory().is_empty());

        world.reset();
        assert!(world.nudge_position(0.5, -0.25));
        assert_eq!(world.trajectory().len(), 2);
        let pose = world.pose().unwrap();
        assert_eq!(pose.position.x, 0.5);
        assert_eq!(pose.position.z, -0.25);
        assert_eq!(pose.rotation, Matrix3::identity());
    }
}
