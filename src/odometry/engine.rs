//! Odometry engine: turns two consecutive feature sets into a validated pose
//! update or a diagnosed skip.
//!
//! Pipeline per cycle:
//! - match previous (query) against current (train) descriptors
//! - rank ascending by distance, keep the best min(200, N), require >= 24
//! - attempt epipolar geometry and pose recovery, validating translation,
//!   inlier count, and the full candidate pose before committing
//! - otherwise fall back to a median-flow position nudge
//!
//! The engine owns exactly one previous-frame feature set; the slot is
//! exchanged at the end of every cycle, including skip cycles.

use anyhow::Result;
use nalgebra::Matrix3;
use opencv::core::{KeyPoint, Mat, Point2f, Ptr, Vector};
use opencv::features2d::{self, ORB};
use opencv::prelude::*;
use tracing::{debug, info};

use crate::geometry::{calibration_matrix, vec3_is_finite};
use crate::odometry::epipolar::{mask_flags, EpipolarEstimator, GeometryCapability};
use crate::odometry::flow::{median_flow, FLOW_STEP_SCALE, MIN_PIXEL_SHIFT};
use crate::odometry::matching::{
    rank_and_truncate, Correspondence, TemporalMatcher, MIN_KEPT_MATCHES,
};
use crate::odometry::status::{CycleOutcome, CycleReport};
use crate::world::{LandmarkPoint, WorldState};

/// Step applied to the unit-scale recovered translation. Arbitrary: monocular
/// estimation fixes direction, not magnitude.
const STEP_SCALE: f64 = 0.12;
/// Minimum cheirality-consistent correspondences to accept a recovery.
const MIN_INLIERS: usize = 12;
/// Landmark seeding aims for roughly this many points per committed cycle.
const LANDMARK_TARGET: usize = 120;
/// Landmarks sit on a lateral plane this far ahead of the new position.
const LANDMARK_DEPTH: f64 = 0.25;

/// One frame's detected features. Exactly one generation is retained as
/// "previous"; it is exchanged, not copied, each cycle.
pub struct FrameFeatures {
    pub keypoints: Vector<KeyPoint>,
    pub descriptors: Mat,
}

pub struct OdometryEngine {
    orb: Ptr<ORB>,
    matcher: TemporalMatcher,
    estimator: EpipolarEstimator,
    calibration: Matrix3<f64>,
    frame_width: i32,
    previous: Option<FrameFeatures>,
    capability_logged: bool,
}

impl OdometryEngine {
    /// Build the engine for frames of a fixed size. The calibration matrix is
    /// synthesized from the dimensions; no external calibration is accepted.
    pub fn new(
        frame_width: i32,
        frame_height: i32,
        n_features: i32,
        capability: GeometryCapability,
    ) -> Result<Self> {
        let orb = ORB::create(
            n_features,
            1.2,
            8,
            31,
            0,
            2,
            features2d::ORB_ScoreType::HARRIS_SCORE,
            31,
            20,
        )?;
        Ok(Self {
            orb,
            matcher: TemporalMatcher::new()?,
            estimator: EpipolarEstimator::new(capability),
            calibration: calibration_matrix(frame_width, frame_height),
            frame_width,
            previous: None,
            capability_logged: false,
        })
    }

    /// Keypoints of the most recently processed frame, for overlay drawing.
    pub fn last_keypoints(&self) -> Option<&Vector<KeyPoint>> {
        self.previous.as_ref().map(|f| &f.keypoints)
    }

    /// Run one odometry cycle on a grayscale frame. Transient vision objects
    /// are dropped when this returns; only the previous-feature slot persists.
    pub fn process_frame(&mut self, gray: &Mat, world: &mut WorldState) -> Result<CycleReport> {
        let features = self.detect_features(gray)?;
        let n_features = features.keypoints.len();

        let report = match self.previous.take() {
            Some(previous)
                if !previous.descriptors.empty() && !features.descriptors.empty() =>
            {
                self.estimate_update(&previous, &features, world)?
            }
            _ => CycleReport::waiting(n_features, self.estimator.capability()),
        };

        // Exchange the slot; the superseded generation is released here.
        self.previous = Some(features);

        debug!(
            outcome = report.outcome.describe(),
            matches = report.n_matches,
            kept = report.n_kept,
            inliers = ?report.n_inliers,
            "odometry cycle"
        );
        Ok(report)
    }

    fn detect_features(&mut self, image: &Mat) -> Result<FrameFeatures> {
        let mut keypoints = Vector::<KeyPoint>::new();
        let mut descriptors = Mat::default();
        let mask = Mat::default();
        self.orb
            .detect_and_compute(image, &mask, &mut keypoints, &mut descriptors, false)?;
        Ok(FrameFeatures {
            keypoints,
            descriptors,
        })
    }

    fn estimate_update(
        &mut self,
        previous: &FrameFeatures,
        current: &FrameFeatures,
        world: &mut WorldState,
    ) -> Result<CycleReport> {
        let all = self
            .matcher
            .match_descriptors(&previous.descriptors, &current.descriptors)?;
        let n_matches = all.len();
        let kept = rank_and_truncate(all);
        let n_kept = kept.len();
        let n_features = current.keypoints.len();
        let capability = self.estimator.capability();

        let report = move |outcome: CycleOutcome, n_inliers: Option<usize>| CycleReport {
            outcome,
            capability,
            n_features,
            n_matches,
            n_kept,
            n_inliers,
        };

        if n_kept < MIN_KEPT_MATCHES {
            return Ok(report(CycleOutcome::InsufficientMatches, None));
        }

        let (pts_previous, pts_current) = build_point_arrays(previous, current, &kept)?;

        if !self.capability_logged {
            self.capability_logged = true;
            info!(
                capability = self.estimator.capability().label(),
                "epipolar capability"
            );
        }

        let mut mask = Mat::default();
        let essential =
            self.estimator
                .estimate(&pts_previous, &pts_current, &self.calibration, &mut mask)?;

        match essential {
            Some(e) => {
                let recovery = self.estimator.recover(
                    &e,
                    &pts_previous,
                    &pts_current,
                    &self.calibration,
                    &mut mask,
                )?;
                let inliers = Some(recovery.inlier_count);

                let translation = match recovery.translation {
                    Some(t) if vec3_is_finite(&t) => t,
                    _ => return Ok(report(CycleOutcome::InvalidTranslation, inliers)),
                };
                if recovery.inlier_count < MIN_INLIERS {
                    return Ok(report(CycleOutcome::TooFewInliers, inliers));
                }
                let Some(pose) = world.pose().cloned() else {
                    return Ok(report(CycleOutcome::NoWorldState, inliers));
                };

                let candidate = pose.compose_step(&recovery.rotation, &translation, STEP_SCALE);
                if !candidate.is_finite() {
                    return Ok(report(CycleOutcome::InvalidWorldCoordinate, inliers));
                }

                let position = candidate.position;
                world.commit_pose(candidate);
                self.seed_landmarks(world, &pts_current, &mask, n_kept, position)?;

                Ok(report(CycleOutcome::Committed, inliers))
            }
            None => {
                let previous_px = point_pairs(&pts_previous);
                let current_px = point_pairs(&pts_current);
                let Some((dx, dy)) = median_flow(&previous_px, &current_px) else {
                    return Ok(report(CycleOutcome::FlowEstimationFailed, None));
                };
                if !dx.is_finite() || !dy.is_finite() {
                    return Ok(report(CycleOutcome::FlowEstimationFailed, None));
                }
                if dx.abs() + dy.abs() < MIN_PIXEL_SHIFT {
                    return Ok(report(CycleOutcome::MotionTooSmall, None));
                }
                if !world.nudge_position(-dx * FLOW_STEP_SCALE, -dy * FLOW_STEP_SCALE) {
                    return Ok(report(CycleOutcome::NoWorldState, None));
                }
                Ok(report(CycleOutcome::FlowCommitted, None))
            }
        }
    }

    /// Derive landmark points from a strided subsample of inlier
    /// correspondences: the normalized horizontal pixel offset projected into
    /// a lateral plane a fixed depth ahead of the new position. A cosmetic
    /// approximation, not triangulation.
    fn seed_landmarks(
        &self,
        world: &mut WorldState,
        pts_current: &Vector<Point2f>,
        mask: &Mat,
        n_kept: usize,
        position: nalgebra::Vector3<f64>,
    ) -> Result<()> {
        let flags = mask_flags(mask, n_kept);
        let stride = (n_kept / LANDMARK_TARGET).max(2);
        let half_width = f64::from(self.frame_width) / 2.0;

        for i in (0..n_kept).step_by(stride) {
            if !flags[i] {
                continue;
            }
            let x = f64::from(pts_current.get(i)?.x);
            let nx = (x - half_width) / half_width;
            world.push_landmark(LandmarkPoint {
                x: position.x + nx * LANDMARK_DEPTH,
                y: 0.0,
                z: position.z + LANDMARK_DEPTH,
            });
        }
        Ok(())
    }
}

/// Gather matched keypoint locations into point arrays, in kept order.
fn build_point_arrays(
    previous: &FrameFeatures,
    current: &FrameFeatures,
    kept: &[Correspondence],
) -> Result<(Vector<Point2f>, Vector<Point2f>)> {
    let mut pts_previous = Vector::<Point2f>::new();
    let mut pts_current = Vector::<Point2f>::new();
    for c in kept {
        pts_previous.push(previous.keypoints.get(c.previous_index)?.pt());
        pts_current.push(current.keypoints.get(c.current_index)?.pt());
    }
    Ok((pts_previous, pts_current))
}

fn point_pairs(points: &Vector<Point2f>) -> Vec<(f64, f64)> {
    points
        .iter()
        .map(|p| (f64::from(p.x), f64::from(p.y)))
        .collect()
}
