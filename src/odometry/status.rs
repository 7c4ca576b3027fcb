//! Per-cycle outcome and diagnostics structures.
//!
//! These types describe what happened during one odometry cycle: which branch
//! executed, how many correspondences survived ranking, and how many inliers
//! the geometry accepted. They are an observability side-channel and are never
//! part of stored world state.

use crate::odometry::epipolar::GeometryCapability;

/// Terminal outcome of one odometry cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// First cycle after start: no previous feature set to match against.
    WaitingForPreviousFrame,
    /// Fewer than the minimum ranked correspondences survived truncation.
    InsufficientMatches,
    /// The recovered translation direction had a non-finite component.
    InvalidTranslation,
    /// Pose recovery reported fewer inliers than the acceptance floor.
    TooFewInliers,
    /// The composed world coordinate was non-finite; candidate discarded.
    InvalidWorldCoordinate,
    /// Geometric pose update committed.
    Committed,
    /// Median displacement was undefined or non-finite.
    FlowEstimationFailed,
    /// Median displacement below the stationary threshold; treated as no motion.
    MotionTooSmall,
    /// Flow fallback found no pose to update.
    NoWorldState,
    /// Flow fallback committed a translation-only update.
    FlowCommitted,
}

impl CycleOutcome {
    /// True for the two branches that mutate the world state.
    pub fn committed(self) -> bool {
        matches!(self, Self::Committed | Self::FlowCommitted)
    }

    /// Short status-line description.
    pub fn describe(self) -> &'static str {
        match self {
            Self::WaitingForPreviousFrame => "waiting for previous frame",
            Self::InsufficientMatches => "not enough matches",
            Self::InvalidTranslation => "invalid translation vector",
            Self::TooFewInliers => "too few inliers",
            Self::InvalidWorldCoordinate => "invalid world coordinate",
            Self::Committed => "committed",
            Self::FlowEstimationFailed => "flow estimation failed",
            Self::MotionTooSmall => "motion too small",
            Self::NoWorldState => "no world state",
            Self::FlowCommitted => "2D flow fallback",
        }
    }
}

/// Diagnostics for a single cycle.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub outcome: CycleOutcome,
    /// Which estimation entry point the engine ran with this cycle.
    pub capability: GeometryCapability,
    /// Features detected in the current frame.
    pub n_features: usize,
    /// Raw correspondences before ranking.
    pub n_matches: usize,
    /// Correspondences kept after ranking and truncation.
    pub n_kept: usize,
    /// Inliers reported by pose recovery, when that stage ran.
    pub n_inliers: Option<usize>,
}

impl CycleReport {
    /// Report for a cycle that could not match (no usable previous frame).
    pub fn waiting(n_features: usize, capability: GeometryCapability) -> Self {
        Self {
            outcome: CycleOutcome::WaitingForPreviousFrame,
            capability,
            n_features,
            n_matches: 0,
            n_kept: 0,
            n_inliers: None,
        }
    }
}
