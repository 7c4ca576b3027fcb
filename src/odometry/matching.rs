//! Temporal feature matching between consecutive frames.

use anyhow::Result;
use opencv::core::{DMatch, Mat, Vector};
use opencv::features2d::BFMatcher;
use opencv::prelude::*;

/// Ranked correspondences are truncated to this many best matches.
pub const MAX_KEPT_MATCHES: usize = 200;
/// Fewer kept matches than this skips the pose update entirely.
pub const MIN_KEPT_MATCHES: usize = 24;

/// A matched feature pair across two frames with its descriptor distance.
/// Ephemeral: built, ranked, and consumed within one cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Correspondence {
    pub previous_index: usize,
    pub current_index: usize,
    pub distance: f32,
}

/// Brute-force Hamming matcher over consecutive ORB descriptor sets.
pub struct TemporalMatcher {
    matcher: BFMatcher,
}

impl TemporalMatcher {
    pub fn new() -> Result<Self> {
        let matcher = BFMatcher::new(opencv::core::NORM_HAMMING, false)?;
        Ok(Self { matcher })
    }

    /// Match previous descriptors (query set) against current (train set).
    pub fn match_descriptors(&self, previous: &Mat, current: &Mat) -> Result<Vec<Correspondence>> {
        let mut matches = Vector::<DMatch>::new();
        self.matcher
            .train_match(previous, current, &mut matches, &Mat::default())?;
        Ok(matches
            .iter()
            .map(|m| Correspondence {
                previous_index: m.query_idx as usize,
                current_index: m.train_idx as usize,
                distance: m.distance,
            })
            .collect())
    }
}

/// Sort ascending by descriptor distance and keep the best
/// min([`MAX_KEPT_MATCHES`], N).
pub fn rank_and_truncate(mut correspondences: Vec<Correspondence>) -> Vec<Correspondence> {
    correspondences.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    correspondences.truncate(MAX_KEPT_MATCHES);
    correspondences
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corr(previous_index: usize, distance: f32) -> Correspondence {
        Correspondence {
            previous_index,
            current_index: previous_index,
            distance,
        }
    }

    #[test]
    fn ranking_sorts_ascending_by_distance() {
        let ranked = rank_and_truncate(vec![corr(0, 30.0), corr(1, 10.0), corr(2, 20.0)]);
        let distances: Vec<f32> = ranked.iter().map(|c| c.distance).collect();
        assert_eq!(distances, vec![10.0, 20.0, 30.0]);
        assert_eq!(ranked[0].previous_index, 1);
    }

    #[test]
    fn ranking_truncates_to_cap() {
        let many: Vec<Correspondence> = (0..500).map(|i| corr(i, i as f32)).collect();
        let ranked = rank_and_truncate(many);
        assert_eq!(ranked.len(), MAX_KEPT_MATCHES);
        assert_eq!(ranked.last().unwrap().distance, (MAX_KEPT_MATCHES - 1) as f32);
    }

    #[test]
    fn ranking_keeps_short_sets_whole() {
        let ranked = rank_and_truncate(vec![corr(0, 5.0), corr(1, 1.0)]);
        assert_eq!(ranked.len(), 2);
        assert!(ranked.len() < MIN_KEPT_MATCHES);
    }
}
