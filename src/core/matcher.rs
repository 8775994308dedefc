use chrono::{DateTime, Utc};

use crate::core::{
    distance::{calculate_bounding_box, is_within_bounding_box},
    filters::{is_mutually_compatible, matches_demographics},
    scoring::calculate_match_score,
};
use crate::models::{Candidate, DiscoveryPreferences, ScoredCandidate, ScoringWeights};

/// Candidates scoring below this are not shown
const MIN_SCORE: f64 = 5.0;

/// Result of ranking a discover batch
#[derive(Debug)]
pub struct RankResult {
    pub candidates: Vec<ScoredCandidate>,
    pub total_candidates: usize,
}

/// Discover ranking pipeline
///
/// # Pipeline Stages
/// 1. Geospatial pre-filter (bounding box, then exact radius)
/// 2. Demographic and mutual-preference filtering
/// 3. Scoring and ranking
#[derive(Debug, Clone)]
pub struct Matcher {
    weights: ScoringWeights,
}

impl Matcher {
    pub fn new(weights: ScoringWeights) -> Self {
        Self { weights }
    }

    pub fn with_default_weights() -> Self {
        Self {
            weights: ScoringWeights::default(),
        }
    }

    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    /// Rank `candidates` for the viewer described by `preferences`.
    ///
    /// When the viewer has no location the distance stage is skipped and
    /// every candidate gets a neutral distance score. When the viewer has a
    /// location, candidates without one are dropped.
    pub fn rank(
        &self,
        preferences: &DiscoveryPreferences,
        candidates: Vec<Candidate>,
        limit: usize,
        now: DateTime<Utc>,
    ) -> RankResult {
        let total_candidates = candidates.len();
        let max_distance = preferences.max_distance_km as f64;
        let bounding_box = preferences
            .location
            .map(|center| calculate_bounding_box(center, max_distance));

        let mut ranked: Vec<ScoredCandidate> = candidates
            .into_iter()
            // Stage 1: geospatial pre-filter
            .filter(|candidate| match bounding_box {
                Some(ref bbox) => candidate
                    .latitude
                    .zip(candidate.longitude)
                    .is_some_and(|point| is_within_bounding_box(point, bbox)),
                None => true,
            })
            // Stage 2: hard preferences on both sides
            .filter(|candidate| matches_demographics(candidate, preferences))
            .filter(|candidate| is_mutually_compatible(candidate, preferences))
            // Stage 3: score, dropping anything outside the exact radius
            .filter_map(|candidate| {
                let score = calculate_match_score(&candidate, preferences, &self.weights, now);

                if score.distance_km.is_some_and(|km| km > max_distance) {
                    return None;
                }
                if score.total < MIN_SCORE {
                    return None;
                }

                Some(ScoredCandidate {
                    user_id: candidate.user_id,
                    display_name: candidate.display_name,
                    age: candidate.age,
                    gender: candidate.gender,
                    bio: candidate.bio,
                    photo_urls: candidate.photo_urls,
                    distance_km: score.distance_km,
                    match_score: score.total,
                    shared_interests: score.shared_interests,
                    is_verified: candidate.is_verified,
                })
            })
            .collect();

        // Score descending, then distance ascending (unknown distances last)
        ranked.sort_by(|a, b| {
            b.match_score
                .partial_cmp(&a.match_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| {
                    let a_km = a.distance_km.unwrap_or(f64::MAX);
                    let b_km = b.distance_km.unwrap_or(f64::MAX);
                    a_km.partial_cmp(&b_km).unwrap_or(std::cmp::Ordering::Equal)
                })
        });

        ranked.truncate(limit);

        RankResult {
            candidates: ranked,
            total_candidates,
        }
    }
}

impl Default for Matcher {
    fn default() -> Self {
        Self::with_default_weights()
    }
}
