use chrono::{DateTime, Utc};

use crate::core::distance::haversine_distance;
use crate::core::filters::{interest_overlap_score, shared_interests};
use crate::models::{Candidate, DiscoveryPreferences, ScoringWeights};

/// Breakdown of a candidate's score, kept for the response and for tests
#[derive(Debug, Clone)]
pub struct MatchScore {
    pub total: f64,
    pub distance_km: Option<f64>,
    pub shared_interests: Vec<String>,
}

/// Calculate a match score (0-100) for a candidate
///
/// score = (
///     distance_score * w.distance +    # closer is better, exponential decay
///     age_score * w.age +              # middle of the preferred range is best
///     interest_score * w.interests +   # overlap with the viewer's interests
///     verified_bonus * w.verified +    # photo-verified profiles
///     activity_score * w.activity      # recently active members
/// ) * 100
pub fn calculate_match_score(
    candidate: &Candidate,
    preferences: &DiscoveryPreferences,
    weights: &ScoringWeights,
    now: DateTime<Utc>,
) -> MatchScore {
    let candidate_location = candidate.latitude.zip(candidate.longitude);
    let distance_km = match (preferences.location, candidate_location) {
        (Some(mine), Some(theirs)) => Some(haversine_distance(mine, theirs)),
        _ => None,
    };

    let distance_score = match distance_km {
        Some(km) => calculate_distance_score(km, preferences.max_distance_km),
        None => 0.5,
    };

    let age_score = calculate_age_score(candidate.age, preferences.min_age, preferences.max_age);

    let shared = shared_interests(candidate, preferences);
    let interest_score = interest_overlap_score(shared.len(), preferences.interests.len());

    let verified_score = if candidate.is_verified { 1.0 } else { 0.0 };

    let activity_score = calculate_activity_score(candidate.last_active_at, now);

    let total = (distance_score * weights.distance
        + age_score * weights.age
        + interest_score * weights.interests
        + verified_score * weights.verified
        + activity_score * weights.activity)
        * 100.0;

    MatchScore {
        total: total.clamp(0.0, 100.0),
        distance_km,
        shared_interests: shared,
    }
}

/// Closer distance = higher score, exponentially decaying
#[inline]
fn calculate_distance_score(distance_km: f64, max_distance_km: u16) -> f64 {
    let max = max_distance_km as f64;
    if distance_km >= max {
        return 0.0;
    }
    (-distance_km / (max * 0.5)).exp()
}

/// Candidates closer to the middle of the preferred age range score higher
#[inline]
fn calculate_age_score(age: u8, min_age: u8, max_age: u8) -> f64 {
    if max_age <= min_age {
        return 1.0;
    }
    let mid = (min_age as f64 + max_age as f64) / 2.0;
    let half_range = (max_age - min_age) as f64 / 2.0;
    let deviation = (age as f64 - mid).abs() / half_range;

    1.0 - deviation.min(1.0)
}

/// Full score when active in the last day, linear decay to zero at 30 days
#[inline]
fn calculate_activity_score(last_active_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let idle_hours = (now - last_active_at).num_hours().max(0) as f64;
    if idle_hours <= 24.0 {
        return 1.0;
    }
    let window = 29.0 * 24.0;
    (1.0 - (idle_hours - 24.0) / window).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use uuid::Uuid;

    fn candidate(age: u8, is_verified: bool) -> Candidate {
        Candidate {
            user_id: Uuid::new_v4(),
            display_name: "Sam".to_string(),
            age,
            gender: "female".to_string(),
            bio: None,
            interests: vec!["climbing".to_string()],
            photo_urls: vec![],
            latitude: Some(48.1351),
            longitude: Some(11.5820),
            is_verified,
            last_active_at: Utc::now(),
            pref_genders: vec![],
            pref_min_age: 18,
            pref_max_age: 99,
        }
    }

    fn preferences() -> DiscoveryPreferences {
        DiscoveryPreferences {
            user_id: Uuid::new_v4(),
            gender: "male".to_string(),
            age: 29,
            preferred_genders: vec!["female".to_string()],
            min_age: 21,
            max_age: 35,
            max_distance_km: 50,
            interests: vec!["climbing".to_string()],
            location: Some((48.1351, 11.5820)),
        }
    }

    #[test]
    fn test_score_in_range() {
        let score = calculate_match_score(
            &candidate(28, true),
            &preferences(),
            &ScoringWeights::default(),
            Utc::now(),
        );
        assert!(score.total > 0.0 && score.total <= 100.0);
        assert_eq!(score.shared_interests, vec!["climbing"]);
        assert!(score.distance_km.unwrap() < 0.01);
    }

    #[test]
    fn test_distance_score() {
        assert!(calculate_distance_score(1.0, 50) > 0.9);
        assert_eq!(calculate_distance_score(50.0, 50), 0.0);
        let half = calculate_distance_score(25.0, 50);
        assert!(half > 0.3 && half < 0.8);
    }

    #[test]
    fn test_age_score() {
        assert!(calculate_age_score(28, 21, 35) > 0.9);
        assert!(calculate_age_score(21, 21, 35) < 0.5);
        assert_eq!(calculate_age_score(30, 30, 30), 1.0);
    }

    #[test]
    fn test_activity_decay() {
        let now = Utc::now();
        assert_eq!(calculate_activity_score(now - Duration::hours(3), now), 1.0);
        let two_weeks = calculate_activity_score(now - Duration::days(15), now);
        assert!(two_weeks > 0.4 && two_weeks < 0.6);
        assert_eq!(calculate_activity_score(now - Duration::days(45), now), 0.0);
    }

    #[test]
    fn test_verified_bonus() {
        let prefs = preferences();
        let weights = ScoringWeights::default();
        let now = Utc::now();
        let verified = calculate_match_score(&candidate(28, true), &prefs, &weights, now);
        let unverified = calculate_match_score(&candidate(28, false), &prefs, &weights, now);
        assert!(verified.total > unverified.total);
    }

    #[test]
    fn test_unknown_location_scores_neutral() {
        let mut prefs = preferences();
        prefs.location = None;
        let score = calculate_match_score(
            &candidate(28, true),
            &prefs,
            &ScoringWeights::default(),
            Utc::now(),
        );
        assert!(score.distance_km.is_none());
        assert!(score.total > 0.0);
    }
}
