use crate::models::{Candidate, DiscoveryPreferences};

/// Check a candidate against the viewer's hard preferences
#[inline]
pub fn matches_demographics(candidate: &Candidate, preferences: &DiscoveryPreferences) -> bool {
    if candidate.user_id == preferences.user_id {
        return false;
    }

    if !preferences.preferred_genders.is_empty()
        && !preferences.preferred_genders.iter().any(|g| g.eq_ignore_ascii_case(&candidate.gender))
    {
        return false;
    }

    candidate.age >= preferences.min_age && candidate.age <= preferences.max_age
}

/// The viewer must also fit what the candidate is looking for
#[inline]
pub fn is_mutually_compatible(candidate: &Candidate, preferences: &DiscoveryPreferences) -> bool {
    if !candidate.pref_genders.is_empty()
        && !candidate.pref_genders.iter().any(|g| g.eq_ignore_ascii_case(&preferences.gender))
    {
        return false;
    }

    preferences.age >= candidate.pref_min_age && preferences.age <= candidate.pref_max_age
}

/// Interests both sides list, compared case-insensitively, in the candidate's order
pub fn shared_interests(candidate: &Candidate, preferences: &DiscoveryPreferences) -> Vec<String> {
    candidate
        .interests
        .iter()
        .filter(|interest| {
            preferences
                .interests
                .iter()
                .any(|mine| mine.eq_ignore_ascii_case(interest))
        })
        .cloned()
        .collect()
}

/// Share of the viewer's interests the candidate also has, with diminishing
/// returns past five (0.0 to 1.0)
#[inline]
pub fn interest_overlap_score(shared: usize, viewer_interest_count: usize) -> f64 {
    if viewer_interest_count == 0 {
        return 0.5;
    }
    let denominator = viewer_interest_count.min(5) as f64;
    (shared as f64 / denominator).min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn candidate(age: u8, gender: &str) -> Candidate {
        Candidate {
            user_id: Uuid::new_v4(),
            display_name: "Robin".to_string(),
            age,
            gender: gender.to_string(),
            bio: None,
            interests: vec!["Hiking".to_string(), "jazz".to_string()],
            photo_urls: vec![],
            latitude: Some(52.52),
            longitude: Some(13.40),
            is_verified: true,
            last_active_at: Utc::now(),
            pref_genders: vec!["male".to_string()],
            pref_min_age: 25,
            pref_max_age: 40,
        }
    }

    fn preferences() -> DiscoveryPreferences {
        DiscoveryPreferences {
            user_id: Uuid::new_v4(),
            gender: "male".to_string(),
            age: 30,
            preferred_genders: vec!["female".to_string()],
            min_age: 21,
            max_age: 35,
            max_distance_km: 50,
            interests: vec!["hiking".to_string(), "cooking".to_string()],
            location: Some((52.52, 13.40)),
        }
    }

    #[test]
    fn test_demographics_match() {
        assert!(matches_demographics(&candidate(28, "female"), &preferences()));
        assert!(matches_demographics(&candidate(28, "Female"), &preferences()));
    }

    #[test]
    fn test_demographics_fail_age_and_gender() {
        assert!(!matches_demographics(&candidate(40, "female"), &preferences()));
        assert!(!matches_demographics(&candidate(28, "male"), &preferences()));
    }

    #[test]
    fn test_self_is_never_a_candidate() {
        let prefs = preferences();
        let mut me = candidate(28, "female");
        me.user_id = prefs.user_id;
        assert!(!matches_demographics(&me, &prefs));
    }

    #[test]
    fn test_mutual_compatibility() {
        let prefs = preferences();
        assert!(is_mutually_compatible(&candidate(28, "female"), &prefs));

        let mut picky = candidate(28, "female");
        picky.pref_genders = vec!["female".to_string()];
        assert!(!is_mutually_compatible(&picky, &prefs));

        let mut younger = candidate(28, "female");
        younger.pref_max_age = 29;
        assert!(!is_mutually_compatible(&younger, &prefs));
    }

    #[test]
    fn test_shared_interests_case_insensitive() {
        let shared = shared_interests(&candidate(28, "female"), &preferences());
        assert_eq!(shared, vec!["Hiking"]);
    }

    #[test]
    fn test_interest_overlap_score() {
        assert_eq!(interest_overlap_score(0, 0), 0.5);
        assert_eq!(interest_overlap_score(1, 2), 0.5);
        assert_eq!(interest_overlap_score(5, 8), 1.0);
    }
}
