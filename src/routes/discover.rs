use actix_web::{web, HttpResponse};
use chrono::Utc;

use super::{today, AppState};
use crate::core::ages::age_on;
use crate::core::distance::calculate_bounding_box;
use crate::error::ApiError;
use crate::extractors::AuthUser;
use crate::models::{CandidateQuery, DiscoverQuery, DiscoverResponse, DiscoveryPreferences, User};
use crate::services::CacheKey;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/discover", web::get().to(discover));
}

/// Viewer-side preferences assembled from the stored profile
pub(crate) fn preferences_for(user: &User) -> DiscoveryPreferences {
    DiscoveryPreferences {
        user_id: user.id,
        gender: user.gender.clone(),
        age: age_on(user.birthdate, today()),
        preferred_genders: user.pref_genders.clone(),
        min_age: user.pref_min_age.clamp(0, u8::MAX as i16) as u8,
        max_age: user.pref_max_age.clamp(0, u8::MAX as i16) as u8,
        max_distance_km: user.pref_max_distance_km.clamp(0, u16::MAX as i32) as u16,
        interests: user.interests.clone(),
        location: user.location(),
    }
}

/// GET /api/discover?limit=
///
/// Candidates come from one SQL query that applies every exclusion and the
/// cheap preference filters; ranking happens in process.
async fn discover(
    state: web::Data<AppState>,
    auth: AuthUser,
    query: web::Query<DiscoverQuery>,
) -> Result<HttpResponse, ApiError> {
    let settings = &state.settings.discover;
    let limit = query
        .limit
        .unwrap_or(settings.default_limit)
        .clamp(1, settings.max_limit.max(1));

    let viewer = state.load_approved_user(auth.id).await?;
    let key = CacheKey::discover(viewer.id, limit);

    let inner = state.clone();
    let response: DiscoverResponse = state
        .cache
        .get_or_load(&key, state.discover_ttl(), || async move {
            let preferences = preferences_for(&viewer);
            let candidate_query = CandidateQuery {
                viewer_id: viewer.id,
                bounding_box: preferences
                    .location
                    .map(|center| calculate_bounding_box(center, preferences.max_distance_km as f64)),
                preferred_genders: preferences.preferred_genders.clone(),
                min_age: preferences.min_age,
                max_age: preferences.max_age,
                limit: limit as usize * inner.settings.discover.candidate_factor.max(1),
            };

            let candidates = inner.db.get_discover_candidates(&candidate_query, today()).await?;
            let ranked = inner
                .matcher
                .rank(&preferences, candidates, limit as usize, Utc::now());

            tracing::info!(
                "Discover for {}: {} ranked of {} candidates",
                viewer.id,
                ranked.candidates.len(),
                ranked.total_candidates
            );

            Ok::<_, ApiError>(DiscoverResponse {
                candidates: ranked.candidates,
                total_candidates: ranked.total_candidates,
            })
        })
        .await?;

    Ok(HttpResponse::Ok().json(response))
}
