use actix_web::{web, HttpResponse};
use chrono::{Duration as ChronoDuration, Utc};
use std::time::Duration;

use super::{today, AppState};
use crate::core::distance::haversine_distance;
use crate::core::plans::PlanFeatures;
use crate::core::swipes::{start_of_day, undo_cutoff};
use crate::error::ApiError;
use crate::extractors::AuthUser;
use crate::models::{LikesResponse, PublicProfile, SwipeRequest, SwipeResponse, UndoResponse};
use crate::services::Limited;

/// Upper bound on liker profiles returned at once
const MAX_LIKES_LISTED: i64 = 200;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/swipes", web::post().to(swipe))
        .route("/swipes/undo", web::post().to(undo))
        .route("/likes", web::get().to(likes));
}

/// Time left until quotas reset at UTC midnight
fn until_quota_reset() -> Limited {
    let now = Utc::now();
    let reset = start_of_day(now) + ChronoDuration::days(1);
    let secs = (reset - now).num_seconds().max(1) as u64;
    Limited {
        retry_after: Duration::from_secs(secs),
    }
}

/// POST /api/swipes
async fn swipe(
    state: web::Data<AppState>,
    auth: AuthUser,
    body: web::Json<SwipeRequest>,
) -> Result<HttpResponse, ApiError> {
    let req = body.into_inner();
    if req.target_id == auth.id {
        return Err(ApiError::validation("You cannot swipe on yourself"));
    }

    state.load_approved_user(auth.id).await?;
    state.visible_member(auth.id, req.target_id).await?;

    let features = state.features_for(auth.id).await?;
    let outcome = state
        .db
        .record_swipe(
            auth.id,
            req.target_id,
            req.direction,
            &features,
            start_of_day(Utc::now()),
        )
        .await?
        .map_err(|exceeded| ApiError::rate_limited(exceeded.to_string(), until_quota_reset()))?;

    state.forget_discover(&[auth.id]).await;
    if let Some(matched) = &outcome.matched {
        state.forget_matches(&[matched.user_a, matched.user_b]).await;
        tracing::info!("New match {} between {} and {}", matched.id, matched.user_a, matched.user_b);
    }

    let matched = outcome.matched.is_some();
    Ok(HttpResponse::Created().json(SwipeResponse {
        swipe: outcome.swipe,
        matched_with: outcome.matched,
        matched,
    }))
}

/// POST /api/swipes/undo
async fn undo(state: web::Data<AppState>, auth: AuthUser) -> Result<HttpResponse, ApiError> {
    state.load_active_user(auth.id).await?;

    let features = state.features_for(auth.id).await?;
    if !features.undo {
        return Err(ApiError::forbidden("Undo is not included in your plan"));
    }

    let outcome = state
        .db
        .undo_last_swipe(auth.id, undo_cutoff(Utc::now()))
        .await?
        .ok_or_else(|| ApiError::not_found("No swipe to undo"))?;

    state.forget_discover(&[auth.id]).await;
    if outcome.match_removed {
        state.forget_matches(&[auth.id, outcome.swipe.target_id]).await;
    }

    Ok(HttpResponse::Ok().json(UndoResponse {
        swipe: outcome.swipe,
        match_removed: outcome.match_removed,
        messages_removed: outcome.messages_removed,
    }))
}

/// GET /api/likes
async fn likes(state: web::Data<AppState>, auth: AuthUser) -> Result<HttpResponse, ApiError> {
    let viewer = state.load_active_user(auth.id).await?;
    let (_, tier) = state.plan_for(auth.id).await?;
    let count = state.db.count_likes_received(auth.id).await?.max(0) as usize;

    let profiles = if PlanFeatures::for_tier(tier).see_who_liked_you {
        let today = today();
        let likers = state.db.likes_received(auth.id, MAX_LIKES_LISTED).await?;
        Some(
            likers
                .iter()
                .map(|liker| {
                    let distance = viewer
                        .location()
                        .zip(liker.location())
                        .map(|(from, to)| (haversine_distance(from, to) * 10.0).round() / 10.0);
                    PublicProfile::from_user(liker, today, distance)
                })
                .collect(),
        )
    } else {
        None
    };

    Ok(HttpResponse::Ok().json(LikesResponse { count, profiles }))
}
