use actix_web::{web, HttpResponse};
use uuid::Uuid;
use validator::Validate;

use super::auth::removal_cookie;
use super::{today, AppState};
use crate::core::ages::{age_on, MINIMUM_AGE};
use crate::core::distance::haversine_distance;
use crate::core::plans::PlanFeatures;
use crate::core::safety::SafetyScanner;
use crate::error::ApiError;
use crate::extractors::AuthUser;
use crate::models::{ProfileResponse, PublicProfile, UpdateProfileRequest, User, VerificationRequest};
use crate::services::postgres::ProfileChanges;

const MAX_INTEREST_LENGTH: usize = 30;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/users/me", web::get().to(get_me))
        .route("/users/me", web::patch().to(update_me))
        .route("/users/me", web::delete().to(delete_me))
        .route("/users/me/verification", web::post().to(request_verification))
        .route("/users/{user_id}", web::get().to(get_member));
}

async fn get_me(state: web::Data<AppState>, auth: AuthUser) -> Result<HttpResponse, ApiError> {
    let user = state.load_active_user(auth.id).await?;
    let (_, plan) = state.plan_for(user.id).await?;
    let age = age_on(user.birthdate, today());

    Ok(HttpResponse::Ok().json(ProfileResponse { user, age, plan }))
}

/// Turn a validated request into column changes, enforcing the rules that
/// depend on the stored profile and the caller's plan.
fn profile_changes(
    req: UpdateProfileRequest,
    current: &User,
    features: &PlanFeatures,
    scanner: &SafetyScanner,
) -> Result<ProfileChanges, ApiError> {
    let mut changes = ProfileChanges::default();

    if let Some(name) = req.display_name {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(ApiError::validation("Display name cannot be blank"));
        }
        let verdict = scanner.scan(&name);
        if verdict.is_blocked() {
            return Err(ApiError::validation(format!(
                "Display name not allowed: {}",
                verdict.reasons()
            )));
        }
        changes.display_name = Some(name);
    }

    if let Some(bio) = req.bio {
        let bio = bio.trim().to_string();
        let verdict = scanner.scan(&bio);
        if verdict.is_blocked() {
            return Err(ApiError::validation(format!("Bio not allowed: {}", verdict.reasons())));
        }
        if verdict.is_flagged() {
            tracing::info!("Bio for {} flagged: {}", current.id, verdict.reasons());
        }
        changes.bio = Some(bio);
    }

    if let Some(gender) = req.gender {
        changes.gender = Some(gender.trim().to_lowercase());
    }

    if let Some(interests) = req.interests {
        let mut normalized: Vec<String> = Vec::with_capacity(interests.len());
        for interest in interests {
            let interest = interest.trim().to_lowercase();
            if interest.is_empty() {
                continue;
            }
            if interest.chars().count() > MAX_INTEREST_LENGTH {
                return Err(ApiError::validation(format!(
                    "Interests must be at most {} characters",
                    MAX_INTEREST_LENGTH
                )));
            }
            if !normalized.contains(&interest) {
                normalized.push(interest);
            }
        }
        changes.interests = Some(normalized);
    }

    if let Some(photos) = req.photo_urls {
        if photos.len() > features.max_photos {
            return Err(ApiError::forbidden(format!(
                "Your plan allows at most {} photos",
                features.max_photos
            )));
        }
        changes.photo_urls = Some(photos);
    }

    if let Some(location) = req.location {
        changes.latitude = Some(location.latitude);
        changes.longitude = Some(location.longitude);
    }

    if let Some(prefs) = req.preferences {
        let min_age = prefs.min_age.map(i16::from).unwrap_or(current.pref_min_age);
        let max_age = prefs.max_age.map(i16::from).unwrap_or(current.pref_max_age);
        if min_age < MINIMUM_AGE as i16 || max_age < min_age {
            return Err(ApiError::validation(
                "Preferred age range must start at 18 and maxAge must not be below minAge",
            ));
        }

        changes.pref_genders = prefs
            .genders
            .map(|genders| genders.into_iter().map(|g| g.trim().to_lowercase()).collect());
        changes.pref_min_age = prefs.min_age.map(i16::from);
        changes.pref_max_age = prefs.max_age.map(i16::from);
        changes.pref_max_distance_km = prefs.max_distance_km.map(i32::from);
    }

    Ok(changes)
}

/// PATCH /api/users/me
async fn update_me(
    state: web::Data<AppState>,
    auth: AuthUser,
    body: web::Json<UpdateProfileRequest>,
) -> Result<HttpResponse, ApiError> {
    let req = body.into_inner();
    req.validate()?;

    let current = state.load_active_user(auth.id).await?;
    let (_, plan) = state.plan_for(auth.id).await?;
    let changes = profile_changes(req, &current, &PlanFeatures::for_tier(plan), &state.scanner)?;

    let user = state.db.update_profile(auth.id, changes).await?;
    state.forget_discover(&[auth.id]).await;

    tracing::debug!("Profile updated for {}", auth.id);
    let age = age_on(user.birthdate, today());
    Ok(HttpResponse::Ok().json(ProfileResponse { user, age, plan }))
}

/// DELETE /api/users/me
async fn delete_me(state: web::Data<AppState>, auth: AuthUser) -> Result<HttpResponse, ApiError> {
    if !state.db.delete_user(auth.id).await? {
        return Err(ApiError::not_found("User not found"));
    }

    state.forget_discover(&[auth.id]).await;
    state.forget_matches(&[auth.id]).await;
    tracing::info!("Deleted account {}", auth.id);

    Ok(HttpResponse::NoContent()
        .cookie(removal_cookie(&state.tokens))
        .finish())
}

/// POST /api/users/me/verification
async fn request_verification(
    state: web::Data<AppState>,
    auth: AuthUser,
    body: web::Json<VerificationRequest>,
) -> Result<HttpResponse, ApiError> {
    body.validate()?;
    state.load_active_user(auth.id).await?;

    if !state.db.request_verification(auth.id, &body.selfie_url).await? {
        return Err(ApiError::conflict("Verification is already pending or complete"));
    }

    Ok(HttpResponse::Accepted().json(serde_json::json!({ "verificationStatus": "pending" })))
}

/// GET /api/users/{user_id}
async fn get_member(
    state: web::Data<AppState>,
    auth: AuthUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let member_id = path.into_inner();
    let viewer = state.load_active_user(auth.id).await?;
    let member = if member_id == viewer.id {
        viewer.clone()
    } else {
        state.visible_member(viewer.id, member_id).await?
    };

    let distance = viewer
        .location()
        .zip(member.location())
        .map(|(from, to)| (haversine_distance(from, to) * 10.0).round() / 10.0);

    Ok(HttpResponse::Ok().json(PublicProfile::from_user(&member, today(), distance)))
}
