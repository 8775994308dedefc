use actix_web::{web, HttpResponse};
use chrono::Utc;
use validator::Validate;

use super::AppState;
use crate::core::coupons::{evaluate, normalize_code};
use crate::core::plans::{catalogue, PlanFeatures};
use crate::error::ApiError;
use crate::extractors::AuthUser;
use crate::models::{CouponQuoteRequest, PlanTier, SubscriptionResponse};
use crate::services::CacheKey;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/plans", web::get().to(list_plans))
        .route("/subscription", web::get().to(get_subscription))
        .route("/subscription/cancel", web::post().to(cancel))
        .route("/subscription/coupon", web::post().to(quote_coupon));
}

/// GET /api/plans
async fn list_plans() -> HttpResponse {
    HttpResponse::Ok().json(catalogue())
}

/// GET /api/subscription
async fn get_subscription(state: web::Data<AppState>, auth: AuthUser) -> Result<HttpResponse, ApiError> {
    let (subscription, effective_tier) = state.plan_for(auth.id).await?;

    Ok(HttpResponse::Ok().json(SubscriptionResponse {
        subscription,
        effective_tier,
        features: PlanFeatures::for_tier(effective_tier),
    }))
}

/// The tier stays until the period ends
///
/// POST /api/subscription/cancel
async fn cancel(state: web::Data<AppState>, auth: AuthUser) -> Result<HttpResponse, ApiError> {
    let (_, tier) = state.plan_for(auth.id).await?;
    if tier == PlanTier::Free {
        return Err(ApiError::not_found("No active paid subscription"));
    }

    let subscription = state
        .db
        .cancel_subscription(auth.id)
        .await?
        .ok_or_else(|| ApiError::not_found("No active paid subscription"))?;

    state.cache.forget(&[CacheKey::subscription(auth.id)]).await;
    tracing::info!("User {} cancelled at period end", auth.id);

    Ok(HttpResponse::Ok().json(SubscriptionResponse {
        effective_tier: tier,
        features: PlanFeatures::for_tier(tier),
        subscription: Some(subscription),
    }))
}

/// Price a plan with a coupon. Nothing is redeemed here.
///
/// POST /api/subscription/coupon
async fn quote_coupon(
    state: web::Data<AppState>,
    _auth: AuthUser,
    body: web::Json<CouponQuoteRequest>,
) -> Result<HttpResponse, ApiError> {
    body.validate()?;

    let code = normalize_code(&body.code);
    let coupon = state
        .db
        .get_coupon(&code)
        .await?
        .ok_or_else(|| ApiError::not_found("Coupon not found"))?;

    let quote = evaluate(&coupon, body.tier, Utc::now())
        .map_err(|rejection| ApiError::validation(rejection.to_string()))?;

    Ok(HttpResponse::Ok().json(quote))
}
