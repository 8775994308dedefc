use actix_web::{web, HttpResponse};
use std::time::Duration;
use uuid::Uuid;
use validator::Validate;

use super::AppState;
use crate::core::safety::should_escalate;
use crate::error::ApiError;
use crate::extractors::AuthUser;
use crate::models::{ApprovalStatus, BlockRequest, ReportRequest};
use crate::services::postgres::NewReport;
use crate::services::CacheKey;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/blocks", web::get().to(list_blocks))
        .route("/blocks", web::post().to(block))
        .route("/blocks/{user_id}", web::delete().to(unblock))
        .route("/reports", web::post().to(report));
}

/// POST /api/blocks
async fn block(
    state: web::Data<AppState>,
    auth: AuthUser,
    body: web::Json<BlockRequest>,
) -> Result<HttpResponse, ApiError> {
    let target = body.user_id;
    if target == auth.id {
        return Err(ApiError::validation("You cannot block yourself"));
    }

    state.load_active_user(auth.id).await?;
    state
        .db
        .get_user(target)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let block = state.db.block_user(auth.id, target).await?;

    state.forget_discover(&[auth.id, target]).await;
    state.forget_matches(&[auth.id, target]).await;

    Ok(HttpResponse::Created().json(block))
}

/// DELETE /api/blocks/{user_id}
async fn unblock(
    state: web::Data<AppState>,
    auth: AuthUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let target = path.into_inner();
    if !state.db.unblock_user(auth.id, target).await? {
        return Err(ApiError::not_found("Block not found"));
    }

    state.forget_discover(&[auth.id, target]).await;
    Ok(HttpResponse::NoContent().finish())
}

/// GET /api/blocks
async fn list_blocks(state: web::Data<AppState>, auth: AuthUser) -> Result<HttpResponse, ApiError> {
    let blocks = state.db.list_blocks(auth.id).await?;
    Ok(HttpResponse::Ok().json(blocks))
}

/// File a report. Enough distinct reporters send the profile back to review.
///
/// POST /api/reports
async fn report(
    state: web::Data<AppState>,
    auth: AuthUser,
    body: web::Json<ReportRequest>,
) -> Result<HttpResponse, ApiError> {
    let req = body.into_inner();
    req.validate()?;

    if req.user_id == auth.id {
        return Err(ApiError::validation("You cannot report yourself"));
    }

    state.load_active_user(auth.id).await?;
    state
        .limiter
        .check(
            &format!("reports:{}", auth.id),
            state.settings.rate_limit.reports_per_hour,
            Duration::from_secs(60 * 60),
        )
        .map_err(|limited| ApiError::rate_limited("Too many reports", limited))?;

    state
        .db
        .get_user(req.user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    if let Some(message_id) = req.message_id {
        let sender = state.db.message_sender(message_id).await?;
        if sender != Some(req.user_id) {
            return Err(ApiError::validation("Message was not sent by the reported user"));
        }
    }

    let created = state
        .db
        .create_report(NewReport {
            reporter_id: auth.id,
            reported_id: req.user_id,
            reason: req.reason,
            details: req.details.map(|d| d.trim().to_string()).filter(|d| !d.is_empty()),
            message_id: req.message_id,
        })
        .await?;

    let reporters = state.db.distinct_open_reporters(req.user_id).await?;
    let threshold = state.settings.moderation.report_escalation_threshold;
    if should_escalate(reporters, threshold)
        && state
            .db
            .set_approval_status(req.user_id, ApprovalStatus::Pending)
            .await?
    {
        tracing::warn!(
            "User {} sent back to review after reports from {} members",
            req.user_id,
            reporters
        );
        state.cache.forget_prefix(CacheKey::DISCOVER_PREFIX).await;
    }

    Ok(HttpResponse::Created().json(created))
}
