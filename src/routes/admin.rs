//! Moderation and back-office JSON endpoints.
//!
//! Permissions are checked against the role stored in the database, so a
//! demoted moderator loses access before their token expires.

use actix_web::{web, HttpResponse};
use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use super::AppState;
use crate::core::coupons::{evaluate, normalize_code};
use crate::core::permissions::Permission;
use crate::core::slug::{is_valid_slug, slugify};
use crate::error::ApiError;
use crate::extractors::{require_permission, AuthUser};
use crate::models::{
    BulkModerationRequest, ContentStatus, CountResponse, Coupon, CreateArticleRequest, CreateCouponRequest,
    CreatePostRequest, PlanTier, ReportsQuery, ReviewReportRequest, SetSubscriptionRequest,
    UpdateArticleRequest, UpdatePostRequest, User, VerificationDecisionRequest, VerificationStatus,
};
use crate::services::postgres::{ArticleChanges, NewArticle, NewPost, PostChanges};
use crate::services::CacheKey;

const DEFAULT_REPORTS_LIMIT: u16 = 50;
const MAX_REPORTS_LIMIT: u16 = 200;
const MAX_TAGS: usize = 20;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/admin")
            .route("/users/bulk", web::post().to(bulk_moderate))
            .route("/users/{user_id}/verification", web::patch().to(decide_verification))
            .route("/users/{user_id}/subscription", web::put().to(set_subscription))
            .route("/coupons", web::get().to(list_coupons))
            .route("/coupons", web::post().to(create_coupon))
            .route("/coupons/{code}", web::delete().to(deactivate_coupon))
            .route("/reports", web::get().to(list_reports))
            .route("/reports/{report_id}", web::patch().to(review_report))
            .route("/kb/articles", web::post().to(create_article))
            .route("/kb/articles/{article_id}", web::patch().to(update_article))
            .route("/kb/articles/{article_id}", web::delete().to(delete_article))
            .route("/blog/posts", web::post().to(create_post))
            .route("/blog/posts/{post_id}", web::patch().to(update_post))
            .route("/blog/posts/{post_id}", web::delete().to(delete_post)),
    );
}

/// Load the caller and check the permission against their stored role
async fn staff(state: &AppState, auth: &AuthUser, permission: Permission) -> Result<User, ApiError> {
    let user = state.load_active_user(auth.id).await?;
    require_permission(user.role, permission)?;
    Ok(user)
}

/// Coupon codes are upper-case letters, digits, `-` and `_`
fn is_valid_coupon_code(code: &str) -> bool {
    !code.is_empty()
        && code
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '-' || c == '_')
}

/// Explicit slug if valid, else one derived from the title
fn resolve_slug(explicit: Option<&str>, title: &str) -> Result<String, ApiError> {
    match explicit {
        Some(slug) if is_valid_slug(slug) => Ok(slug.to_string()),
        Some(slug) => Err(ApiError::validation(format!(
            "Slug '{}' must be lower-case words joined by hyphens",
            slug
        ))),
        None => {
            let slug = slugify(title);
            if slug.is_empty() {
                Err(ApiError::validation("Title must contain letters or digits"))
            } else {
                Ok(slug)
            }
        }
    }
}

fn clean_tags(tags: Vec<String>) -> Result<Vec<String>, ApiError> {
    let mut cleaned: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim().to_lowercase();
        if !tag.is_empty() && !cleaned.contains(&tag) {
            cleaned.push(tag);
        }
    }
    if cleaned.len() > MAX_TAGS {
        return Err(ApiError::validation(format!("At most {} tags", MAX_TAGS)));
    }
    Ok(cleaned)
}

fn slug_conflict(err: ApiError, slug: &str) -> ApiError {
    match err {
        ApiError::Conflict(_) => ApiError::conflict(format!("Slug '{}' is already taken", slug)),
        other => other,
    }
}

/// POST /api/admin/users/bulk
async fn bulk_moderate(
    state: web::Data<AppState>,
    auth: AuthUser,
    body: web::Json<BulkModerationRequest>,
) -> Result<HttpResponse, ApiError> {
    let moderator = staff(&state, &auth, Permission::ModerateUsers).await?;
    body.validate()?;

    let updated = state
        .db
        .bulk_moderate(&body.user_ids, body.action, body.reason.as_deref())
        .await?;

    state.cache.forget_prefix(CacheKey::DISCOVER_PREFIX).await;
    state.forget_matches(&body.user_ids).await;

    tracing::info!(
        "{} applied {:?} to {} members",
        moderator.id,
        body.action,
        updated
    );
    Ok(HttpResponse::Ok().json(CountResponse { updated }))
}

/// PATCH /api/admin/users/{user_id}/verification
async fn decide_verification(
    state: web::Data<AppState>,
    auth: AuthUser,
    path: web::Path<Uuid>,
    body: web::Json<VerificationDecisionRequest>,
) -> Result<HttpResponse, ApiError> {
    staff(&state, &auth, Permission::ModerateUsers).await?;

    if !matches!(body.status, VerificationStatus::Verified | VerificationStatus::Rejected) {
        return Err(ApiError::validation("Status must be verified or rejected"));
    }

    let user_id = path.into_inner();
    if !state.db.set_verification_status(user_id, body.status).await? {
        return Err(ApiError::not_found("User not found"));
    }

    // Verified badges show up in discover results
    state.cache.forget_prefix(CacheKey::DISCOVER_PREFIX).await;
    Ok(HttpResponse::NoContent().finish())
}

/// PUT /api/admin/users/{user_id}/subscription
async fn set_subscription(
    state: web::Data<AppState>,
    auth: AuthUser,
    path: web::Path<Uuid>,
    body: web::Json<SetSubscriptionRequest>,
) -> Result<HttpResponse, ApiError> {
    staff(&state, &auth, Permission::ManageSubscriptions).await?;

    let user_id = path.into_inner();
    let req = body.into_inner();

    state
        .db
        .get_user(user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let coupon_code = match req.coupon_code.as_deref() {
        Some(raw) => {
            let code = normalize_code(raw);
            let coupon = state
                .db
                .get_coupon(&code)
                .await?
                .ok_or_else(|| ApiError::not_found("Coupon not found"))?;
            evaluate(&coupon, req.tier, Utc::now())
                .map_err(|rejection| ApiError::validation(rejection.to_string()))?;
            Some(code)
        }
        None => None,
    };

    let subscription = state
        .db
        .upsert_subscription(
            user_id,
            req.tier,
            req.status,
            req.current_period_end,
            coupon_code.as_deref(),
        )
        .await?;

    state.cache.forget(&[CacheKey::subscription(user_id)]).await;
    Ok(HttpResponse::Ok().json(subscription))
}

/// GET /api/admin/coupons
async fn list_coupons(state: web::Data<AppState>, auth: AuthUser) -> Result<HttpResponse, ApiError> {
    staff(&state, &auth, Permission::ManageCoupons).await?;
    Ok(HttpResponse::Ok().json(state.db.list_coupons().await?))
}

/// POST /api/admin/coupons
async fn create_coupon(
    state: web::Data<AppState>,
    auth: AuthUser,
    body: web::Json<CreateCouponRequest>,
) -> Result<HttpResponse, ApiError> {
    staff(&state, &auth, Permission::ManageCoupons).await?;
    let req = body.into_inner();
    req.validate()?;

    if req.percent_off.is_some() == req.amount_off_cents.is_some() {
        return Err(ApiError::validation(
            "Give exactly one of percentOff or amountOffCents",
        ));
    }

    let code = normalize_code(&req.code);
    if !is_valid_coupon_code(&code) {
        return Err(ApiError::validation(
            "Coupon code may only contain letters, digits, '-' and '_'",
        ));
    }
    if req.applies_to.contains(&PlanTier::Free) {
        return Err(ApiError::validation("Coupons cannot apply to the free plan"));
    }

    let mut applies_to: Vec<String> = req.applies_to.iter().map(|t| t.as_str().to_string()).collect();
    applies_to.sort();
    applies_to.dedup();

    let draft = Coupon {
        code: code.clone(),
        percent_off: req.percent_off,
        amount_off_cents: req.amount_off_cents,
        applies_to,
        expires_at: req.expires_at,
        max_redemptions: req.max_redemptions,
        times_redeemed: 0,
        active: true,
        created_at: Utc::now(),
    };

    let coupon = state.db.create_coupon(&draft).await.map_err(|e| match ApiError::from(e) {
        ApiError::Conflict(_) => ApiError::conflict(format!("Coupon {} already exists", code)),
        other => other,
    })?;

    tracing::info!("Coupon {} created", coupon.code);
    Ok(HttpResponse::Created().json(coupon))
}

/// Redeemed subscriptions keep their reference, so coupons are retired
/// rather than deleted
///
/// DELETE /api/admin/coupons/{code}
async fn deactivate_coupon(
    state: web::Data<AppState>,
    auth: AuthUser,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    staff(&state, &auth, Permission::ManageCoupons).await?;

    if !state.db.deactivate_coupon(&normalize_code(&path)).await? {
        return Err(ApiError::not_found("Coupon not found"));
    }
    Ok(HttpResponse::NoContent().finish())
}

/// GET /api/admin/reports?status=&limit=&offset=
async fn list_reports(
    state: web::Data<AppState>,
    auth: AuthUser,
    query: web::Query<ReportsQuery>,
) -> Result<HttpResponse, ApiError> {
    staff(&state, &auth, Permission::ReviewReports).await?;

    let limit = query.limit.unwrap_or(DEFAULT_REPORTS_LIMIT).clamp(1, MAX_REPORTS_LIMIT);
    let offset = query.offset.unwrap_or(0);
    let reports = state
        .db
        .list_reports(query.status, limit as i64, offset as i64)
        .await?;

    Ok(HttpResponse::Ok().json(crate::models::Page {
        items: reports,
        limit: limit as u32,
        offset,
    }))
}

/// PATCH /api/admin/reports/{report_id}
async fn review_report(
    state: web::Data<AppState>,
    auth: AuthUser,
    path: web::Path<Uuid>,
    body: web::Json<ReviewReportRequest>,
) -> Result<HttpResponse, ApiError> {
    let reviewer = staff(&state, &auth, Permission::ReviewReports).await?;
    body.validate()?;

    let report = state
        .db
        .review_report(path.into_inner(), body.status, body.resolution_note.as_deref())
        .await?;

    tracing::info!("Report {} moved to {:?} by {}", report.id, report.status, reviewer.id);
    Ok(HttpResponse::Ok().json(report))
}

/// POST /api/admin/kb/articles
async fn create_article(
    state: web::Data<AppState>,
    auth: AuthUser,
    body: web::Json<CreateArticleRequest>,
) -> Result<HttpResponse, ApiError> {
    staff(&state, &auth, Permission::WriteContent).await?;
    let req = body.into_inner();
    req.validate()?;

    let slug = resolve_slug(req.slug.as_deref(), &req.title)?;
    let article = state
        .db
        .create_article(NewArticle {
            slug: slug.clone(),
            title: req.title.trim().to_string(),
            body: req.body,
            category: req.category.trim().to_lowercase(),
            tags: clean_tags(req.tags)?,
            status: req.status.unwrap_or(ContentStatus::Draft),
        })
        .await
        .map_err(|e| slug_conflict(e.into(), &slug))?;

    state.cache.forget_prefix(CacheKey::KB_PREFIX).await;
    Ok(HttpResponse::Created().json(article))
}

/// PATCH /api/admin/kb/articles/{article_id}
async fn update_article(
    state: web::Data<AppState>,
    auth: AuthUser,
    path: web::Path<Uuid>,
    body: web::Json<UpdateArticleRequest>,
) -> Result<HttpResponse, ApiError> {
    staff(&state, &auth, Permission::WriteContent).await?;
    let req = body.into_inner();
    req.validate()?;

    let changes = ArticleChanges {
        title: req.title.map(|t| t.trim().to_string()),
        body: req.body,
        category: req.category.map(|c| c.trim().to_lowercase()),
        tags: req.tags.map(clean_tags).transpose()?,
        status: req.status,
    };

    let article = state.db.update_article(path.into_inner(), changes).await?;
    state.cache.forget_prefix(CacheKey::KB_PREFIX).await;
    Ok(HttpResponse::Ok().json(article))
}

/// DELETE /api/admin/kb/articles/{article_id}
async fn delete_article(
    state: web::Data<AppState>,
    auth: AuthUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    staff(&state, &auth, Permission::WriteContent).await?;

    if !state.db.delete_article(path.into_inner()).await? {
        return Err(ApiError::not_found("Article not found"));
    }
    state.cache.forget_prefix(CacheKey::KB_PREFIX).await;
    Ok(HttpResponse::NoContent().finish())
}

/// POST /api/admin/blog/posts
async fn create_post(
    state: web::Data<AppState>,
    auth: AuthUser,
    body: web::Json<CreatePostRequest>,
) -> Result<HttpResponse, ApiError> {
    let author = staff(&state, &auth, Permission::WriteContent).await?;
    let req = body.into_inner();
    req.validate()?;

    let slug = resolve_slug(req.slug.as_deref(), &req.title)?;
    let post = state
        .db
        .create_post(NewPost {
            slug: slug.clone(),
            title: req.title.trim().to_string(),
            excerpt: req.excerpt.map(|e| e.trim().to_string()).filter(|e| !e.is_empty()),
            body: req.body,
            author_id: author.id,
            tags: clean_tags(req.tags)?,
            status: req.status.unwrap_or(ContentStatus::Draft),
        })
        .await
        .map_err(|e| slug_conflict(e.into(), &slug))?;

    state.cache.forget_prefix(CacheKey::BLOG_PREFIX).await;
    Ok(HttpResponse::Created().json(post))
}

/// PATCH /api/admin/blog/posts/{post_id}
async fn update_post(
    state: web::Data<AppState>,
    auth: AuthUser,
    path: web::Path<Uuid>,
    body: web::Json<UpdatePostRequest>,
) -> Result<HttpResponse, ApiError> {
    staff(&state, &auth, Permission::WriteContent).await?;
    let req = body.into_inner();
    req.validate()?;

    let changes = PostChanges {
        title: req.title.map(|t| t.trim().to_string()),
        excerpt: req.excerpt.map(|e| e.trim().to_string()),
        body: req.body,
        tags: req.tags.map(clean_tags).transpose()?,
        status: req.status,
    };

    let post = state.db.update_post(path.into_inner(), changes).await?;
    state.cache.forget_prefix(CacheKey::BLOG_PREFIX).await;
    Ok(HttpResponse::Ok().json(post))
}

/// DELETE /api/admin/blog/posts/{post_id}
async fn delete_post(
    state: web::Data<AppState>,
    auth: AuthUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    staff(&state, &auth, Permission::WriteContent).await?;

    if !state.db.delete_post(path.into_inner()).await? {
        return Err(ApiError::not_found("Post not found"));
    }
    state.cache.forget_prefix(CacheKey::BLOG_PREFIX).await;
    Ok(HttpResponse::NoContent().finish())
}
