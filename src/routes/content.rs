use actix_web::{web, HttpResponse};

use super::AppState;
use crate::error::ApiError;
use crate::models::{BlogListQuery, BlogPost, KbArticle, KbFeedbackRequest, KbListQuery, Page};
use crate::services::CacheKey;

const DEFAULT_KB_LIMIT: u16 = 20;
const MAX_KB_LIMIT: u16 = 100;
const DEFAULT_PER_PAGE: u16 = 10;
const MAX_PER_PAGE: u16 = 50;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/kb/articles", web::get().to(list_articles))
        .route("/kb/articles/{slug}", web::get().to(get_article))
        .route("/kb/articles/{slug}/feedback", web::post().to(article_feedback))
        .route("/blog/posts", web::get().to(list_posts))
        .route("/blog/posts/{slug}", web::get().to(get_post));
}

/// GET /api/kb/articles?q=&category=&limit=&offset=
async fn list_articles(
    state: web::Data<AppState>,
    query: web::Query<KbListQuery>,
) -> Result<HttpResponse, ApiError> {
    let query = query.into_inner();
    let limit = query.limit.unwrap_or(DEFAULT_KB_LIMIT).clamp(1, MAX_KB_LIMIT);
    let offset = query.offset.unwrap_or(0);
    let search = query.q.filter(|q| !q.trim().is_empty());
    let category = query.category.filter(|c| !c.trim().is_empty());

    let key = CacheKey::kb_list(search.as_deref(), category.as_deref(), limit, offset);
    let db = state.db.clone();
    let items: Vec<KbArticle> = state
        .cache
        .get_or_load(&key, state.content_ttl(), || async move {
            db.list_articles(search.as_deref(), category.as_deref(), limit as i64, offset as i64)
                .await
        })
        .await?;

    Ok(HttpResponse::Ok().json(Page {
        items,
        limit: limit as u32,
        offset,
    }))
}

/// Each read counts a view, so this one bypasses the cache
///
/// GET /api/kb/articles/{slug}
async fn get_article(state: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse, ApiError> {
    let article = state
        .db
        .get_published_article(&path)
        .await?
        .ok_or_else(|| ApiError::not_found("Article not found"))?;

    Ok(HttpResponse::Ok().json(article))
}

/// POST /api/kb/articles/{slug}/feedback
async fn article_feedback(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<KbFeedbackRequest>,
) -> Result<HttpResponse, ApiError> {
    if !state.db.record_article_feedback(&path, body.helpful).await? {
        return Err(ApiError::not_found("Article not found"));
    }
    Ok(HttpResponse::NoContent().finish())
}

/// GET /api/blog/posts?page=&perPage=
async fn list_posts(
    state: web::Data<AppState>,
    query: web::Query<BlogListQuery>,
) -> Result<HttpResponse, ApiError> {
    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE);
    let offset = (page - 1).saturating_mul(per_page as u32);

    let db = state.db.clone();
    let items: Vec<BlogPost> = state
        .cache
        .get_or_load(
            &CacheKey::blog_list(page, per_page),
            state.content_ttl(),
            || async move { db.list_posts(per_page as i64, offset as i64).await },
        )
        .await?;

    Ok(HttpResponse::Ok().json(Page {
        items,
        limit: per_page as u32,
        offset,
    }))
}

/// GET /api/blog/posts/{slug}
async fn get_post(state: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse, ApiError> {
    let slug = path.into_inner();
    let db = state.db.clone();
    let lookup = slug.clone();
    let post: Option<BlogPost> = state
        .cache
        .get_or_load(&CacheKey::blog_post(&slug), state.content_ttl(), || async move {
            db.get_published_post(&lookup).await
        })
        .await?;

    post.map(|post| HttpResponse::Ok().json(post))
        .ok_or_else(|| ApiError::not_found("Post not found"))
}
