use actix_web::{web, HttpResponse, Responder};

use super::AppState;
use crate::models::HealthResponse;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check));
}

/// Health check endpoint. Always 200; a failing dependency reports `degraded`.
async fn health_check(state: web::Data<AppState>) -> impl Responder {
    let pg_healthy = match state.db.health_check().await {
        Ok(healthy) => healthy,
        Err(e) => {
            tracing::warn!("PostgreSQL health check failed: {}", e);
            false
        }
    };
    let cache_healthy = state.cache.health_check().await;

    HttpResponse::Ok().json(HealthResponse {
        status: status_label(pg_healthy, cache_healthy).to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
        cache: state.cache.stats(),
    })
}

fn status_label(database: bool, cache: bool) -> &'static str {
    if database && cache {
        "healthy"
    } else {
        "degraded"
    }
}
