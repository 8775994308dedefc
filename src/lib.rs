//! Kindred - HTTP API for the Kindred dating platform
//!
//! Discovery ranking, swipes and matches, chat with a server-sent events
//! relay, subscriptions with coupons, safety tooling and the help center.

pub mod config;
pub mod core;
pub mod error;
pub mod extractors;
pub mod models;
pub mod routes;
pub mod services;

use actix_web::web;
use std::sync::Arc;
use thiserror::Error;

use crate::config::Settings;
use crate::core::{Matcher, SafetyScanner};
use crate::services::{CacheManager, PostgresClient, PostgresError, RateLimiter, TokenService};

// Re-export commonly used types
pub use core::distance::{calculate_bounding_box, haversine_distance};
pub use error::ApiError;
pub use routes::AppState;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Configuration error: {0}")]
    Config(#[from] ::config::ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] PostgresError),
}

/// Connect every backing service and assemble the shared handler state
pub async fn build_state(settings: Settings) -> Result<AppState, StartupError> {
    let db = Arc::new(PostgresClient::from_settings(&settings.database).await?);
    tracing::info!(
        "PostgreSQL client initialized (max: {} connections)",
        settings.database.max_connections.unwrap_or(10)
    );

    let ttl = settings.cache.ttl_secs.unwrap_or(300);
    let l1_size = settings.cache.l1_cache_size.unwrap_or(10_000);
    let cache = Arc::new(CacheManager::new(settings.cache.redis_url.as_deref(), l1_size, ttl).await);
    tracing::info!(
        "Cache manager initialized (L1: {} entries, TTL: {}s, redis: {})",
        l1_size,
        ttl,
        cache.has_redis()
    );

    let weights = (&settings.scoring.weights).into();
    let matcher = Matcher::new(weights);
    tracing::info!("Matcher initialized with weights: {:?}", weights);

    Ok(AppState {
        db,
        cache,
        tokens: Arc::new(TokenService::new(&settings.session, settings.security.bcrypt_cost)),
        matcher,
        scanner: Arc::new(SafetyScanner::new(&settings.security.extra_blocked_terms)),
        limiter: Arc::new(RateLimiter::default()),
        settings: Arc::new(settings),
    })
}

/// Register extractor configs, shared state and every route on an app
pub fn configure_app(state: AppState) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg: &mut web::ServiceConfig| {
        cfg.app_data(web::Data::from(state.tokens.clone()))
            .app_data(web::Data::new(state))
            .app_data(web::JsonConfig::default().error_handler(error::handle_json_payload_error))
            .app_data(web::QueryConfig::default().error_handler(error::handle_query_payload_error))
            .app_data(web::PathConfig::default().error_handler(error::handle_path_error))
            .configure(routes::configure_routes);
    }
}
