// Route exports
pub mod admin;
pub mod auth;
pub mod content;
pub mod discover;
pub mod health;
pub mod matches;
pub mod safety;
pub mod stream;
pub mod subscriptions;
pub mod swipes;
pub mod users;

use actix_web::web;
use chrono::{NaiveDate, Utc};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::config::Settings;
use crate::core::plans::{effective_tier, PlanFeatures};
use crate::core::{Matcher, SafetyScanner};
use crate::error::ApiError;
use crate::models::{ApprovalStatus, Match, PlanTier, Subscription, User};
use crate::services::{CacheKey, CacheManager, PostgresClient, RateLimiter, TokenService};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<PostgresClient>,
    pub cache: Arc<CacheManager>,
    pub tokens: Arc<TokenService>,
    pub matcher: Matcher,
    pub scanner: Arc<SafetyScanner>,
    pub limiter: Arc<RateLimiter>,
    pub settings: Arc<Settings>,
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.configure(health::configure).service(
        web::scope("/api")
            .configure(auth::configure)
            .configure(users::configure)
            .configure(discover::configure)
            .configure(swipes::configure)
            .configure(matches::configure)
            .configure(safety::configure)
            .configure(subscriptions::configure)
            .configure(content::configure)
            .configure(admin::configure),
    );
}

pub(crate) fn today() -> NaiveDate {
    Utc::now().date_naive()
}

impl AppState {
    /// Load the caller's account. A deleted account is a dead session (401);
    /// a banned one is refused (403).
    pub(crate) async fn load_active_user(&self, user_id: Uuid) -> Result<User, ApiError> {
        let user = self
            .db
            .get_user(user_id)
            .await?
            .ok_or_else(|| ApiError::Unauthorized("Account no longer exists".to_string()))?;

        if user.is_banned {
            return Err(ApiError::forbidden("Account is suspended"));
        }
        Ok(user)
    }

    /// Like [`AppState::load_active_user`], and the profile must have passed review
    pub(crate) async fn load_approved_user(&self, user_id: Uuid) -> Result<User, ApiError> {
        let user = self.load_active_user(user_id).await?;
        if user.approval_status != ApprovalStatus::Approved {
            return Err(ApiError::forbidden("Profile is awaiting review"));
        }
        Ok(user)
    }

    /// Another member as seen by `viewer_id`. Missing, banned, unapproved and
    /// blocked members all look the same: 404.
    pub(crate) async fn visible_member(&self, viewer_id: Uuid, member_id: Uuid) -> Result<User, ApiError> {
        let member = self
            .db
            .get_user(member_id)
            .await?
            .filter(User::is_discoverable)
            .ok_or_else(|| ApiError::not_found("User not found"))?;

        if self.db.is_blocked_either(viewer_id, member_id).await? {
            return Err(ApiError::not_found("User not found"));
        }
        Ok(member)
    }

    /// Subscription row (cached) and the tier it currently grants
    pub(crate) async fn plan_for(&self, user_id: Uuid) -> Result<(Option<Subscription>, PlanTier), ApiError> {
        let db = self.db.clone();
        let subscription: Option<Subscription> = self
            .cache
            .get_or_load(
                &CacheKey::subscription(user_id),
                self.cache.default_ttl(),
                || async move { db.get_subscription(user_id).await },
            )
            .await?;

        let tier = effective_tier(subscription.as_ref(), Utc::now());
        Ok((subscription, tier))
    }

    pub(crate) async fn features_for(&self, user_id: Uuid) -> Result<PlanFeatures, ApiError> {
        let (_, tier) = self.plan_for(user_id).await?;
        Ok(PlanFeatures::for_tier(tier))
    }

    /// A match the caller takes part in. Missing or closed matches are 404,
    /// someone else's match is 403.
    pub(crate) async fn participant_match(&self, match_id: Uuid, user_id: Uuid) -> Result<Match, ApiError> {
        let found = self
            .db
            .get_match(match_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Match not found"))?;

        if !found.involves(user_id) {
            return Err(ApiError::forbidden("Not a participant in this match"));
        }
        if !found.is_active() {
            return Err(ApiError::not_found("Match not found"));
        }
        Ok(found)
    }

    pub(crate) fn discover_ttl(&self) -> Duration {
        Duration::from_secs(self.settings.cache.discover_ttl_secs.unwrap_or(60))
    }

    pub(crate) fn content_ttl(&self) -> Duration {
        Duration::from_secs(self.settings.cache.content_ttl_secs.unwrap_or(300))
    }

    /// Drop cached discover results of the given members
    pub(crate) async fn forget_discover(&self, user_ids: &[Uuid]) {
        for id in user_ids {
            self.cache.forget_prefix(&CacheKey::discover_prefix(*id)).await;
        }
    }

    /// Drop cached match lists of the given members
    pub(crate) async fn forget_matches(&self, user_ids: &[Uuid]) {
        let keys: Vec<String> = user_ids.iter().map(|id| CacheKey::matches(*id)).collect();
        self.cache.forget(&keys).await;
    }
}
