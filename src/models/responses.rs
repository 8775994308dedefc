use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::ages::age_on;
use crate::core::plans::PlanFeatures;
use crate::models::domain::{Match, Message, PlanTier, ScoredCandidate, Subscription, Swipe, User};

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(rename = "statusCode")]
    pub status_code: u16,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub cache: crate::services::CacheStats,
}

/// The caller's own profile
#[derive(Debug, Clone, Serialize)]
pub struct ProfileResponse {
    #[serde(flatten)]
    pub user: User,
    pub age: u8,
    pub plan: PlanTier,
}

/// What one member sees of another
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicProfile {
    pub id: Uuid,
    pub display_name: String,
    pub age: u8,
    pub gender: String,
    pub bio: Option<String>,
    pub interests: Vec<String>,
    pub photo_urls: Vec<String>,
    pub is_verified: bool,
    pub distance_km: Option<f64>,
}

impl PublicProfile {
    pub fn from_user(user: &User, today: NaiveDate, distance_km: Option<f64>) -> Self {
        Self {
            id: user.id,
            display_name: user.display_name.clone(),
            age: age_on(user.birthdate, today),
            gender: user.gender.clone(),
            bio: user.bio.clone(),
            interests: user.interests.clone(),
            photo_urls: user.photo_urls.clone(),
            is_verified: user.is_verified(),
            distance_km,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoverResponse {
    pub candidates: Vec<ScoredCandidate>,
    #[serde(rename = "totalCandidates")]
    pub total_candidates: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SwipeResponse {
    pub swipe: Swipe,
    #[serde(rename = "match")]
    pub matched_with: Option<Match>,
    pub matched: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UndoResponse {
    pub swipe: Swipe,
    pub match_removed: bool,
    pub messages_removed: u64,
}

/// Likes received; profiles are only included for plans that can see them
#[derive(Debug, Clone, Serialize)]
pub struct LikesResponse {
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profiles: Option<Vec<PublicProfile>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchSummary {
    pub match_id: Uuid,
    pub matched_at: DateTime<Utc>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub user: PublicProfile,
    pub last_message: Option<MessagePreview>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePreview {
    pub id: i64,
    pub sender_id: Uuid,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePage {
    pub messages: Vec<Message>,
    pub next_before: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionResponse {
    pub subscription: Option<Subscription>,
    pub effective_tier: PlanTier,
    pub features: PlanFeatures,
}

#[derive(Debug, Clone, Serialize)]
pub struct CountResponse {
    pub updated: u64,
}

/// Generic page wrapper for list endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub limit: u32,
    pub offset: u32,
}
