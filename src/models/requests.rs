use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::domain::{
    ContentStatus, PlanTier, ReportReason, ReportStatus, SubscriptionStatus, SwipeDirection,
    VerificationStatus,
};

/// Account registration
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
    #[validate(length(min = 1, max = 50))]
    pub display_name: String,
    pub birthdate: NaiveDate,
    #[validate(length(min = 1, max = 30))]
    pub gender: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = 128))]
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LocationUpdate {
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PreferencesUpdate {
    #[validate(length(max = 5))]
    pub genders: Option<Vec<String>>,
    #[validate(range(min = 18, max = 99))]
    pub min_age: Option<u8>,
    #[validate(range(min = 18, max = 99))]
    pub max_age: Option<u8>,
    #[validate(range(min = 1, max = 500))]
    pub max_distance_km: Option<u16>,
}

/// Partial profile update; absent fields are left untouched
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, max = 50))]
    pub display_name: Option<String>,
    #[validate(length(max = 500))]
    pub bio: Option<String>,
    #[validate(length(min = 1, max = 30))]
    pub gender: Option<String>,
    #[validate(length(max = 10))]
    pub interests: Option<Vec<String>>,
    pub photo_urls: Option<Vec<String>>,
    #[validate(nested)]
    pub location: Option<LocationUpdate>,
    #[validate(nested)]
    pub preferences: Option<PreferencesUpdate>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct VerificationRequest {
    #[validate(url)]
    pub selfie_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiscoverQuery {
    pub limit: Option<u16>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwipeRequest {
    pub target_id: Uuid,
    pub direction: SwipeDirection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessagesQuery {
    pub before: Option<i64>,
    pub limit: Option<u16>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SendMessageRequest {
    pub body: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StreamQuery {
    pub after: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockRequest {
    pub user_id: Uuid,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ReportRequest {
    pub user_id: Uuid,
    pub reason: ReportReason,
    #[validate(length(max = 1000))]
    pub details: Option<String>,
    pub message_id: Option<i64>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CouponQuoteRequest {
    #[validate(length(min = 1, max = 32))]
    pub code: String,
    pub tier: PlanTier,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModerationAction {
    Ban,
    Unban,
    Approve,
    Reject,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct BulkModerationRequest {
    #[validate(length(min = 1, max = 500))]
    pub user_ids: Vec<Uuid>,
    pub action: ModerationAction,
    #[validate(length(max = 500))]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerificationDecisionRequest {
    pub status: VerificationStatus,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetSubscriptionRequest {
    pub tier: PlanTier,
    pub status: SubscriptionStatus,
    pub current_period_end: Option<DateTime<Utc>>,
    pub coupon_code: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateCouponRequest {
    #[validate(length(min = 3, max = 32))]
    pub code: String,
    #[validate(range(min = 1, max = 100))]
    pub percent_off: Option<i16>,
    #[validate(range(min = 1))]
    pub amount_off_cents: Option<i32>,
    #[serde(default)]
    pub applies_to: Vec<PlanTier>,
    pub expires_at: Option<DateTime<Utc>>,
    #[validate(range(min = 1))]
    pub max_redemptions: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportsQuery {
    pub status: Option<ReportStatus>,
    pub limit: Option<u16>,
    pub offset: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ReviewReportRequest {
    pub status: ReportStatus,
    #[validate(length(max = 1000))]
    pub resolution_note: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KbListQuery {
    pub q: Option<String>,
    pub category: Option<String>,
    pub limit: Option<u16>,
    pub offset: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct KbFeedbackRequest {
    pub helpful: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogListQuery {
    pub page: Option<u32>,
    pub per_page: Option<u16>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateArticleRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(min = 1))]
    pub body: String,
    #[validate(length(min = 1, max = 50))]
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[validate(length(min = 1, max = 120))]
    pub slug: Option<String>,
    pub status: Option<ContentStatus>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateArticleRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(length(min = 1))]
    pub body: Option<String>,
    #[validate(length(min = 1, max = 50))]
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
    pub status: Option<ContentStatus>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreatePostRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(max = 500))]
    pub excerpt: Option<String>,
    #[validate(length(min = 1))]
    pub body: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[validate(length(min = 1, max = 120))]
    pub slug: Option<String>,
    pub status: Option<ContentStatus>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdatePostRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(length(max = 500))]
    pub excerpt: Option<String>,
    #[validate(length(min = 1))]
    pub body: Option<String>,
    pub tags: Option<Vec<String>>,
    pub status: Option<ContentStatus>,
}
