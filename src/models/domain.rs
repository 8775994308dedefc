use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Account role, used for permission lookups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Moderator,
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "approval_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "verification_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum VerificationStatus {
    Unverified,
    Pending,
    Verified,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "swipe_direction", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SwipeDirection {
    Like,
    Pass,
    Superlike,
}

impl SwipeDirection {
    /// Likes and superlikes can produce a match, passes never do
    pub fn is_positive(self) -> bool {
        matches!(self, SwipeDirection::Like | SwipeDirection::Superlike)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "plan_tier", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PlanTier {
    Free,
    Plus,
    Premium,
}

impl PlanTier {
    pub fn as_str(self) -> &'static str {
        match self {
            PlanTier::Free => "free",
            PlanTier::Plus => "plus",
            PlanTier::Premium => "premium",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "free" => Some(PlanTier::Free),
            "plus" => Some(PlanTier::Plus),
            "premium" => Some(PlanTier::Premium),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "subscription_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Trialing,
    PastDue,
    Canceled,
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "report_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Open,
    Reviewing,
    Resolved,
    Dismissed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "report_reason", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ReportReason {
    Spam,
    Harassment,
    InappropriateContent,
    FakeProfile,
    Underage,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "content_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ContentStatus {
    Draft,
    Published,
    Archived,
}

/// Stored account row
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub display_name: String,
    pub birthdate: NaiveDate,
    pub gender: String,
    pub bio: Option<String>,
    pub interests: Vec<String>,
    pub photo_urls: Vec<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub role: Role,
    pub approval_status: ApprovalStatus,
    pub verification_status: VerificationStatus,
    pub is_banned: bool,
    pub banned_reason: Option<String>,
    pub pref_genders: Vec<String>,
    pub pref_min_age: i16,
    pub pref_max_age: i16,
    pub pref_max_distance_km: i32,
    pub last_active_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_verified(&self) -> bool {
        self.verification_status == VerificationStatus::Verified
    }

    /// Visible to other members in discover and profile lookups
    pub fn is_discoverable(&self) -> bool {
        !self.is_banned && self.approval_status == ApprovalStatus::Approved
    }

    pub fn location(&self) -> Option<(f64, f64)> {
        self.latitude.zip(self.longitude)
    }
}

/// Viewer-side discovery preferences, assembled from the user row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryPreferences {
    #[serde(rename = "userId")]
    pub user_id: Uuid,
    pub gender: String,
    pub age: u8,
    #[serde(rename = "preferredGenders")]
    pub preferred_genders: Vec<String>,
    #[serde(rename = "minAge")]
    pub min_age: u8,
    #[serde(rename = "maxAge")]
    pub max_age: u8,
    #[serde(rename = "maxDistanceKm")]
    pub max_distance_km: u16,
    pub interests: Vec<String>,
    pub location: Option<(f64, f64)>,
}

/// A potential match loaded by the discover query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub user_id: Uuid,
    pub display_name: String,
    pub age: u8,
    pub gender: String,
    pub bio: Option<String>,
    pub interests: Vec<String>,
    pub photo_urls: Vec<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub is_verified: bool,
    pub last_active_at: DateTime<Utc>,
    pub pref_genders: Vec<String>,
    pub pref_min_age: u8,
    pub pref_max_age: u8,
}

/// Ranked discover result
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredCandidate {
    pub user_id: Uuid,
    pub display_name: String,
    pub age: u8,
    pub gender: String,
    pub bio: Option<String>,
    pub photo_urls: Vec<String>,
    pub distance_km: Option<f64>,
    pub match_score: f64,
    pub shared_interests: Vec<String>,
    pub is_verified: bool,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Swipe {
    pub id: Uuid,
    pub swiper_id: Uuid,
    pub target_id: Uuid,
    pub direction: SwipeDirection,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    pub id: Uuid,
    pub user_a: Uuid,
    pub user_b: Uuid,
    pub created_at: DateTime<Utc>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub unmatched_at: Option<DateTime<Utc>>,
    pub unmatched_by: Option<Uuid>,
}

impl Match {
    pub fn involves(&self, user_id: Uuid) -> bool {
        self.user_a == user_id || self.user_b == user_id
    }

    pub fn is_active(&self) -> bool {
        self.unmatched_at.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: i64,
    pub match_id: Uuid,
    pub sender_id: Uuid,
    pub body: String,
    pub flagged: bool,
    pub created_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub blocker_id: Uuid,
    pub blocked_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub id: Uuid,
    pub reporter_id: Uuid,
    pub reported_id: Uuid,
    pub reason: ReportReason,
    pub details: Option<String>,
    pub message_id: Option<i64>,
    pub status: ReportStatus,
    pub resolution_note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub user_id: Uuid,
    pub tier: PlanTier,
    pub status: SubscriptionStatus,
    pub current_period_end: Option<DateTime<Utc>>,
    pub cancel_at_period_end: bool,
    pub coupon_code: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Coupon {
    pub code: String,
    pub percent_off: Option<i16>,
    pub amount_off_cents: Option<i32>,
    pub applies_to: Vec<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub max_redemptions: Option<i32>,
    pub times_redeemed: i32,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct KbArticle {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
    pub body: String,
    pub category: String,
    pub tags: Vec<String>,
    pub status: ContentStatus,
    pub view_count: i64,
    pub helpful_count: i64,
    pub not_helpful_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct BlogPost {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
    pub excerpt: Option<String>,
    pub body: String,
    pub author_id: Option<Uuid>,
    pub tags: Vec<String>,
    pub status: ContentStatus,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Geospatial bounding box
#[derive(Debug, Clone, Copy)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

/// Constraints pushed into the discover SQL query
#[derive(Debug, Clone)]
pub struct CandidateQuery {
    pub viewer_id: Uuid,
    pub bounding_box: Option<BoundingBox>,
    pub preferred_genders: Vec<String>,
    pub min_age: u8,
    pub max_age: u8,
    pub limit: usize,
}

/// Scoring weights
#[derive(Debug, Clone, Copy)]
pub struct ScoringWeights {
    pub distance: f64,
    pub age: f64,
    pub interests: f64,
    pub verified: f64,
    pub activity: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            distance: 0.40,
            age: 0.20,
            interests: 0.25,
            verified: 0.05,
            activity: 0.10,
        }
    }
}
