// Model exports
pub mod domain;
pub mod requests;
pub mod responses;

pub use domain::{
    ApprovalStatus, BlogPost, Block, BoundingBox, Candidate, CandidateQuery, ContentStatus,
    Coupon, DiscoveryPreferences, KbArticle, Match, Message, PlanTier, Report, ReportReason,
    ReportStatus, Role, ScoredCandidate, ScoringWeights, Subscription, SubscriptionStatus, Swipe,
    SwipeDirection, User, VerificationStatus,
};
pub use requests::*;
pub use responses::*;
