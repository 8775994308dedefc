// Domain rules with no I/O
pub mod ages;
pub mod coupons;
pub mod distance;
pub mod filters;
pub mod matcher;
pub mod permissions;
pub mod plans;
pub mod safety;
pub mod scoring;
pub mod slug;
pub mod sse;
pub mod swipes;

pub use distance::{calculate_bounding_box, haversine_distance, is_within_bounding_box};
pub use matcher::{Matcher, RankResult};
pub use permissions::Permission;
pub use plans::{effective_tier, PlanFeatures};
pub use safety::{SafetyScanner, Verdict};
