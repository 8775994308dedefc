// Service exports
pub mod cache;
pub mod postgres;
pub mod rate_limit;
pub mod sessions;

pub use cache::{CacheError, CacheKey, CacheManager, CacheStats};
pub use postgres::{PostgresClient, PostgresError};
pub use rate_limit::{Limited, RateLimiter};
pub use sessions::{Claims, SessionError, TokenService};
