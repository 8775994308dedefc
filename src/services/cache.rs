use moka::Expiry;
use redis::aio::ConnectionManager;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur with cache operations
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Redis error: {0}")]
    RedisError(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Cache miss: {0}")]
    CacheMiss(String),
}

/// L1 entry: serialized value plus its own time-to-live
#[derive(Clone)]
struct Entry {
    bytes: Arc<[u8]>,
    ttl: Duration,
}

struct PerEntryTtl;

impl Expiry<String, Entry> for PerEntryTtl {
    fn expire_after_create(&self, _key: &String, value: &Entry, _created_at: Instant) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &Entry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// Two-tier read-through cache.
///
/// L1 is an in-process moka cache where each entry carries its own TTL.
/// L2 is Redis, shared across instances, and optional: without it (or when it
/// cannot be reached at startup) the manager runs L1-only.
pub struct CacheManager {
    redis: Option<Arc<tokio::sync::Mutex<ConnectionManager>>>,
    l1_cache: moka::future::Cache<String, Entry>,
    default_ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CacheManager {
    /// Create a cache manager, connecting to Redis when a URL is given
    pub async fn new(redis_url: Option<&str>, l1_size: u64, ttl_secs: u64) -> Self {
        let redis = match redis_url {
            Some(url) => match Self::connect(url).await {
                Ok(conn) => {
                    tracing::info!("Connected to Redis cache");
                    Some(Arc::new(tokio::sync::Mutex::new(conn)))
                }
                Err(e) => {
                    tracing::warn!("Redis unavailable, using in-process cache only: {}", e);
                    None
                }
            },
            None => None,
        };

        Self::build(redis, l1_size, ttl_secs)
    }

    /// In-process cache only
    pub fn in_memory(l1_size: u64, ttl_secs: u64) -> Self {
        Self::build(None, l1_size, ttl_secs)
    }

    async fn connect(url: &str) -> Result<ConnectionManager, CacheError> {
        let client = redis::Client::open(url)?;
        Ok(ConnectionManager::new(client).await?)
    }

    fn build(
        redis: Option<Arc<tokio::sync::Mutex<ConnectionManager>>>,
        l1_size: u64,
        ttl_secs: u64,
    ) -> Self {
        let l1_cache = moka::future::Cache::builder()
            .max_capacity(l1_size)
            .expire_after(PerEntryTtl)
            .support_invalidation_closures()
            .build();

        Self {
            redis,
            l1_cache,
            default_ttl: Duration::from_secs(ttl_secs),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn has_redis(&self) -> bool {
        self.redis.is_some()
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Get a value from cache (L1 first, then L2)
    pub async fn get<T>(&self, key: &str) -> Result<T, CacheError>
    where
        T: DeserializeOwned,
    {
        if let Some(entry) = self.l1_cache.get(key).await {
            tracing::trace!("L1 cache hit: {}", key);
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(serde_json::from_slice(&entry.bytes)?);
        }

        if let Some(redis) = &self.redis {
            let mut conn = redis.lock().await;
            let value: Option<String> = redis::cmd("GET").arg(key).query_async(&mut *conn).await?;
            let remaining: i64 = if value.is_some() {
                redis::cmd("TTL").arg(key).query_async(&mut *conn).await?
            } else {
                -2
            };
            drop(conn);

            if let Some(json) = value {
                tracing::trace!("L2 cache hit: {}", key);
                self.hits.fetch_add(1, Ordering::Relaxed);

                // Keep the L1 copy no longer than Redis will
                let ttl = if remaining > 0 {
                    Duration::from_secs(remaining as u64).min(self.default_ttl)
                } else {
                    self.default_ttl
                };
                let parsed = serde_json::from_str(&json)?;
                self.insert_l1(key, json.into_bytes(), ttl).await;
                return Ok(parsed);
            }
        }

        tracing::trace!("Cache miss: {}", key);
        self.misses.fetch_add(1, Ordering::Relaxed);
        Err(CacheError::CacheMiss(key.to_string()))
    }

    /// Set a value with the default TTL
    pub async fn set<T>(&self, key: &str, value: &T) -> Result<(), CacheError>
    where
        T: Serialize,
    {
        self.set_with_ttl(key, value, self.default_ttl).await
    }

    /// Set a value in both tiers with an explicit TTL
    pub async fn set_with_ttl<T>(&self, key: &str, value: &T, ttl: Duration) -> Result<(), CacheError>
    where
        T: Serialize,
    {
        let json = serde_json::to_string(value)?;
        let ttl_secs = ttl.as_secs().max(1);

        if let Some(redis) = &self.redis {
            let mut conn = redis.lock().await;
            let _: () = redis::cmd("SETEX")
                .arg(key)
                .arg(ttl_secs)
                .arg(&json)
                .query_async(&mut *conn)
                .await?;
        }

        self.insert_l1(key, json.into_bytes(), ttl).await;
        tracing::trace!("Cache set: {} ({}s)", key, ttl_secs);
        Ok(())
    }

    async fn insert_l1(&self, key: &str, bytes: Vec<u8>, ttl: Duration) {
        let entry = Entry {
            bytes: Arc::from(bytes),
            ttl,
        };
        self.l1_cache.insert(key.to_string(), entry).await;
    }

    /// Delete a value from both cache tiers
    pub async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.l1_cache.invalidate(key).await;
        if let Some(redis) = &self.redis {
            let mut conn = redis.lock().await;
            let _: () = redis::cmd("DEL").arg(key).query_async(&mut *conn).await?;
        }
        Ok(())
    }

    /// Invalidate every entry whose key starts with `prefix`
    pub async fn invalidate_prefix(&self, prefix: &str) -> Result<(), CacheError> {
        let owned = prefix.to_string();
        if let Err(e) = self
            .l1_cache
            .invalidate_entries_if(move |key, _| key.starts_with(&owned))
        {
            tracing::warn!("L1 prefix invalidation unavailable, clearing: {}", e);
            self.l1_cache.invalidate_all();
        }

        if let Some(redis) = &self.redis {
            let pattern = format!("{}*", prefix);
            let mut conn = redis.lock().await;
            let mut cursor: u64 = 0;
            loop {
                let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                    .arg(cursor)
                    .arg("MATCH")
                    .arg(&pattern)
                    .arg("COUNT")
                    .arg(200)
                    .query_async(&mut *conn)
                    .await?;

                if !keys.is_empty() {
                    let _: () = redis::cmd("DEL").arg(keys).query_async(&mut *conn).await?;
                }
                if next == 0 {
                    break;
                }
                cursor = next;
            }
        }

        tracing::debug!("Invalidated cache prefix: {}", prefix);
        Ok(())
    }

    /// Read-through helper: return the cached value or run `load`, cache its
    /// result and return it. Cache failures are logged and never surface.
    pub async fn get_or_load<T, E, F, Fut>(&self, key: &str, ttl: Duration, load: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        match self.get::<T>(key).await {
            Ok(value) => return Ok(value),
            Err(CacheError::CacheMiss(_)) => {}
            Err(e) => tracing::warn!("Cache read failed for {}: {}", key, e),
        }

        let value = load().await?;
        if let Err(e) = self.set_with_ttl(key, &value, ttl).await {
            tracing::warn!("Cache write failed for {}: {}", key, e);
        }
        Ok(value)
    }

    /// Delete keys, logging instead of failing
    pub async fn forget(&self, keys: &[String]) {
        for key in keys {
            if let Err(e) = self.delete(key).await {
                tracing::warn!("Cache delete failed for {}: {}", key, e);
            }
        }
    }

    /// Invalidate a prefix, logging instead of failing
    pub async fn forget_prefix(&self, prefix: &str) {
        if let Err(e) = self.invalidate_prefix(prefix).await {
            tracing::warn!("Cache invalidation failed for {}: {}", prefix, e);
        }
    }

    /// Ping Redis; `true` when running L1-only
    pub async fn health_check(&self) -> bool {
        let Some(redis) = &self.redis else {
            return true;
        };
        let mut conn = redis.lock().await;
        let pong: Result<String, _> = redis::cmd("PING").query_async(&mut *conn).await;
        pong.is_ok()
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;

        CacheStats {
            l1_size: self.l1_cache.entry_count(),
            hit_count: hits,
            miss_count: misses,
            hit_rate: if total == 0 { 0.0 } else { hits as f64 / total as f64 },
            redis_enabled: self.redis.is_some(),
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub l1_size: u64,
    pub hit_count: u64,
    pub miss_count: u64,
    pub hit_rate: f64,
    pub redis_enabled: bool,
}

/// Cache key builder
pub struct CacheKey;

impl CacheKey {
    pub const DISCOVER_PREFIX: &'static str = "discover:";
    pub const KB_PREFIX: &'static str = "kb:";
    pub const BLOG_PREFIX: &'static str = "blog:";

    /// Ranked discover results for a viewer
    pub fn discover(user_id: Uuid, limit: u16) -> String {
        format!("discover:{}:{}", user_id, limit)
    }

    /// Prefix covering every discover entry of one viewer
    pub fn discover_prefix(user_id: Uuid) -> String {
        format!("discover:{}:", user_id)
    }

    pub fn matches(user_id: Uuid) -> String {
        format!("matches:{}", user_id)
    }

    pub fn subscription(user_id: Uuid) -> String {
        format!("subscription:{}", user_id)
    }

    pub fn kb_list(query: Option<&str>, category: Option<&str>, limit: u16, offset: u32) -> String {
        format!(
            "kb:list:{}:{}:{}:{}",
            query.unwrap_or("").trim().to_lowercase(),
            category.unwrap_or("").to_lowercase(),
            limit,
            offset
        )
    }

    pub fn blog_list(page: u32, per_page: u16) -> String {
        format!("blog:list:{}:{}", page, per_page)
    }

    pub fn blog_post(slug: &str) -> String {
        format!("blog:post:{}", slug)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore = "Requires Redis"]
    async fn test_cache_set_get() {
        let cache = CacheManager::new(Some("redis://127.0.0.1:6379"), 1000, 60).await;
        assert!(cache.has_redis());

        let key = "test_key";
        let value = "test_value";

        cache.set(key, &value).await.unwrap();
        let result: String = cache.get(key).await.unwrap();
        assert_eq!(result, value);

        cache.delete(key).await.unwrap();
        assert!(cache.get::<String>(key).await.is_err());
    }

    #[tokio::test]
    async fn test_in_memory_set_get_delete() {
        let cache = CacheManager::in_memory(100, 60);
        assert!(!cache.has_redis());

        cache.set("greeting", &vec![1, 2, 3]).await.unwrap();
        let value: Vec<i32> = cache.get("greeting").await.unwrap();
        assert_eq!(value, vec![1, 2, 3]);

        cache.delete("greeting").await.unwrap();
        assert!(matches!(
            cache.get::<Vec<i32>>("greeting").await,
            Err(CacheError::CacheMiss(_))
        ));
    }

    #[tokio::test]
    async fn test_invalidate_prefix_only_touches_prefix() {
        let cache = CacheManager::in_memory(100, 60);
        cache.set("kb:list:a", &1).await.unwrap();
        cache.set("kb:list:b", &2).await.unwrap();
        cache.set("blog:list:1:10", &3).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;

        cache.invalidate_prefix(CacheKey::KB_PREFIX).await.unwrap();

        assert!(cache.get::<i32>("kb:list:a").await.is_err());
        assert!(cache.get::<i32>("kb:list:b").await.is_err());
        assert_eq!(cache.get::<i32>("blog:list:1:10").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_get_or_load_caches_result() {
        let cache = CacheManager::in_memory(100, 60);
        let calls = AtomicU64::new(0);

        for _ in 0..3 {
            let value: Result<String, CacheError> = cache
                .get_or_load("loaded", Duration::from_secs(30), || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok("fresh".to_string())
                })
                .await;
            assert_eq!(value.unwrap(), "fresh");
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let stats = cache.stats();
        assert_eq!(stats.hit_count, 2);
        assert_eq!(stats.miss_count, 1);
    }

    #[test]
    fn test_cache_key_builder() {
        let id = Uuid::nil();
        assert_eq!(
            CacheKey::discover(id, 20),
            "discover:00000000-0000-0000-0000-000000000000:20"
        );
        assert!(CacheKey::discover(id, 20).starts_with(&CacheKey::discover_prefix(id)));
        assert_eq!(CacheKey::blog_list(2, 10), "blog:list:2:10");
        assert!(CacheKey::kb_list(Some(" Safety "), None, 20, 0).starts_with(CacheKey::KB_PREFIX));
        assert_eq!(CacheKey::kb_list(Some(" Safety "), None, 20, 0), "kb:list:safety::20:0");
    }
}
