//! Fixed-window counters for per-account limits (logins, messages, reports).
//!
//! The global per-IP limit is handled by `actix-governor`; these limits are
//! keyed by account or e-mail and live in a moka cache so idle keys age out.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[derive(Debug)]
struct Window {
    started: Instant,
    count: u32,
}

/// Rejection carrying how long the caller should wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limited {
    pub retry_after: Duration,
}

impl Limited {
    /// Whole seconds for the `Retry-After` header, never zero
    pub fn retry_after_secs(&self) -> u64 {
        self.retry_after.as_secs_f64().ceil().max(1.0) as u64
    }
}

pub struct RateLimiter {
    windows: moka::sync::Cache<String, Arc<Mutex<Window>>>,
}

impl RateLimiter {
    /// `max_keys` bounds memory; keys idle for `idle` are dropped
    pub fn new(max_keys: u64, idle: Duration) -> Self {
        Self {
            windows: moka::sync::Cache::builder()
                .max_capacity(max_keys)
                .time_to_idle(idle)
                .build(),
        }
    }

    /// Count one attempt against `key`. Fails once `limit` attempts have been
    /// made within the current `window`.
    pub fn check(&self, key: &str, limit: u32, window: Duration) -> Result<(), Limited> {
        self.check_at(key, limit, window, Instant::now())
    }

    fn check_at(&self, key: &str, limit: u32, window: Duration, now: Instant) -> Result<(), Limited> {
        let slot = self.windows.get_with(key.to_string(), || {
            Arc::new(Mutex::new(Window {
                started: now,
                count: 0,
            }))
        });

        let mut state = match slot.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let elapsed = now.saturating_duration_since(state.started);
        if elapsed >= window {
            state.started = now;
            state.count = 0;
        }

        if state.count >= limit {
            let retry_after = window.saturating_sub(now.saturating_duration_since(state.started));
            tracing::debug!("Rate limit hit for {} ({} per {:?})", key, limit, window);
            return Err(Limited { retry_after });
        }

        state.count += 1;
        Ok(())
    }

    /// Forget a key, e.g. after a successful login
    pub fn reset(&self, key: &str) {
        self.windows.invalidate(key);
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(100_000, Duration::from_secs(60 * 60))
    }
}
