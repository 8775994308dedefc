use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;

use crate::models::ScoringWeights;

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    #[serde(default)]
    pub cache: CacheSettings,
    pub session: SessionSettings,
    #[serde(default)]
    pub security: SecuritySettings,
    #[serde(default)]
    pub rate_limit: RateLimitSettings,
    #[serde(default)]
    pub chat: ChatSettings,
    #[serde(default)]
    pub discover: DiscoverSettings,
    #[serde(default)]
    pub moderation: ModerationSettings,
    #[serde(default)]
    pub scoring: ScoringSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub workers: Option<usize>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            workers: None,
        }
    }
}

fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: Option<u32>,
    pub min_connections: Option<u32>,
    pub acquire_timeout_secs: Option<u64>,
    pub idle_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CacheSettings {
    /// Redis is optional; without it only the in-process tier is used
    pub redis_url: Option<String>,
    pub ttl_secs: Option<u64>,
    pub l1_cache_size: Option<u64>,
    pub discover_ttl_secs: Option<u64>,
    pub content_ttl_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionSettings {
    pub jwt_secret: String,
    #[serde(default = "default_session_ttl_hours")]
    pub ttl_hours: i64,
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    #[serde(default = "default_true")]
    pub secure_cookie: bool,
}

fn default_session_ttl_hours() -> i64 { 24 * 14 }
fn default_cookie_name() -> String { "kindred_session".to_string() }
fn default_true() -> bool { true }

#[derive(Debug, Clone, Deserialize)]
pub struct SecuritySettings {
    #[serde(default = "default_bcrypt_cost")]
    pub bcrypt_cost: u32,
    #[serde(default)]
    pub extra_blocked_terms: Vec<String>,
}

impl Default for SecuritySettings {
    fn default() -> Self {
        Self {
            bcrypt_cost: default_bcrypt_cost(),
            extra_blocked_terms: Vec::new(),
        }
    }
}

fn default_bcrypt_cost() -> u32 { 12 }

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitSettings {
    #[serde(default = "default_per_second")]
    pub per_second: u64,
    #[serde(default = "default_burst_size")]
    pub burst_size: u32,
    #[serde(default = "default_messages_per_minute")]
    pub messages_per_minute: u32,
    #[serde(default = "default_login_attempts")]
    pub login_attempts: u32,
    #[serde(default = "default_login_window_secs")]
    pub login_window_secs: u64,
    #[serde(default = "default_reports_per_hour")]
    pub reports_per_hour: u32,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            per_second: default_per_second(),
            burst_size: default_burst_size(),
            messages_per_minute: default_messages_per_minute(),
            login_attempts: default_login_attempts(),
            login_window_secs: default_login_window_secs(),
            reports_per_hour: default_reports_per_hour(),
        }
    }
}

fn default_per_second() -> u64 { 20 }
fn default_burst_size() -> u32 { 60 }
fn default_messages_per_minute() -> u32 { 30 }
fn default_login_attempts() -> u32 { 10 }
fn default_login_window_secs() -> u64 { 15 * 60 }
fn default_reports_per_hour() -> u32 { 10 }

#[derive(Debug, Clone, Deserialize)]
pub struct ChatSettings {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,
    #[serde(default = "default_batch_size")]
    pub batch_size: u16,
    #[serde(default = "default_max_message_length")]
    pub max_message_length: usize,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            heartbeat_secs: default_heartbeat_secs(),
            batch_size: default_batch_size(),
            max_message_length: default_max_message_length(),
        }
    }
}

fn default_poll_interval_ms() -> u64 { 500 }
fn default_heartbeat_secs() -> u64 { 15 }
fn default_batch_size() -> u16 { 100 }
fn default_max_message_length() -> usize { 2000 }

#[derive(Debug, Clone, Deserialize)]
pub struct DiscoverSettings {
    #[serde(default = "default_discover_limit")]
    pub default_limit: u16,
    #[serde(default = "default_discover_max_limit")]
    pub max_limit: u16,
    #[serde(default = "default_candidate_factor")]
    pub candidate_factor: usize,
}

impl Default for DiscoverSettings {
    fn default() -> Self {
        Self {
            default_limit: default_discover_limit(),
            max_limit: default_discover_max_limit(),
            candidate_factor: default_candidate_factor(),
        }
    }
}

fn default_discover_limit() -> u16 { 20 }
fn default_discover_max_limit() -> u16 { 100 }
fn default_candidate_factor() -> usize { 5 }

#[derive(Debug, Clone, Deserialize)]
pub struct ModerationSettings {
    #[serde(default = "default_true")]
    pub auto_approve: bool,
    #[serde(default = "default_escalation_threshold")]
    pub report_escalation_threshold: u32,
}

impl Default for ModerationSettings {
    fn default() -> Self {
        Self {
            auto_approve: true,
            report_escalation_threshold: default_escalation_threshold(),
        }
    }
}

fn default_escalation_threshold() -> u32 { 3 }

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScoringSettings {
    #[serde(default)]
    pub weights: WeightsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WeightsConfig {
    #[serde(default = "default_distance_weight")]
    pub distance: f64,
    #[serde(default = "default_age_weight")]
    pub age: f64,
    #[serde(default = "default_interests_weight")]
    pub interests: f64,
    #[serde(default = "default_verified_weight")]
    pub verified: f64,
    #[serde(default = "default_activity_weight")]
    pub activity: f64,
}

impl Default for WeightsConfig {
    fn default() -> Self {
        Self {
            distance: default_distance_weight(),
            age: default_age_weight(),
            interests: default_interests_weight(),
            verified: default_verified_weight(),
            activity: default_activity_weight(),
        }
    }
}

impl From<&WeightsConfig> for ScoringWeights {
    fn from(config: &WeightsConfig) -> Self {
        ScoringWeights {
            distance: config.distance,
            age: config.age,
            interests: config.interests,
            verified: config.verified,
            activity: config.activity,
        }
    }
}

fn default_distance_weight() -> f64 { 0.40 }
fn default_age_weight() -> f64 { 0.20 }
fn default_interests_weight() -> f64 { 0.25 }
fn default_verified_weight() -> f64 { 0.05 }
fn default_activity_weight() -> f64 { 0.10 }

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "json".to_string() }

impl Settings {
    /// Load configuration from file and environment variables
    ///
    /// Configuration is loaded in the following order (later overrides earlier):
    /// 1. Defaults on the structs
    /// 2. config/default.toml
    /// 3. config/local.toml (development overrides)
    /// 4. Environment variables prefixed with KINDRED__, e.g.
    ///    KINDRED__SERVER__PORT -> server.port
    /// 5. DATABASE_URL / REDIS_URL
    pub fn load() -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(env_source());

        apply_url_overrides(builder)?.build()?.try_deserialize()
    }

    /// Load configuration from a custom path
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(env_source());

        apply_url_overrides(builder)?.build()?.try_deserialize()
    }
}

fn env_source() -> Environment {
    Environment::with_prefix("KINDRED")
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
}

/// Conventional platform variables win over everything else
fn apply_url_overrides(
    mut builder: config::ConfigBuilder<config::builder::DefaultState>,
) -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
    if let Ok(url) = std::env::var("DATABASE_URL") {
        builder = builder.set_override("database.url", url)?;
    }
    if let Ok(url) = std::env::var("REDIS_URL") {
        builder = builder.set_override("cache.redis_url", url)?;
    }
    Ok(builder)
}
