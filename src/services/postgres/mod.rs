//! PostgreSQL persistence.
//!
//! One [`PostgresClient`] wraps the pool; each submodule adds an `impl` block
//! for one resource. Queries are checked at runtime (`sqlx::query_as`) so the
//! crate builds without a live database.

mod content;
mod matches;
mod messages;
mod moderation;
mod subscriptions;
mod swipes;
mod users;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use thiserror::Error;

pub use content::{ArticleChanges, NewArticle, NewPost, PostChanges};
pub use matches::MatchListRow;
pub use moderation::NewReport;
pub use swipes::{SwipeOutcome, UndoOutcome};
pub use users::{NewUser, ProfileChanges};

/// Errors that can occur when interacting with PostgreSQL
#[derive(Debug, Error)]
pub enum PostgresError {
    #[error("SQLx error: {0}")]
    SqlxError(sqlx::Error),

    #[error("Migration error: {0}")]
    MigrateError(#[from] sqlx::migrate::MigrateError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl From<sqlx::Error> for PostgresError {
    fn from(err: sqlx::Error) -> Self {
        if let Some(db_err) = err.as_database_error() {
            if db_err.is_unique_violation() {
                let what = db_err.constraint().unwrap_or("unique constraint").to_string();
                return PostgresError::Conflict(what);
            }
        }
        match err {
            sqlx::Error::RowNotFound => PostgresError::NotFound("row".to_string()),
            other => PostgresError::SqlxError(other),
        }
    }
}

/// Column list for `users`, optionally qualified with a table alias
pub(crate) fn user_columns(alias: Option<&str>) -> String {
    const COLUMNS: &[&str] = &[
        "id",
        "email",
        "password_hash",
        "display_name",
        "birthdate",
        "gender",
        "bio",
        "interests",
        "photo_urls",
        "latitude",
        "longitude",
        "role",
        "approval_status",
        "verification_status",
        "is_banned",
        "banned_reason",
        "pref_genders",
        "pref_min_age",
        "pref_max_age",
        "pref_max_distance_km",
        "last_active_at",
        "created_at",
        "updated_at",
    ];

    match alias {
        Some(alias) => COLUMNS
            .iter()
            .map(|c| format!("{}.{}", alias, c))
            .collect::<Vec<_>>()
            .join(", "),
        None => COLUMNS.join(", "),
    }
}

/// PostgreSQL client shared by all handlers
pub struct PostgresClient {
    pool: PgPool,
}

impl PostgresClient {
    /// Connect and run pending migrations
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
        acquire_timeout: Duration,
        idle_timeout: Duration,
    ) -> Result<Self, PostgresError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(acquire_timeout)
            .idle_timeout(idle_timeout)
            .test_before_acquire(true)
            .connect(database_url)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    /// Create a new PostgreSQL client from settings
    pub async fn from_settings(settings: &crate::config::DatabaseSettings) -> Result<Self, PostgresError> {
        tracing::info!("Connecting to PostgreSQL");

        Self::new(
            &settings.url,
            settings.max_connections.unwrap_or(10),
            settings.min_connections.unwrap_or(1),
            Duration::from_secs(settings.acquire_timeout_secs.unwrap_or(5)),
            Duration::from_secs(settings.idle_timeout_secs.unwrap_or(600)),
        )
        .await
    }

    /// Wrap an existing pool, e.g. one created by a test harness
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Health check for the database connection
    pub async fn health_check(&self) -> Result<bool, PostgresError> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|_| true)
            .map_err(Into::into)
    }
}
