use chrono::{DateTime, Utc};
use sqlx::{PgConnection, Row};
use uuid::Uuid;

use super::{user_columns, PostgresClient, PostgresError};
use crate::core::plans::{check_swipe_quota, DailyUsage, PlanFeatures, QuotaExceeded};
use crate::core::swipes::ordered_pair;
use crate::models::{Match, Swipe, SwipeDirection, User};

const SWIPE_COLUMNS: &str = "id, swiper_id, target_id, direction, created_at";
pub(super) const MATCH_COLUMNS: &str =
    "id, user_a, user_b, created_at, last_message_at, unmatched_at, unmatched_by";

/// Result of recording a swipe
#[derive(Debug, Clone)]
pub struct SwipeOutcome {
    pub swipe: Swipe,
    /// Set when this swipe completed a mutual like
    pub matched: Option<Match>,
}

/// What an undo removed
#[derive(Debug, Clone)]
pub struct UndoOutcome {
    pub swipe: Swipe,
    pub match_removed: bool,
    pub messages_removed: u64,
}

impl PostgresClient {
    /// Record a swipe and, on a mutual like, the match.
    ///
    /// Runs in one transaction holding two advisory locks: one on the swiper,
    /// so the daily quota is counted and spent atomically, and one on the
    /// unordered pair, so crossing likes see each other and create exactly one
    /// match. The swiper lock is always taken first.
    ///
    /// The inner `Err` is a quota refusal; nothing is written in that case.
    pub async fn record_swipe(
        &self,
        swiper_id: Uuid,
        target_id: Uuid,
        direction: SwipeDirection,
        features: &PlanFeatures,
        day_start: DateTime<Utc>,
    ) -> Result<Result<SwipeOutcome, QuotaExceeded>, PostgresError> {
        let (user_a, user_b) = ordered_pair(swiper_id, target_id);
        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended('swiper:' || $1::text, 0))")
            .bind(swiper_id)
            .execute(&mut *tx)
            .await?;

        if direction.is_positive() {
            let usage = count_daily_usage(&mut *tx, swiper_id, day_start).await?;
            if let Err(exceeded) = check_swipe_quota(features, usage, direction) {
                tx.rollback().await?;
                return Ok(Err(exceeded));
            }
        }

        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended('pair:' || $1::text || ':' || $2::text, 0))")
            .bind(user_a)
            .bind(user_b)
            .execute(&mut *tx)
            .await?;

        let swipe = sqlx::query_as::<_, Swipe>(&format!(
            r#"
            INSERT INTO swipes (id, swiper_id, target_id, direction)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (swiper_id, target_id) DO NOTHING
            RETURNING {}
            "#,
            SWIPE_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(swiper_id)
        .bind(target_id)
        .bind(direction)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| PostgresError::Conflict("already swiped on this member".to_string()))?;

        let mut matched = None;
        if direction.is_positive() {
            // The pair lock makes a committed reciprocal swipe visible here
            let reciprocal: bool = sqlx::query_scalar(
                r#"
                SELECT EXISTS (
                    SELECT 1 FROM swipes
                    WHERE swiper_id = $1 AND target_id = $2 AND direction IN ('like', 'superlike')
                )
                "#,
            )
            .bind(target_id)
            .bind(swiper_id)
            .fetch_one(&mut *tx)
            .await?;

            if reciprocal {
                let inserted = sqlx::query_as::<_, Match>(&format!(
                    r#"
                    INSERT INTO matches (id, user_a, user_b)
                    VALUES ($1, $2, $3)
                    ON CONFLICT (user_a, user_b) DO NOTHING
                    RETURNING {}
                    "#,
                    MATCH_COLUMNS
                ))
                .bind(Uuid::new_v4())
                .bind(user_a)
                .bind(user_b)
                .fetch_optional(&mut *tx)
                .await?;

                matched = match inserted {
                    Some(m) => Some(m),
                    None => {
                        sqlx::query_as::<_, Match>(&format!(
                            "SELECT {} FROM matches WHERE user_a = $1 AND user_b = $2",
                            MATCH_COLUMNS
                        ))
                        .bind(user_a)
                        .bind(user_b)
                        .fetch_optional(&mut *tx)
                        .await?
                    }
                };
            }
        }

        tx.commit().await?;

        tracing::debug!(
            "Recorded swipe {} -> {} ({:?}, matched: {})",
            swiper_id,
            target_id,
            direction,
            matched.is_some()
        );

        Ok(Ok(SwipeOutcome { swipe, matched }))
    }

    /// Take back the caller's latest swipe made after `cutoff`, together with
    /// the match it belongs to and that match's messages.
    pub async fn undo_last_swipe(
        &self,
        user_id: Uuid,
        cutoff: DateTime<Utc>,
    ) -> Result<Option<UndoOutcome>, PostgresError> {
        let mut tx = self.pool.begin().await?;

        let swipe = sqlx::query_as::<_, Swipe>(&format!(
            r#"
            SELECT {} FROM swipes
            WHERE swiper_id = $1 AND created_at > $2
            ORDER BY created_at DESC
            LIMIT 1
            FOR UPDATE
            "#,
            SWIPE_COLUMNS
        ))
        .bind(user_id)
        .bind(cutoff)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(swipe) = swipe else {
            return Ok(None);
        };

        let mut match_removed = false;
        let mut messages_removed = 0;

        if swipe.direction.is_positive() {
            let (user_a, user_b) = ordered_pair(swipe.swiper_id, swipe.target_id);
            let match_id: Option<Uuid> = sqlx::query_scalar(
                "SELECT id FROM matches WHERE user_a = $1 AND user_b = $2 FOR UPDATE",
            )
            .bind(user_a)
            .bind(user_b)
            .fetch_optional(&mut *tx)
            .await?;

            if let Some(match_id) = match_id {
                messages_removed = sqlx::query("DELETE FROM messages WHERE match_id = $1")
                    .bind(match_id)
                    .execute(&mut *tx)
                    .await?
                    .rows_affected();

                sqlx::query("DELETE FROM matches WHERE id = $1")
                    .bind(match_id)
                    .execute(&mut *tx)
                    .await?;
                match_removed = true;
            }
        }

        sqlx::query("DELETE FROM swipes WHERE id = $1")
            .bind(swipe.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(
            "Undid swipe {} by {} (match removed: {}, messages removed: {})",
            swipe.id,
            user_id,
            match_removed,
            messages_removed
        );

        Ok(Some(UndoOutcome {
            swipe,
            match_removed,
            messages_removed,
        }))
    }

    /// Members who liked `user_id` and are still waiting on a swipe back
    pub async fn likes_received(&self, user_id: Uuid, limit: i64) -> Result<Vec<User>, PostgresError> {
        let query = format!(
            r#"
            SELECT {}
            FROM swipes s
            JOIN users u ON u.id = s.swiper_id
            WHERE s.target_id = $1
              AND s.direction IN ('like', 'superlike')
              AND NOT u.is_banned
              AND u.approval_status = 'approved'
              AND NOT EXISTS (
                  SELECT 1 FROM swipes mine WHERE mine.swiper_id = $1 AND mine.target_id = u.id)
              AND NOT EXISTS (
                  SELECT 1 FROM blocks b
                  WHERE (b.blocker_id = $1 AND b.blocked_id = u.id)
                     OR (b.blocker_id = u.id AND b.blocked_id = $1))
            ORDER BY s.created_at DESC
            LIMIT $2
            "#,
            user_columns(Some("u"))
        );

        Ok(sqlx::query_as::<_, User>(&query)
            .bind(user_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?)
    }

    pub async fn count_likes_received(&self, user_id: Uuid) -> Result<i64, PostgresError> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM swipes s
            JOIN users u ON u.id = s.swiper_id
            WHERE s.target_id = $1
              AND s.direction IN ('like', 'superlike')
              AND NOT u.is_banned
              AND u.approval_status = 'approved'
              AND NOT EXISTS (
                  SELECT 1 FROM swipes mine WHERE mine.swiper_id = $1 AND mine.target_id = u.id)
              AND NOT EXISTS (
                  SELECT 1 FROM blocks b
                  WHERE (b.blocker_id = $1 AND b.blocked_id = u.id)
                     OR (b.blocker_id = u.id AND b.blocked_id = $1))
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }
}

/// Positive swipes made since `since`, for daily quotas
async fn count_daily_usage(
    conn: &mut PgConnection,
    user_id: Uuid,
    since: DateTime<Utc>,
) -> Result<DailyUsage, PostgresError> {
    let row = sqlx::query(
        r#"
        SELECT
            COUNT(*) FILTER (WHERE direction IN ('like', 'superlike')) AS likes,
            COUNT(*) FILTER (WHERE direction = 'superlike') AS super_likes
        FROM swipes
        WHERE swiper_id = $1 AND created_at >= $2
        "#,
    )
    .bind(user_id)
    .bind(since)
    .fetch_one(&mut *conn)
    .await?;

    let likes: i64 = row.try_get("likes")?;
    let super_likes: i64 = row.try_get("super_likes")?;

    Ok(DailyUsage {
        likes: likes.clamp(0, u32::MAX as i64) as u32,
        super_likes: super_likes.clamp(0, u32::MAX as i64) as u32,
    })
}
