use uuid::Uuid;

use super::{PostgresClient, PostgresError};
use crate::core::swipes::ordered_pair;
use crate::models::{Block, Report, ReportReason, ReportStatus};

const REPORT_COLUMNS: &str =
    "id, reporter_id, reported_id, reason, details, message_id, status, resolution_note, created_at, resolved_at";

#[derive(Debug, Clone)]
pub struct NewReport {
    pub reporter_id: Uuid,
    pub reported_id: Uuid,
    pub reason: ReportReason,
    pub details: Option<String>,
    pub message_id: Option<i64>,
}

impl PostgresClient {
    /// Block a member. Any match between the two is closed in the same
    /// transaction. Blocking twice is a no-op that returns the existing row.
    pub async fn block_user(&self, blocker_id: Uuid, blocked_id: Uuid) -> Result<Block, PostgresError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO blocks (blocker_id, blocked_id)
            VALUES ($1, $2)
            ON CONFLICT (blocker_id, blocked_id) DO NOTHING
            "#,
        )
        .bind(blocker_id)
        .bind(blocked_id)
        .execute(&mut *tx)
        .await?;

        let block = sqlx::query_as::<_, Block>(
            "SELECT blocker_id, blocked_id, created_at FROM blocks WHERE blocker_id = $1 AND blocked_id = $2",
        )
        .bind(blocker_id)
        .bind(blocked_id)
        .fetch_one(&mut *tx)
        .await?;

        let (user_a, user_b) = ordered_pair(blocker_id, blocked_id);
        sqlx::query(
            r#"
            UPDATE matches SET unmatched_at = NOW(), unmatched_by = $3
            WHERE user_a = $1 AND user_b = $2 AND unmatched_at IS NULL
            "#,
        )
        .bind(user_a)
        .bind(user_b)
        .bind(blocker_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!("User {} blocked {}", blocker_id, blocked_id);
        Ok(block)
    }

    pub async fn unblock_user(&self, blocker_id: Uuid, blocked_id: Uuid) -> Result<bool, PostgresError> {
        let result = sqlx::query("DELETE FROM blocks WHERE blocker_id = $1 AND blocked_id = $2")
            .bind(blocker_id)
            .bind(blocked_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn list_blocks(&self, blocker_id: Uuid) -> Result<Vec<Block>, PostgresError> {
        Ok(sqlx::query_as::<_, Block>(
            r#"
            SELECT blocker_id, blocked_id, created_at FROM blocks
            WHERE blocker_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(blocker_id)
        .fetch_all(&self.pool)
        .await?)
    }

    /// True if either member has blocked the other
    pub async fn is_blocked_either(&self, a: Uuid, b: Uuid) -> Result<bool, PostgresError> {
        let blocked: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM blocks
                WHERE (blocker_id = $1 AND blocked_id = $2)
                   OR (blocker_id = $2 AND blocked_id = $1)
            )
            "#,
        )
        .bind(a)
        .bind(b)
        .fetch_one(&self.pool)
        .await?;

        Ok(blocked)
    }

    pub async fn create_report(&self, report: NewReport) -> Result<Report, PostgresError> {
        let created = sqlx::query_as::<_, Report>(&format!(
            r#"
            INSERT INTO reports (id, reporter_id, reported_id, reason, details, message_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            REPORT_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(report.reporter_id)
        .bind(report.reported_id)
        .bind(report.reason)
        .bind(&report.details)
        .bind(report.message_id)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(
            "Report {} filed against {} ({:?})",
            created.id,
            created.reported_id,
            created.reason
        );
        Ok(created)
    }

    /// Number of distinct members with an unresolved report against `user_id`
    pub async fn distinct_open_reporters(&self, user_id: Uuid) -> Result<i64, PostgresError> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(DISTINCT reporter_id) FROM reports
            WHERE reported_id = $1 AND status IN ('open', 'reviewing')
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    pub async fn list_reports(
        &self,
        status: Option<ReportStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Report>, PostgresError> {
        Ok(sqlx::query_as::<_, Report>(&format!(
            r#"
            SELECT {} FROM reports
            WHERE ($1::report_status IS NULL OR status = $1)
            ORDER BY created_at ASC
            LIMIT $2 OFFSET $3
            "#,
            REPORT_COLUMNS
        ))
        .bind(status)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?)
    }

    /// Move a report to a new status; resolved and dismissed reports get a
    /// resolution timestamp.
    pub async fn review_report(
        &self,
        report_id: Uuid,
        status: ReportStatus,
        resolution_note: Option<&str>,
    ) -> Result<Report, PostgresError> {
        sqlx::query_as::<_, Report>(&format!(
            r#"
            UPDATE reports SET
                status = $2,
                resolution_note = COALESCE($3, resolution_note),
                resolved_at = CASE WHEN $2 IN ('resolved', 'dismissed') THEN NOW() ELSE NULL END
            WHERE id = $1
            RETURNING {}
            "#,
            REPORT_COLUMNS
        ))
        .bind(report_id)
        .bind(status)
        .bind(resolution_note)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| PostgresError::NotFound(format!("report {}", report_id)))
    }
}
