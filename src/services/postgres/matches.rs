use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use super::swipes::MATCH_COLUMNS;
use super::{PostgresClient, PostgresError};
use crate::core::ages::age_on;
use crate::models::{Match, MatchSummary, MessagePreview, PublicProfile};

/// One row of the match list: the match, the other member, the last message
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MatchListRow {
    pub match_id: Uuid,
    pub matched_at: DateTime<Utc>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub other_id: Uuid,
    pub display_name: String,
    pub birthdate: NaiveDate,
    pub gender: String,
    pub bio: Option<String>,
    pub interests: Vec<String>,
    pub photo_urls: Vec<String>,
    pub is_verified: bool,
    pub last_message_id: Option<i64>,
    pub last_message_sender: Option<Uuid>,
    pub last_message_body: Option<String>,
    pub last_message_created_at: Option<DateTime<Utc>>,
}

impl MatchListRow {
    pub fn into_summary(self, today: NaiveDate) -> MatchSummary {
        let last_message = match (
            self.last_message_id,
            self.last_message_sender,
            self.last_message_body,
            self.last_message_created_at,
        ) {
            (Some(id), Some(sender_id), Some(body), Some(created_at)) => Some(MessagePreview {
                id,
                sender_id,
                body,
                created_at,
            }),
            _ => None,
        };

        MatchSummary {
            match_id: self.match_id,
            matched_at: self.matched_at,
            last_message_at: self.last_message_at,
            user: PublicProfile {
                id: self.other_id,
                display_name: self.display_name,
                age: age_on(self.birthdate, today),
                gender: self.gender,
                bio: self.bio,
                interests: self.interests,
                photo_urls: self.photo_urls,
                is_verified: self.is_verified,
                distance_km: None,
            },
            last_message,
        }
    }
}

impl PostgresClient {
    pub async fn get_match(&self, match_id: Uuid) -> Result<Option<Match>, PostgresError> {
        Ok(sqlx::query_as::<_, Match>(&format!(
            "SELECT {} FROM matches WHERE id = $1",
            MATCH_COLUMNS
        ))
        .bind(match_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    /// Active matches for a member, most recent activity first
    pub async fn list_matches(&self, user_id: Uuid) -> Result<Vec<MatchListRow>, PostgresError> {
        let rows = sqlx::query_as::<_, MatchListRow>(
            r#"
            SELECT m.id AS match_id,
                   m.created_at AS matched_at,
                   m.last_message_at,
                   u.id AS other_id,
                   u.display_name,
                   u.birthdate,
                   u.gender,
                   u.bio,
                   u.interests,
                   u.photo_urls,
                   u.verification_status = 'verified' AS is_verified,
                   lm.id AS last_message_id,
                   lm.sender_id AS last_message_sender,
                   lm.body AS last_message_body,
                   lm.created_at AS last_message_created_at
            FROM matches m
            JOIN users u
              ON u.id = CASE WHEN m.user_a = $1 THEN m.user_b ELSE m.user_a END
            LEFT JOIN LATERAL (
                SELECT id, sender_id, body, created_at
                FROM messages
                WHERE match_id = m.id
                ORDER BY id DESC
                LIMIT 1
            ) lm ON TRUE
            WHERE (m.user_a = $1 OR m.user_b = $1)
              AND m.unmatched_at IS NULL
              AND NOT u.is_banned
            ORDER BY COALESCE(m.last_message_at, m.created_at) DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Close a match. Returns false if it was already closed.
    pub async fn unmatch(&self, match_id: Uuid, by: Uuid) -> Result<bool, PostgresError> {
        let result = sqlx::query(
            r#"
            UPDATE matches SET unmatched_at = NOW(), unmatched_by = $2
            WHERE id = $1 AND unmatched_at IS NULL
            "#,
        )
        .bind(match_id)
        .bind(by)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn is_match_active(&self, match_id: Uuid) -> Result<bool, PostgresError> {
        let active: Option<bool> = sqlx::query_scalar(
            "SELECT unmatched_at IS NULL FROM matches WHERE id = $1",
        )
        .bind(match_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(active.unwrap_or(false))
    }
}
