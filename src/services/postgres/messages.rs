use uuid::Uuid;

use super::{PostgresClient, PostgresError};
use crate::models::Message;

const MESSAGE_COLUMNS: &str = "id, match_id, sender_id, body, flagged, created_at, read_at";

impl PostgresClient {
    /// Store a message and bump the match's `last_message_at`.
    ///
    /// The match row is locked so a concurrent unmatch cannot slip in between
    /// the activity check and the insert.
    pub async fn insert_message(
        &self,
        match_id: Uuid,
        sender_id: Uuid,
        body: &str,
        flagged: bool,
    ) -> Result<Message, PostgresError> {
        let mut tx = self.pool.begin().await?;

        let active: Option<bool> = sqlx::query_scalar(
            "SELECT unmatched_at IS NULL FROM matches WHERE id = $1 FOR UPDATE",
        )
        .bind(match_id)
        .fetch_optional(&mut *tx)
        .await?;

        match active {
            None => return Err(PostgresError::NotFound(format!("match {}", match_id))),
            Some(false) => {
                return Err(PostgresError::Conflict("match is no longer active".to_string()))
            }
            Some(true) => {}
        }

        let message = sqlx::query_as::<_, Message>(&format!(
            r#"
            INSERT INTO messages (match_id, sender_id, body, flagged)
            VALUES ($1, $2, $3, $4)
            RETURNING {}
            "#,
            MESSAGE_COLUMNS
        ))
        .bind(match_id)
        .bind(sender_id)
        .bind(body)
        .bind(flagged)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("UPDATE matches SET last_message_at = $2 WHERE id = $1")
            .bind(match_id)
            .bind(message.created_at)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(message)
    }

    /// A page of history ending just before `before`, returned oldest first
    pub async fn list_messages(
        &self,
        match_id: Uuid,
        before: Option<i64>,
        limit: i64,
    ) -> Result<Vec<Message>, PostgresError> {
        let mut messages = sqlx::query_as::<_, Message>(&format!(
            r#"
            SELECT {} FROM messages
            WHERE match_id = $1 AND ($2::bigint IS NULL OR id < $2)
            ORDER BY id DESC
            LIMIT $3
            "#,
            MESSAGE_COLUMNS
        ))
        .bind(match_id)
        .bind(before)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        messages.reverse();
        Ok(messages)
    }

    /// Messages newer than `after`, oldest first. Used by the chat stream.
    pub async fn messages_after(
        &self,
        match_id: Uuid,
        after: i64,
        limit: i64,
    ) -> Result<Vec<Message>, PostgresError> {
        Ok(sqlx::query_as::<_, Message>(&format!(
            r#"
            SELECT {} FROM messages
            WHERE match_id = $1 AND id > $2
            ORDER BY id ASC
            LIMIT $3
            "#,
            MESSAGE_COLUMNS
        ))
        .bind(match_id)
        .bind(after)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?)
    }

    pub async fn latest_message_id(&self, match_id: Uuid) -> Result<i64, PostgresError> {
        let id: Option<i64> =
            sqlx::query_scalar("SELECT MAX(id) FROM messages WHERE match_id = $1")
                .bind(match_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(id.unwrap_or(0))
    }

    /// Mark everything the other member sent as read
    pub async fn mark_read(&self, match_id: Uuid, reader_id: Uuid) -> Result<u64, PostgresError> {
        let result = sqlx::query(
            r#"
            UPDATE messages SET read_at = NOW()
            WHERE match_id = $1 AND sender_id <> $2 AND read_at IS NULL
            "#,
        )
        .bind(match_id)
        .bind(reader_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Sender of a message, if the message exists
    pub async fn message_sender(&self, message_id: i64) -> Result<Option<Uuid>, PostgresError> {
        Ok(
            sqlx::query_scalar("SELECT sender_id FROM messages WHERE id = $1")
                .bind(message_id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }
}
