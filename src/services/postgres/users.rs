use chrono::NaiveDate;
use sqlx::Row;
use uuid::Uuid;

use super::{user_columns, PostgresClient, PostgresError};
use crate::core::ages::{age_on, birthdate_bounds};
use crate::models::{
    ApprovalStatus, Candidate, CandidateQuery, ModerationAction, User, VerificationStatus,
};

/// Fields for a new account
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub display_name: String,
    pub birthdate: NaiveDate,
    pub gender: String,
    pub approval_status: ApprovalStatus,
}

/// Partial profile update. `bio: Some("")` clears the bio.
#[derive(Debug, Clone, Default)]
pub struct ProfileChanges {
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub gender: Option<String>,
    pub interests: Option<Vec<String>>,
    pub photo_urls: Option<Vec<String>>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub pref_genders: Option<Vec<String>>,
    pub pref_min_age: Option<i16>,
    pub pref_max_age: Option<i16>,
    pub pref_max_distance_km: Option<i32>,
}

impl PostgresClient {
    pub async fn create_user(&self, new_user: NewUser) -> Result<User, PostgresError> {
        let query = format!(
            r#"
            INSERT INTO users (id, email, password_hash, display_name, birthdate, gender, approval_status)
            VALUES ($1, lower($2), $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            user_columns(None)
        );

        let user = sqlx::query_as::<_, User>(&query)
            .bind(Uuid::new_v4())
            .bind(&new_user.email)
            .bind(&new_user.password_hash)
            .bind(&new_user.display_name)
            .bind(new_user.birthdate)
            .bind(&new_user.gender)
            .bind(new_user.approval_status)
            .fetch_one(&self.pool)
            .await?;

        tracing::info!("Created user {}", user.id);
        Ok(user)
    }

    pub async fn get_user(&self, user_id: Uuid) -> Result<Option<User>, PostgresError> {
        let query = format!("SELECT {} FROM users WHERE id = $1", user_columns(None));
        Ok(sqlx::query_as::<_, User>(&query)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, PostgresError> {
        let query = format!(
            "SELECT {} FROM users WHERE lower(email) = lower($1)",
            user_columns(None)
        );
        Ok(sqlx::query_as::<_, User>(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?)
    }

    pub async fn touch_last_active(&self, user_id: Uuid) -> Result<(), PostgresError> {
        sqlx::query("UPDATE users SET last_active_at = NOW() WHERE id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn update_profile(
        &self,
        user_id: Uuid,
        changes: ProfileChanges,
    ) -> Result<User, PostgresError> {
        let query = format!(
            r#"
            UPDATE users SET
                display_name = COALESCE($2, display_name),
                bio = CASE WHEN $3::text IS NULL THEN bio ELSE NULLIF($3, '') END,
                gender = COALESCE($4, gender),
                interests = COALESCE($5, interests),
                photo_urls = COALESCE($6, photo_urls),
                latitude = COALESCE($7, latitude),
                longitude = COALESCE($8, longitude),
                pref_genders = COALESCE($9, pref_genders),
                pref_min_age = COALESCE($10, pref_min_age),
                pref_max_age = COALESCE($11, pref_max_age),
                pref_max_distance_km = COALESCE($12, pref_max_distance_km),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            user_columns(None)
        );

        sqlx::query_as::<_, User>(&query)
            .bind(user_id)
            .bind(changes.display_name)
            .bind(changes.bio)
            .bind(changes.gender)
            .bind(changes.interests)
            .bind(changes.photo_urls)
            .bind(changes.latitude)
            .bind(changes.longitude)
            .bind(changes.pref_genders)
            .bind(changes.pref_min_age)
            .bind(changes.pref_max_age)
            .bind(changes.pref_max_distance_km)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| PostgresError::NotFound(format!("user {}", user_id)))
    }

    /// Move the account to `pending` verification. Returns false when a
    /// request is already pending or the account is verified.
    pub async fn request_verification(
        &self,
        user_id: Uuid,
        selfie_url: &str,
    ) -> Result<bool, PostgresError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET verification_status = 'pending', verification_selfie_url = $2, updated_at = NOW()
            WHERE id = $1 AND verification_status IN ('unverified', 'rejected')
            "#,
        )
        .bind(user_id)
        .bind(selfie_url)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn set_verification_status(
        &self,
        user_id: Uuid,
        status: VerificationStatus,
    ) -> Result<bool, PostgresError> {
        let result = sqlx::query(
            "UPDATE users SET verification_status = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(user_id)
        .bind(status)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn set_approval_status(
        &self,
        user_id: Uuid,
        status: ApprovalStatus,
    ) -> Result<bool, PostgresError> {
        let result = sqlx::query(
            "UPDATE users SET approval_status = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(user_id)
        .bind(status)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete an account; swipes, matches, messages and the rest cascade
    pub async fn delete_user(&self, user_id: Uuid) -> Result<bool, PostgresError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Apply a moderation action to many members in one statement.
    /// Staff accounts are never touched.
    pub async fn bulk_moderate(
        &self,
        user_ids: &[Uuid],
        action: ModerationAction,
        reason: Option<&str>,
    ) -> Result<u64, PostgresError> {
        let set_clause = match action {
            ModerationAction::Ban => "is_banned = TRUE, banned_reason = $2",
            ModerationAction::Unban => "is_banned = FALSE, banned_reason = NULL",
            ModerationAction::Approve => "approval_status = 'approved'",
            ModerationAction::Reject => "approval_status = 'rejected'",
        };

        let query = format!(
            "UPDATE users SET {}, updated_at = NOW() WHERE id = ANY($1) AND role = 'user'",
            set_clause
        );

        let mut statement = sqlx::query(&query).bind(user_ids);
        if action == ModerationAction::Ban {
            statement = statement.bind(reason);
        }
        let result = statement.execute(&self.pool).await?;

        tracing::info!(
            "Bulk {:?} applied to {} of {} users",
            action,
            result.rows_affected(),
            user_ids.len()
        );

        Ok(result.rows_affected())
    }

    /// Candidates for discover: everyone the viewer could still swipe on,
    /// narrowed by the SQL-expressible part of their preferences.
    pub async fn get_discover_candidates(
        &self,
        query: &CandidateQuery,
        today: NaiveDate,
    ) -> Result<Vec<Candidate>, PostgresError> {
        let (earliest, latest) = birthdate_bounds(query.min_age, query.max_age, today);
        let genders: Vec<String> = query
            .preferred_genders
            .iter()
            .map(|g| g.to_lowercase())
            .collect();
        let bbox = query.bounding_box;

        let sql = r#"
            SELECT u.id, u.display_name, u.birthdate, u.gender, u.bio, u.interests, u.photo_urls,
                   u.latitude, u.longitude, u.verification_status = 'verified' AS is_verified,
                   u.last_active_at, u.pref_genders, u.pref_min_age, u.pref_max_age
            FROM users u
            WHERE u.id <> $1
              AND NOT u.is_banned
              AND u.approval_status = 'approved'
              AND u.birthdate BETWEEN $2 AND $3
              AND (cardinality($4::text[]) = 0 OR lower(u.gender) = ANY($4))
              AND ($5::float8 IS NULL
                   OR (u.latitude BETWEEN $5 AND $6 AND u.longitude BETWEEN $7 AND $8))
              AND NOT EXISTS (
                  SELECT 1 FROM swipes s WHERE s.swiper_id = $1 AND s.target_id = u.id)
              AND NOT EXISTS (
                  SELECT 1 FROM blocks b
                  WHERE (b.blocker_id = $1 AND b.blocked_id = u.id)
                     OR (b.blocker_id = u.id AND b.blocked_id = $1))
              AND NOT EXISTS (
                  SELECT 1 FROM matches m
                  WHERE m.user_a = LEAST($1, u.id) AND m.user_b = GREATEST($1, u.id))
            ORDER BY u.last_active_at DESC
            LIMIT $9
        "#;

        let rows = sqlx::query(sql)
            .bind(query.viewer_id)
            .bind(earliest)
            .bind(latest)
            .bind(&genders)
            .bind(bbox.map(|b| b.min_lat))
            .bind(bbox.map(|b| b.max_lat))
            .bind(bbox.map(|b| b.min_lon))
            .bind(bbox.map(|b| b.max_lon))
            .bind(query.limit as i64)
            .fetch_all(&self.pool)
            .await?;

        let candidates = rows
            .iter()
            .map(|row| {
                let birthdate: NaiveDate = row.try_get("birthdate")?;
                let pref_min_age: i16 = row.try_get("pref_min_age")?;
                let pref_max_age: i16 = row.try_get("pref_max_age")?;
                Ok(Candidate {
                    user_id: row.try_get("id")?,
                    display_name: row.try_get("display_name")?,
                    age: age_on(birthdate, today),
                    gender: row.try_get("gender")?,
                    bio: row.try_get("bio")?,
                    interests: row.try_get("interests")?,
                    photo_urls: row.try_get("photo_urls")?,
                    latitude: row.try_get("latitude")?,
                    longitude: row.try_get("longitude")?,
                    is_verified: row.try_get("is_verified")?,
                    last_active_at: row.try_get("last_active_at")?,
                    pref_genders: row.try_get("pref_genders")?,
                    pref_min_age: pref_min_age.clamp(0, u8::MAX as i16) as u8,
                    pref_max_age: pref_max_age.clamp(0, u8::MAX as i16) as u8,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()?;

        tracing::debug!(
            "Loaded {} discover candidates for {}",
            candidates.len(),
            query.viewer_id
        );

        Ok(candidates)
    }
}
