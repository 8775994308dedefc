use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{PostgresClient, PostgresError};
use crate::models::{Coupon, PlanTier, Subscription, SubscriptionStatus};

const SUBSCRIPTION_COLUMNS: &str =
    "user_id, tier, status, current_period_end, cancel_at_period_end, coupon_code, updated_at";
const COUPON_COLUMNS: &str =
    "code, percent_off, amount_off_cents, applies_to, expires_at, max_redemptions, times_redeemed, active, created_at";

impl PostgresClient {
    pub async fn get_subscription(&self, user_id: Uuid) -> Result<Option<Subscription>, PostgresError> {
        Ok(sqlx::query_as::<_, Subscription>(&format!(
            "SELECT {} FROM subscriptions WHERE user_id = $1",
            SUBSCRIPTION_COLUMNS
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    /// Create or replace a member's subscription.
    ///
    /// When `coupon_code` is given the redemption counter is bumped in the
    /// same transaction; the guarded update refuses a coupon that ran out in
    /// the meantime.
    pub async fn upsert_subscription(
        &self,
        user_id: Uuid,
        tier: PlanTier,
        status: SubscriptionStatus,
        current_period_end: Option<DateTime<Utc>>,
        coupon_code: Option<&str>,
    ) -> Result<Subscription, PostgresError> {
        let mut tx = self.pool.begin().await?;

        if let Some(code) = coupon_code {
            let redeemed = sqlx::query(
                r#"
                UPDATE coupons SET times_redeemed = times_redeemed + 1
                WHERE code = $1
                  AND active
                  AND (max_redemptions IS NULL OR times_redeemed < max_redemptions)
                "#,
            )
            .bind(code)
            .execute(&mut *tx)
            .await?;

            if redeemed.rows_affected() == 0 {
                return Err(PostgresError::InvalidInput(format!(
                    "coupon {} cannot be redeemed",
                    code
                )));
            }
        }

        let subscription = sqlx::query_as::<_, Subscription>(&format!(
            r#"
            INSERT INTO subscriptions (user_id, tier, status, current_period_end, coupon_code)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id) DO UPDATE SET
                tier = EXCLUDED.tier,
                status = EXCLUDED.status,
                current_period_end = EXCLUDED.current_period_end,
                coupon_code = COALESCE(EXCLUDED.coupon_code, subscriptions.coupon_code),
                cancel_at_period_end = FALSE,
                updated_at = NOW()
            RETURNING {}
            "#,
            SUBSCRIPTION_COLUMNS
        ))
        .bind(user_id)
        .bind(tier)
        .bind(status)
        .bind(current_period_end)
        .bind(coupon_code)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            "Subscription for {} set to {} ({:?})",
            user_id,
            tier.as_str(),
            status
        );
        Ok(subscription)
    }

    /// Cancel at period end; the member keeps the tier until then
    pub async fn cancel_subscription(&self, user_id: Uuid) -> Result<Option<Subscription>, PostgresError> {
        Ok(sqlx::query_as::<_, Subscription>(&format!(
            r#"
            UPDATE subscriptions SET cancel_at_period_end = TRUE, updated_at = NOW()
            WHERE user_id = $1 AND status IN ('active', 'trialing')
            RETURNING {}
            "#,
            SUBSCRIPTION_COLUMNS
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    pub async fn get_coupon(&self, code: &str) -> Result<Option<Coupon>, PostgresError> {
        Ok(sqlx::query_as::<_, Coupon>(&format!(
            "SELECT {} FROM coupons WHERE code = $1",
            COUPON_COLUMNS
        ))
        .bind(code)
        .fetch_optional(&self.pool)
        .await?)
    }

    pub async fn list_coupons(&self) -> Result<Vec<Coupon>, PostgresError> {
        Ok(sqlx::query_as::<_, Coupon>(&format!(
            "SELECT {} FROM coupons ORDER BY created_at DESC",
            COUPON_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?)
    }

    pub async fn create_coupon(&self, coupon: &Coupon) -> Result<Coupon, PostgresError> {
        Ok(sqlx::query_as::<_, Coupon>(&format!(
            r#"
            INSERT INTO coupons (code, percent_off, amount_off_cents, applies_to, expires_at, max_redemptions, active)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            COUPON_COLUMNS
        ))
        .bind(&coupon.code)
        .bind(coupon.percent_off)
        .bind(coupon.amount_off_cents)
        .bind(&coupon.applies_to)
        .bind(coupon.expires_at)
        .bind(coupon.max_redemptions)
        .bind(coupon.active)
        .fetch_one(&self.pool)
        .await?)
    }

    pub async fn deactivate_coupon(&self, code: &str) -> Result<bool, PostgresError> {
        let result = sqlx::query("UPDATE coupons SET active = FALSE WHERE code = $1")
            .bind(code)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
