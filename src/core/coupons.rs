use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::core::plans::monthly_price_cents;
use crate::models::{Coupon, PlanTier};

/// Price after applying a coupon to one month of a plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CouponQuote {
    pub tier: PlanTier,
    pub original_cents: u32,
    pub discount_cents: u32,
    pub final_cents: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CouponRejection {
    #[error("coupon is no longer active")]
    Inactive,

    #[error("coupon has expired")]
    Expired,

    #[error("coupon has reached its redemption limit")]
    Exhausted,

    #[error("coupon does not apply to this plan")]
    NotApplicable,

    #[error("coupons only apply to paid plans")]
    FreeTier,
}

/// Codes are stored and compared upper-case without surrounding whitespace
pub fn normalize_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

/// Validate `coupon` for `tier` at `now` and compute the discounted price.
/// An empty `applies_to` list means every paid tier.
pub fn evaluate(coupon: &Coupon, tier: PlanTier, now: DateTime<Utc>) -> Result<CouponQuote, CouponRejection> {
    if tier == PlanTier::Free {
        return Err(CouponRejection::FreeTier);
    }
    if !coupon.active {
        return Err(CouponRejection::Inactive);
    }
    if coupon.expires_at.is_some_and(|at| at <= now) {
        return Err(CouponRejection::Expired);
    }
    if coupon
        .max_redemptions
        .is_some_and(|max| coupon.times_redeemed >= max)
    {
        return Err(CouponRejection::Exhausted);
    }
    if !coupon.applies_to.is_empty()
        && !coupon
            .applies_to
            .iter()
            .any(|t| PlanTier::parse(t) == Some(tier))
    {
        return Err(CouponRejection::NotApplicable);
    }

    let original = monthly_price_cents(tier);
    let discount = match (coupon.percent_off, coupon.amount_off_cents) {
        (Some(percent), _) => {
            let percent = percent.clamp(0, 100) as u32;
            original * percent / 100
        }
        (None, Some(amount)) => (amount.max(0) as u32).min(original),
        (None, None) => 0,
    };

    Ok(CouponQuote {
        tier,
        original_cents: original,
        discount_cents: discount,
        final_cents: original - discount,
    })
}
