//! Subscription plans and the features each one unlocks.
//!
//! Gating is a table lookup: handlers resolve the caller's effective tier
//! with [`effective_tier`] and consult [`PlanFeatures::for_tier`].

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::models::{PlanTier, Subscription, SubscriptionStatus, SwipeDirection};

/// Features and quotas attached to a plan tier. `None` quotas are unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanFeatures {
    pub daily_likes: Option<u32>,
    pub daily_super_likes: u32,
    pub undo: bool,
    pub see_who_liked_you: bool,
    pub read_receipts: bool,
    pub max_photos: usize,
}

impl PlanFeatures {
    pub const fn for_tier(tier: PlanTier) -> Self {
        match tier {
            PlanTier::Free => Self {
                daily_likes: Some(25),
                daily_super_likes: 1,
                undo: false,
                see_who_liked_you: false,
                read_receipts: false,
                max_photos: 6,
            },
            PlanTier::Plus => Self {
                daily_likes: None,
                daily_super_likes: 5,
                undo: true,
                see_who_liked_you: false,
                read_receipts: true,
                max_photos: 9,
            },
            PlanTier::Premium => Self {
                daily_likes: None,
                daily_super_likes: 10,
                undo: true,
                see_who_liked_you: true,
                read_receipts: true,
                max_photos: 12,
            },
        }
    }
}

/// Catalogue entry returned by `GET /api/plans`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub tier: PlanTier,
    pub name: &'static str,
    pub monthly_price_cents: u32,
    pub features: PlanFeatures,
}

pub fn monthly_price_cents(tier: PlanTier) -> u32 {
    match tier {
        PlanTier::Free => 0,
        PlanTier::Plus => 999,
        PlanTier::Premium => 1999,
    }
}

pub fn catalogue() -> Vec<Plan> {
    [
        (PlanTier::Free, "Free"),
        (PlanTier::Plus, "Kindred Plus"),
        (PlanTier::Premium, "Kindred Premium"),
    ]
    .into_iter()
    .map(|(tier, name)| Plan {
        tier,
        name,
        monthly_price_cents: monthly_price_cents(tier),
        features: PlanFeatures::for_tier(tier),
    })
    .collect()
}

/// Tier used for gating: paid tiers only count while the subscription is
/// active or trialing and the current period has not ended.
pub fn effective_tier(subscription: Option<&Subscription>, now: DateTime<Utc>) -> PlanTier {
    let Some(sub) = subscription else {
        return PlanTier::Free;
    };

    let status_ok = matches!(
        sub.status,
        SubscriptionStatus::Active | SubscriptionStatus::Trialing
    );
    let period_ok = sub.current_period_end.map_or(true, |end| end > now);

    if status_ok && period_ok {
        sub.tier
    } else {
        PlanTier::Free
    }
}

/// Why a swipe was refused by plan quotas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QuotaExceeded {
    #[error("daily like limit of {limit} reached")]
    Likes { limit: u32 },

    #[error("daily superlike limit of {limit} reached")]
    SuperLikes { limit: u32 },
}

/// Counts of today's positive swipes, superlikes included in `likes`
#[derive(Debug, Clone, Copy, Default)]
pub struct DailyUsage {
    pub likes: u32,
    pub super_likes: u32,
}

/// Check whether one more swipe in `direction` fits the plan's daily quotas.
/// Passes are never limited.
pub fn check_swipe_quota(
    features: &PlanFeatures,
    usage: DailyUsage,
    direction: SwipeDirection,
) -> Result<(), QuotaExceeded> {
    if !direction.is_positive() {
        return Ok(());
    }

    if direction == SwipeDirection::Superlike && usage.super_likes >= features.daily_super_likes {
        return Err(QuotaExceeded::SuperLikes {
            limit: features.daily_super_likes,
        });
    }

    match features.daily_likes {
        Some(limit) if usage.likes >= limit => Err(QuotaExceeded::Likes { limit }),
        _ => Ok(()),
    }
}
