//! Pure ledger arithmetic: available balance, tier-discounted costs,
//! affordability, and spend validation. No I/O here — the atomic spend
//! itself lives in `points::store`.

use serde::Serialize;
use thiserror::Error;

use crate::points::models::{SpendRequest, SubscriptionTier};

/// Points available to spend. Never negative, even if `used` has run ahead
/// of the allocation (e.g. after a mid-month downgrade).
pub fn calculate_available_points(monthly: i64, used: i64, earned: i64) -> i64 {
    (monthly + earned - used).max(0)
}

/// Discount factor per tier, in basis points to keep the arithmetic integral.
/// Better tiers never pay more.
fn tier_factor_bps(tier: SubscriptionTier) -> i64 {
    match tier {
        SubscriptionTier::Free => 10_000,
        SubscriptionTier::Basic => 9_500,
        SubscriptionTier::Starter => 9_000,
        SubscriptionTier::Pro => 8_500,
        SubscriptionTier::Expert => 8_000,
    }
}

/// Tier-discounted cost of an action, rounded **up**: a fractional discount
/// never undercharges.
pub fn effective_cost(base_cost: i64, tier: SubscriptionTier) -> i64 {
    let bps = tier_factor_bps(tier);
    // ceil(base * bps / 10_000) in integer arithmetic
    (base_cost * bps + 9_999) / 10_000
}

#[derive(Debug, Clone, Serialize)]
pub struct Affordability {
    pub can_afford: bool,
    pub cost: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shortfall: Option<i64>,
}

pub fn can_afford(cost: i64, available: i64) -> Affordability {
    if available >= cost {
        Affordability {
            can_afford: true,
            cost,
            shortfall: None,
        }
    } else {
        Affordability {
            can_afford: false,
            cost,
            shortfall: Some(cost - available),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SpendValidationError {
    #[error("Spend amount must be positive, got {0}")]
    NonPositiveAmount(i64),

    #[error("Spend amount {given} does not match the effective cost {expected} for this action")]
    AmountMismatch { given: i64, expected: i64 },

    #[error("This spend type references a generated artifact and requires a source_id")]
    MissingSourceId,
}

/// Validates a client-supplied spend against the cost the ledger would
/// actually charge. Rejection here means the request never reaches the store.
pub fn validate_spend(
    request: &SpendRequest,
    expected_cost: i64,
) -> Result<(), SpendValidationError> {
    if request.amount <= 0 {
        return Err(SpendValidationError::NonPositiveAmount(request.amount));
    }
    if request.amount != expected_cost {
        return Err(SpendValidationError::AmountMismatch {
            given: request.amount,
            expected: expected_cost,
        });
    }
    if request.spend_type.requires_source() && request.source_id.is_none() {
        return Err(SpendValidationError::MissingSourceId);
    }
    Ok(())
}
