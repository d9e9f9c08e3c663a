//! Cost configuration collaborator. The ledger consumes this interface but
//! never owns the numbers — swapping the table (or sourcing it from a remote
//! config service) must not touch ledger code.

use std::sync::Arc;

use serde::Serialize;

use crate::points::models::{SpendType, SubscriptionTier};

#[derive(Debug, Clone, Copy, Serialize)]
pub struct TierInfo {
    pub monthly_points: i64,
    pub xp_multiplier: f64,
}

pub trait CostProvider: Send + Sync {
    /// Undiscounted point cost of an action.
    fn base_cost(&self, spend_type: SpendType) -> i64;

    /// Monthly allocation and XP multiplier for a tier.
    fn tier_info(&self, tier: SubscriptionTier) -> TierInfo;
}

pub type DynCostProvider = Arc<dyn CostProvider>;

/// The default, compiled-in cost table.
#[derive(Debug, Default)]
pub struct StaticCostProvider;

impl CostProvider for StaticCostProvider {
    fn base_cost(&self, spend_type: SpendType) -> i64 {
        match spend_type {
            SpendType::JobQuery => 1,
            SpendType::PremiumSearch => 5,
            SpendType::CvSuggestion => 3,
            SpendType::CoverLetter => 10,
        }
    }

    fn tier_info(&self, tier: SubscriptionTier) -> TierInfo {
        match tier {
            SubscriptionTier::Free => TierInfo {
                monthly_points: 50,
                xp_multiplier: 1.0,
            },
            SubscriptionTier::Basic => TierInfo {
                monthly_points: 200,
                xp_multiplier: 1.1,
            },
            SubscriptionTier::Starter => TierInfo {
                monthly_points: 500,
                xp_multiplier: 1.25,
            },
            SubscriptionTier::Pro => TierInfo {
                monthly_points: 1500,
                xp_multiplier: 1.5,
            },
            SubscriptionTier::Expert => TierInfo {
                monthly_points: 5000,
                xp_multiplier: 2.0,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_premium_search_costs_more_than_plain_query() {
        let costs = StaticCostProvider;
        assert!(costs.base_cost(SpendType::PremiumSearch) > costs.base_cost(SpendType::JobQuery));
    }

    #[test]
    fn test_tier_allocations_increase_with_tier() {
        let costs = StaticCostProvider;
        let free = costs.tier_info(SubscriptionTier::Free);
        let expert = costs.tier_info(SubscriptionTier::Expert);
        assert!(expert.monthly_points > free.monthly_points);
        assert!(expert.xp_multiplier > free.xp_multiplier);
    }
}
