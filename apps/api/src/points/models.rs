use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Paid actions that debit a user's point balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpendType {
    JobQuery,
    PremiumSearch,
    CoverLetter,
    CvSuggestion,
}

impl SpendType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpendType::JobQuery => "job_query",
            SpendType::PremiumSearch => "premium_search",
            SpendType::CoverLetter => "cover_letter",
            SpendType::CvSuggestion => "cv_suggestion",
        }
    }

    /// Spend types that reference a generated artifact must carry a
    /// `source_id` so the debit is traceable to the thing it paid for.
    pub fn requires_source(&self) -> bool {
        matches!(self, SpendType::CoverLetter | SpendType::CvSuggestion)
    }
}

/// Subscription tiers, ordered worst to best.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionTier {
    Free,
    Basic,
    Starter,
    Pro,
    Expert,
}

impl SubscriptionTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionTier::Free => "free",
            SubscriptionTier::Basic => "basic",
            SubscriptionTier::Starter => "starter",
            SubscriptionTier::Pro => "pro",
            SubscriptionTier::Expert => "expert",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "free" => Some(SubscriptionTier::Free),
            "basic" => Some(SubscriptionTier::Basic),
            "starter" => Some(SubscriptionTier::Starter),
            "pro" => Some(SubscriptionTier::Pro),
            "expert" => Some(SubscriptionTier::Expert),
            _ => None,
        }
    }

    pub fn is_paid(&self) -> bool {
        *self != SubscriptionTier::Free
    }
}

/// A user's point balance row. Owned exclusively by the ledger store and
/// mutated only through its atomic spend path.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PointsAccount {
    pub developer_id: Uuid,
    pub monthly_points: i64,
    pub points_used: i64,
    pub points_earned: i64,
    pub subscription_tier: String,
    pub reset_date: DateTime<Utc>,
}

impl PointsAccount {
    pub fn tier(&self) -> SubscriptionTier {
        SubscriptionTier::parse(&self.subscription_tier).unwrap_or(SubscriptionTier::Free)
    }
}

/// Immutable audit record, one per successful spend. Never updated or
/// deleted; `amount` is negative for debits.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PointsTransaction {
    pub id: Uuid,
    pub developer_id: Uuid,
    pub amount: i64,
    pub spend_type: String,
    pub source: Option<Uuid>,
    pub description: String,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Client-supplied spend, validated against the expected effective cost
/// before it is allowed anywhere near the ledger.
#[derive(Debug, Clone, Deserialize)]
pub struct SpendRequest {
    pub user_id: Uuid,
    pub amount: i64,
    pub spend_type: SpendType,
    pub source_id: Option<Uuid>,
    pub description: Option<String>,
}

/// Result of a successful atomic spend.
#[derive(Debug, Clone, Serialize)]
pub struct SpendOutcome {
    pub points_spent: i64,
    pub new_balance: i64,
    pub transaction_id: Uuid,
}
