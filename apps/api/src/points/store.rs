//! Atomic spend against the points ledger.
//!
//! CRITICAL INVARIANT: N concurrent spends against a balance sufficient for
//! exactly one must succeed exactly once. The Postgres store enforces this
//! with a row lock inside a single transaction; the in-memory store with a
//! ledger-wide async mutex. A rejected spend leaves the account untouched.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use sqlx::PgPool;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

use crate::points::costs::DynCostProvider;
use crate::points::ledger::{calculate_available_points, effective_cost};
use crate::points::models::{PointsAccount, PointsTransaction, SpendOutcome, SpendType};

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Insufficient points: need {cost}, have {available}")]
    InsufficientPoints {
        cost: i64,
        available: i64,
        shortfall: i64,
    },

    #[error("No points account for user {0}")]
    UserNotFound(Uuid),

    #[error("Ledger store error: {0}")]
    Store(#[from] sqlx::Error),
}

#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn get_account(&self, user_id: Uuid) -> Result<PointsAccount, LedgerError>;

    /// Debits the effective cost of `spend_type` and appends the audit
    /// transaction, atomically. Cost is recomputed from the account row as
    /// read inside the critical section, never from a stale caller snapshot.
    async fn spend(
        &self,
        user_id: Uuid,
        spend_type: SpendType,
        source_id: Option<Uuid>,
        description: &str,
    ) -> Result<SpendOutcome, LedgerError>;

    async fn recent_transactions(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<PointsTransaction>, LedgerError>;
}

pub type DynLedgerStore = Arc<dyn LedgerStore>;

/// Postgres-backed ledger. The spend path is one transaction:
/// `SELECT .. FOR UPDATE` → recompute available → debit + append, or abort.
pub struct PgLedgerStore {
    pool: PgPool,
    costs: DynCostProvider,
}

impl PgLedgerStore {
    pub fn new(pool: PgPool, costs: DynCostProvider) -> Self {
        Self { pool, costs }
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn get_account(&self, user_id: Uuid) -> Result<PointsAccount, LedgerError> {
        sqlx::query_as::<_, PointsAccount>(
            "SELECT developer_id, monthly_points, points_used, points_earned,
                    subscription_tier, reset_date
             FROM points_accounts WHERE developer_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(LedgerError::UserNotFound(user_id))
    }

    async fn spend(
        &self,
        user_id: Uuid,
        spend_type: SpendType,
        source_id: Option<Uuid>,
        description: &str,
    ) -> Result<SpendOutcome, LedgerError> {
        let mut tx = self.pool.begin().await?;

        // Row lock serializes concurrent spends for this account.
        let account: Option<PointsAccount> = sqlx::query_as(
            "SELECT developer_id, monthly_points, points_used, points_earned,
                    subscription_tier, reset_date
             FROM points_accounts WHERE developer_id = $1 FOR UPDATE",
        )
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;
        let account = account.ok_or(LedgerError::UserNotFound(user_id))?;

        let cost = effective_cost(self.costs.base_cost(spend_type), account.tier());
        let available = calculate_available_points(
            account.monthly_points,
            account.points_used,
            account.points_earned,
        );
        if available < cost {
            // Dropping `tx` rolls back; the account row is untouched.
            return Err(LedgerError::InsufficientPoints {
                cost,
                available,
                shortfall: cost - available,
            });
        }

        sqlx::query("UPDATE points_accounts SET points_used = points_used + $1 WHERE developer_id = $2")
            .bind(cost)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        let transaction_id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO points_transactions
                (id, developer_id, amount, spend_type, source, description, metadata, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, now())",
        )
        .bind(transaction_id)
        .bind(user_id)
        .bind(-cost)
        .bind(spend_type.as_str())
        .bind(source_id)
        .bind(description)
        .bind(json!({ "tier": account.subscription_tier }))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        let new_balance = available - cost;
        info!(
            "Spent {cost} points ({}) for user {user_id}, balance {new_balance}",
            spend_type.as_str()
        );
        Ok(SpendOutcome {
            points_spent: cost,
            new_balance,
            transaction_id,
        })
    }

    async fn recent_transactions(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<PointsTransaction>, LedgerError> {
        Ok(sqlx::query_as::<_, PointsTransaction>(
            "SELECT id, developer_id, amount, spend_type, source, description, metadata, created_at
             FROM points_transactions
             WHERE developer_id = $1
             ORDER BY created_at DESC
             LIMIT $2",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?)
    }
}

/// In-memory ledger for tests and local development. A single async mutex
/// over the whole map is coarser than a per-account lock but gives the same
/// exactly-once guarantee.
pub struct MemoryLedgerStore {
    costs: DynCostProvider,
    inner: Mutex<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    accounts: HashMap<Uuid, PointsAccount>,
    transactions: Vec<PointsTransaction>,
}

impl MemoryLedgerStore {
    pub fn new(costs: DynCostProvider) -> Self {
        Self {
            costs,
            inner: Mutex::new(MemoryInner::default()),
        }
    }

    pub async fn insert_account(&self, account: PointsAccount) {
        self.inner
            .lock()
            .await
            .accounts
            .insert(account.developer_id, account);
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn get_account(&self, user_id: Uuid) -> Result<PointsAccount, LedgerError> {
        self.inner
            .lock()
            .await
            .accounts
            .get(&user_id)
            .cloned()
            .ok_or(LedgerError::UserNotFound(user_id))
    }

    async fn spend(
        &self,
        user_id: Uuid,
        spend_type: SpendType,
        source_id: Option<Uuid>,
        description: &str,
    ) -> Result<SpendOutcome, LedgerError> {
        let mut inner = self.inner.lock().await;
        let account = inner
            .accounts
            .get(&user_id)
            .ok_or(LedgerError::UserNotFound(user_id))?;

        let cost = effective_cost(self.costs.base_cost(spend_type), account.tier());
        let available = calculate_available_points(
            account.monthly_points,
            account.points_used,
            account.points_earned,
        );
        if available < cost {
            return Err(LedgerError::InsufficientPoints {
                cost,
                available,
                shortfall: cost - available,
            });
        }

        let tier = account.subscription_tier.clone();
        let account = inner.accounts.get_mut(&user_id).expect("checked above");
        account.points_used += cost;

        let transaction_id = Uuid::new_v4();
        inner.transactions.push(PointsTransaction {
            id: transaction_id,
            developer_id: user_id,
            amount: -cost,
            spend_type: spend_type.as_str().to_string(),
            source: source_id,
            description: description.to_string(),
            metadata: json!({ "tier": tier }),
            created_at: Utc::now(),
        });

        Ok(SpendOutcome {
            points_spent: cost,
            new_balance: available - cost,
            transaction_id,
        })
    }

    async fn recent_transactions(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<PointsTransaction>, LedgerError> {
        let inner = self.inner.lock().await;
        let mut txns: Vec<_> = inner
            .transactions
            .iter()
            .filter(|t| t.developer_id == user_id)
            .cloned()
            .collect();
        txns.reverse();
        txns.truncate(limit.max(0) as usize);
        Ok(txns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::points::costs::StaticCostProvider;

    fn account(user_id: Uuid, monthly: i64, used: i64, earned: i64, tier: &str) -> PointsAccount {
        PointsAccount {
            developer_id: user_id,
            monthly_points: monthly,
            points_used: used,
            points_earned: earned,
            subscription_tier: tier.to_string(),
            reset_date: Utc::now(),
        }
    }

    fn memory_store() -> Arc<MemoryLedgerStore> {
        Arc::new(MemoryLedgerStore::new(Arc::new(StaticCostProvider)))
    }

    #[tokio::test]
    async fn test_spend_job_query_scenario() {
        let store = memory_store();
        let user = Uuid::new_v4();
        store.insert_account(account(user, 100, 30, 10, "free")).await;

        let outcome = store
            .spend(user, SpendType::JobQuery, None, "job search")
            .await
            .unwrap();
        assert_eq!(outcome.points_spent, 1);
        assert_eq!(outcome.new_balance, 79);
    }

    #[tokio::test]
    async fn test_failed_spend_leaves_account_unchanged() {
        let store = memory_store();
        let user = Uuid::new_v4();
        store.insert_account(account(user, 3, 0, 0, "free")).await;

        let err = store
            .spend(user, SpendType::PremiumSearch, None, "premium")
            .await
            .unwrap_err();
        match err {
            LedgerError::InsufficientPoints {
                cost,
                available,
                shortfall,
            } => {
                assert_eq!(cost, 5);
                assert_eq!(available, 3);
                assert_eq!(shortfall, 2);
            }
            other => panic!("expected InsufficientPoints, got {other:?}"),
        }

        let acct = store.get_account(user).await.unwrap();
        assert_eq!(acct.points_used, 0);
        assert!(store.recent_transactions(user, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_spends_debit_exactly_once() {
        let store = memory_store();
        let user = Uuid::new_v4();
        // Available = 15; CoverLetter at FREE costs 10; only one can fit.
        store.insert_account(account(user, 15, 0, 0, "free")).await;

        let a = {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .spend(user, SpendType::CoverLetter, Some(Uuid::new_v4()), "cl")
                    .await
            })
        };
        let b = {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .spend(user, SpendType::CoverLetter, Some(Uuid::new_v4()), "cl")
                    .await
            })
        };

        let results = [a.await.unwrap(), b.await.unwrap()];
        let successes: Vec<_> = results.iter().filter(|r| r.is_ok()).collect();
        assert_eq!(successes.len(), 1, "exactly one spend must win");
        let outcome = successes[0].as_ref().unwrap();
        assert_eq!(outcome.new_balance, 5);

        let failure = results.iter().find(|r| r.is_err()).unwrap();
        match failure.as_ref().unwrap_err() {
            LedgerError::InsufficientPoints { shortfall, .. } => assert_eq!(*shortfall, 5),
            other => panic!("expected InsufficientPoints, got {other:?}"),
        }

        // The account reflects exactly one debit.
        let acct = store.get_account(user).await.unwrap();
        assert_eq!(acct.points_used, 10);
        assert_eq!(store.recent_transactions(user, 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_spend_applies_tier_discount() {
        let store = memory_store();
        let user = Uuid::new_v4();
        store.insert_account(account(user, 100, 0, 0, "pro")).await;

        let outcome = store
            .spend(user, SpendType::CoverLetter, Some(Uuid::new_v4()), "cl")
            .await
            .unwrap();
        // base 10 at PRO 0.85 -> ceil(8.5) = 9
        assert_eq!(outcome.points_spent, 9);
        assert_eq!(outcome.new_balance, 91);
    }

    #[tokio::test]
    async fn test_unknown_user() {
        let store = memory_store();
        let err = store
            .spend(Uuid::new_v4(), SpendType::JobQuery, None, "q")
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::UserNotFound(_)));
    }

    #[tokio::test]
    async fn test_transactions_are_negative_and_traceable() {
        let store = memory_store();
        let user = Uuid::new_v4();
        store.insert_account(account(user, 100, 0, 0, "free")).await;

        let source = Uuid::new_v4();
        store
            .spend(user, SpendType::CvSuggestion, Some(source), "suggestion")
            .await
            .unwrap();

        let txns = store.recent_transactions(user, 10).await.unwrap();
        assert_eq!(txns.len(), 1);
        assert_eq!(txns[0].amount, -3);
        assert_eq!(txns[0].source, Some(source));
        assert_eq!(txns[0].spend_type, "cv_suggestion");
    }
}
