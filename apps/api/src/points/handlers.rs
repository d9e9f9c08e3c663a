use axum::{
    extract::{Query, State},
    http::HeaderMap,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::points::costs::CostProvider;
use crate::points::ledger::{
    calculate_available_points, can_afford, effective_cost, validate_spend, Affordability,
};
use crate::points::models::{PointsTransaction, SpendRequest, SpendType};
use crate::points::store::LedgerStore;
use crate::search::handlers::resolve_session;
use crate::session::Session;
use crate::state::AppState;

async fn require_session(state: &AppState, headers: &HeaderMap) -> Result<Session, AppError> {
    resolve_session(state, headers)
        .await?
        .ok_or(AppError::Unauthorized)
}

#[derive(Serialize)]
pub struct BalanceResponse {
    pub developer_id: Uuid,
    pub monthly_points: i64,
    pub points_used: i64,
    pub points_earned: i64,
    pub available: i64,
    pub subscription_tier: String,
    pub reset_date: DateTime<Utc>,
}

/// GET /api/v1/points/balance
pub async fn handle_balance(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<BalanceResponse>, AppError> {
    let session = require_session(&state, &headers).await?;
    let account = state.ledger.get_account(session.user_id).await?;
    Ok(Json(BalanceResponse {
        available: calculate_available_points(
            account.monthly_points,
            account.points_used,
            account.points_earned,
        ),
        developer_id: account.developer_id,
        monthly_points: account.monthly_points,
        points_used: account.points_used,
        points_earned: account.points_earned,
        subscription_tier: account.subscription_tier,
        reset_date: account.reset_date,
    }))
}

#[derive(Deserialize)]
pub struct AffordabilityQuery {
    pub spend_type: SpendType,
}

/// GET /api/v1/points/affordability
///
/// Pure query: reports whether the session's account can cover the
/// tier-discounted cost of an action, and by how much it falls short.
pub async fn handle_affordability(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<AffordabilityQuery>,
) -> Result<Json<Affordability>, AppError> {
    let session = require_session(&state, &headers).await?;
    let account = state.ledger.get_account(session.user_id).await?;

    let cost = effective_cost(state.costs.base_cost(query.spend_type), account.tier());
    let available = calculate_available_points(
        account.monthly_points,
        account.points_used,
        account.points_earned,
    );
    Ok(Json(can_afford(cost, available)))
}

#[derive(Deserialize)]
pub struct TransactionsQuery {
    #[serde(default = "default_transactions_limit")]
    pub limit: i64,
}

fn default_transactions_limit() -> i64 {
    20
}

/// GET /api/v1/points/transactions
pub async fn handle_transactions(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<TransactionsQuery>,
) -> Result<Json<Vec<PointsTransaction>>, AppError> {
    let session = require_session(&state, &headers).await?;
    let limit = query.limit.clamp(1, 100);
    let txns = state
        .ledger
        .recent_transactions(session.user_id, limit)
        .await?;
    Ok(Json(txns))
}

#[derive(Deserialize)]
pub struct SpendBody {
    pub amount: i64,
    pub spend_type: SpendType,
    pub source_id: Option<Uuid>,
    pub description: Option<String>,
}

#[derive(Serialize)]
pub struct SpendResponse {
    pub success: bool,
    pub points_spent: i64,
    pub new_balance: i64,
    pub transaction_id: Uuid,
}

/// POST /api/v1/points/spend
///
/// The claimed amount must match the effective cost the ledger would charge;
/// artifact spend types must name their source. Validation failures never
/// reach the store.
pub async fn handle_spend(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<SpendBody>,
) -> Result<Json<SpendResponse>, AppError> {
    let session = require_session(&state, &headers).await?;
    let account = state.ledger.get_account(session.user_id).await?;

    let expected = effective_cost(state.costs.base_cost(body.spend_type), account.tier());
    let request = SpendRequest {
        user_id: session.user_id,
        amount: body.amount,
        spend_type: body.spend_type,
        source_id: body.source_id,
        description: body.description,
    };
    validate_spend(&request, expected).map_err(|e| AppError::Validation(e.to_string()))?;

    let description = request
        .description
        .unwrap_or_else(|| format!("Manual spend: {}", body.spend_type.as_str()));
    let outcome = state
        .ledger
        .spend(session.user_id, body.spend_type, body.source_id, &description)
        .await?;

    Ok(Json(SpendResponse {
        success: true,
        points_spent: outcome.points_spent,
        new_balance: outcome.new_balance,
        transaction_id: outcome.transaction_id,
    }))
}
