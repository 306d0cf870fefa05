//! Request Handlers
//!
//! Thin HTTP layer over the engine, account store and round archive.
//! Handlers validate and price requests, then hand them to the engine;
//! all round-state decisions happen inside the engine task.

use super::{
    errors::ApiError,
    middleware::RequestId,
    models::*,
    monitoring::MetricsRegistry,
    websocket::WsManager,
};
use crate::{
    accounts::AccountStore,
    game::{
        clock,
        engine::{EngineHandle, PlaceBetRequest},
        fairness,
        types::Currency,
    },
    oracle::PriceSource,
    round_store::RoundStore,
};
use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

/// Shared application state
pub struct AppState {
    pub engine: EngineHandle,
    pub accounts: Arc<AccountStore>,
    pub oracle: Arc<dyn PriceSource>,
    pub rounds: RoundStore,
    pub ws: WsManager,
    pub metrics: MetricsRegistry,
    pub version: String,
}

/// Health check handler - minimal response time
/// GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "Running".to_string(),
    })
}

/// Account creation handler
/// POST /api/users
pub async fn create_user_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateUserRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let username = request.username.trim();
    if username.is_empty() {
        return Err(ApiError::bad_request(
            request_id.0,
            "Username must not be empty".to_string(),
        ));
    }

    let account = state
        .accounts
        .create(username)
        .map_err(|e| ApiError::from_game_error(request_id.0.clone(), e.into()))?;

    Ok(Json(UserResponse {
        user_id: account.id,
        username: account.username,
        wallet: account.wallet,
    }))
}

/// Wallet handler with USD conversions at current prices
/// GET /api/users/{user_id}/wallet
pub async fn wallet_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<WalletResponse>, ApiError> {
    let account = state.accounts.get(user_id).ok_or_else(|| {
        ApiError::not_found(request_id.0.clone(), "User not found".to_string())
    })?;

    let prices = state.oracle.prices().await;
    let btc_usd = account.wallet.balance(Currency::Btc) * prices.btc_usd;
    let eth_usd = account.wallet.balance(Currency::Eth) * prices.eth_usd;

    Ok(Json(WalletResponse {
        user_id: account.id,
        username: account.username,
        wallet: account.wallet,
        usd_equivalents: UsdEquivalents {
            btc: clock::round2(btc_usd),
            eth: clock::round2(eth_usd),
            total: clock::round2(btc_usd + eth_usd),
        },
    }))
}

/// Transaction list query parameters
#[derive(Debug, Deserialize)]
pub struct TransactionsQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    50
}

/// Player transaction history, newest first
/// GET /api/users/{user_id}/transactions?limit={n}
pub async fn transactions_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
    Query(params): Query<TransactionsQuery>,
) -> Result<Json<TransactionsResponse>, ApiError> {
    if state.accounts.get(user_id).is_none() {
        return Err(ApiError::not_found(
            request_id.0,
            "User not found".to_string(),
        ));
    }

    // Enforce maximum limit
    let limit = params.limit.min(100);

    let transactions = state
        .rounds
        .player_transactions(user_id, limit)
        .map_err(|e| {
            ApiError::internal_error(
                request_id.0.clone(),
                format!("Failed to load transactions: {}", e),
            )
        })?;

    let count = transactions.len();

    Ok(Json(TransactionsResponse {
        transactions,
        count,
    }))
}

/// Bet placement handler
/// POST /api/game/bet
pub async fn place_bet_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Json(request): Json<BetRequest>,
) -> Result<Json<BetResponse>, ApiError> {
    if !request.usd_amount.is_finite() || request.usd_amount <= 0.0 {
        return Err(ApiError::bad_request(
            request_id.0,
            "Bet amount must be a positive number".to_string(),
        ));
    }

    if state.accounts.get(request.player_id).is_none() {
        return Err(ApiError::not_found(
            request_id.0,
            "User not found".to_string(),
        ));
    }

    // Price the stake before it enters the engine; the conversion rate is
    // frozen into the bet.
    let prices = state.oracle.prices().await;
    let price_at_time = prices.usd_price(request.currency);
    let crypto_amount = request.usd_amount / price_at_time;

    let receipt = state
        .engine
        .place_bet(PlaceBetRequest {
            player_id: request.player_id,
            usd_amount: request.usd_amount,
            crypto_amount,
            currency: request.currency,
            price_at_time,
        })
        .await
        .map_err(|e| ApiError::from_game_error(request_id.0.clone(), e))?;

    state.metrics.record_bet();

    Ok(Json(BetResponse {
        message: "Bet placed".to_string(),
        round_id: receipt.round_id,
        crypto_amount: receipt.crypto_amount,
        currency: receipt.currency,
        price_at_time,
        new_balance: receipt.new_balance,
    }))
}

/// Cashout handler
/// POST /api/game/cashout
pub async fn cashout_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Json(request): Json<CashoutRequest>,
) -> Result<Json<CashoutResponse>, ApiError> {
    let receipt = state
        .engine
        .cash_out(request.player_id)
        .await
        .map_err(|e| ApiError::from_game_error(request_id.0.clone(), e))?;

    state.metrics.record_cashout();

    Ok(Json(CashoutResponse {
        username: receipt.username,
        cashout_multiplier: receipt.cashout_multiplier,
        payout_crypto: receipt.payout_crypto,
        currency: receipt.currency,
    }))
}

/// Live round state handler
/// GET /api/game/state
pub async fn game_state_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<GameStateResponse>, ApiError> {
    let snapshot = state
        .engine
        .snapshot()
        .await
        .map_err(|e| ApiError::from_game_error(request_id.0, e))?;

    Ok(Json(GameStateResponse::from(snapshot)))
}

/// Round history query parameters
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default = "default_history_limit")]
    pub limit: usize,
}

fn default_history_limit() -> usize {
    20
}

/// Finished rounds, newest first
/// GET /api/game/history?limit={n}
pub async fn history_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Query(params): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, ApiError> {
    // Enforce maximum limit
    let limit = params.limit.min(100);

    let rounds = state.rounds.recent_rounds(limit).map_err(|e| {
        ApiError::internal_error(
            request_id.0.clone(),
            format!("Failed to load rounds: {}", e),
        )
    })?;

    let count = rounds.len();

    Ok(Json(HistoryResponse { rounds, count }))
}

/// Fairness verification query parameters
#[derive(Debug, Deserialize)]
pub struct VerifyQuery {
    pub seed: String,
}

/// Recompute the crash point and commitment hash for a revealed seed
/// GET /api/game/verify?seed={seed}
pub async fn verify_handler(
    Extension(request_id): Extension<RequestId>,
    Query(params): Query<VerifyQuery>,
) -> Result<Json<VerifyResponse>, ApiError> {
    if params.seed.is_empty() {
        return Err(ApiError::bad_request(
            request_id.0,
            "Seed must not be empty".to_string(),
        ));
    }

    let outcome = fairness::generate(&params.seed);

    Ok(Json(VerifyResponse {
        seed: params.seed,
        fairness_hash: outcome.hash,
        crash_point: outcome.crash_point,
    }))
}
