//! API Request/Response Models
//!
//! All request and response types for the API endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::accounts::Wallet;
use crate::game::engine::EngineSnapshot;
use crate::game::types::{Currency, RoundStatus};
use crate::round_store::{RoundRecord, TransactionRecord};

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

/// Account creation request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
}

/// Account creation response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub user_id: Uuid,
    pub username: String,
    pub wallet: Wallet,
}

/// Wallet view with USD conversions at current prices
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletResponse {
    pub user_id: Uuid,
    pub username: String,
    pub wallet: Wallet,
    pub usd_equivalents: UsdEquivalents,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsdEquivalents {
    #[serde(rename = "BTC")]
    pub btc: f64,
    #[serde(rename = "ETH")]
    pub eth: f64,
    pub total: f64,
}

/// Bet placement request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BetRequest {
    pub player_id: Uuid,
    pub usd_amount: f64,
    pub currency: Currency,
}

/// Bet placement response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BetResponse {
    pub message: String,
    pub round_id: Uuid,
    pub crypto_amount: f64,
    pub currency: Currency,
    pub price_at_time: f64,
    pub new_balance: f64,
}

/// Cashout request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CashoutRequest {
    pub player_id: Uuid,
}

/// Cashout response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CashoutResponse {
    pub username: String,
    pub cashout_multiplier: f64,
    pub payout_crypto: f64,
    pub currency: Currency,
}

/// Live round state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameStateResponse {
    pub round_id: Uuid,
    pub status: RoundStatus,
    pub multiplier: f64,
    /// Commitment hash, absent while the round waits
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fairness_hash: Option<String>,
    pub bet_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
}

impl From<EngineSnapshot> for GameStateResponse {
    fn from(snapshot: EngineSnapshot) -> Self {
        Self {
            round_id: snapshot.round_id,
            status: snapshot.status,
            multiplier: snapshot.multiplier,
            fairness_hash: snapshot.fairness_hash,
            bet_count: snapshot.bet_count,
            started_at: snapshot.started_at,
        }
    }
}

/// Finished rounds, newest first
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub rounds: Vec<RoundRecord>,
    pub count: usize,
}

/// A player's wallet movements, newest first
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionsResponse {
    pub transactions: Vec<TransactionRecord>,
    pub count: usize,
}

/// Fairness verification result for a revealed seed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub seed: String,
    pub fairness_hash: String,
    pub crash_point: f64,
}
