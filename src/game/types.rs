//! Core types shared by the engine, the API layer and the archive

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Supported wallet currencies
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Btc,
    Eth,
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Currency::Btc => write!(f, "BTC"),
            Currency::Eth => write!(f, "ETH"),
        }
    }
}

/// Lifecycle of a single bet within its round
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BetStatus {
    Active,
    CashedOut,
    Crashed,
}

impl fmt::Display for BetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BetStatus::Active => write!(f, "active"),
            BetStatus::CashedOut => write!(f, "cashed_out"),
            BetStatus::Crashed => write!(f, "crashed"),
        }
    }
}

/// Phase of the live round
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RoundStatus {
    /// Betting window between rounds
    Waiting,
    /// Multiplier is climbing, cashouts are open
    Running,
    /// Terminal instant of a round, before the next betting window opens
    Crashed,
}

impl fmt::Display for RoundStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoundStatus::Waiting => write!(f, "waiting"),
            RoundStatus::Running => write!(f, "running"),
            RoundStatus::Crashed => write!(f, "crashed"),
        }
    }
}

/// A single player's stake in one round
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Bet {
    pub player_id: Uuid,
    /// Stake as entered by the player, in USD
    pub usd_amount: f64,
    /// Stake converted to the chosen currency at placement time
    pub crypto_amount: f64,
    pub currency: Currency,
    pub status: BetStatus,
    /// Multiplier locked in at cashout, absent until then
    pub cashout_multiplier: Option<f64>,
    /// Credited winnings in the bet currency, zero unless cashed out
    pub payout_crypto: f64,
    /// USD price of the bet currency when the stake was converted
    pub price_at_bet: f64,
}

impl Bet {
    pub fn new(
        player_id: Uuid,
        usd_amount: f64,
        crypto_amount: f64,
        currency: Currency,
        price_at_bet: f64,
    ) -> Self {
        Self {
            player_id,
            usd_amount,
            crypto_amount,
            currency,
            status: BetStatus::Active,
            cashout_multiplier: None,
            payout_crypto: 0.0,
            price_at_bet,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_currency_serialization() {
        assert_eq!(serde_json::to_string(&Currency::Btc).unwrap(), "\"BTC\"");
        assert_eq!(serde_json::to_string(&Currency::Eth).unwrap(), "\"ETH\"");

        let parsed: Currency = serde_json::from_str("\"BTC\"").unwrap();
        assert_eq!(parsed, Currency::Btc);
    }

    #[test]
    fn test_status_wire_format() {
        assert_eq!(
            serde_json::to_string(&BetStatus::CashedOut).unwrap(),
            "\"cashed_out\""
        );
        assert_eq!(
            serde_json::to_string(&RoundStatus::Waiting).unwrap(),
            "\"waiting\""
        );
    }

    #[test]
    fn test_new_bet_is_active() {
        let bet = Bet::new(Uuid::new_v4(), 100.0, 0.001, Currency::Btc, 95_000.0);
        assert_eq!(bet.status, BetStatus::Active);
        assert_eq!(bet.cashout_multiplier, None);
        assert_eq!(bet.payout_crypto, 0.0);
    }
}
