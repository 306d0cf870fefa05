//! Error types for the crash game service

use thiserror::Error;

use crate::game::types::Currency;

/// Errors returned by round-mutating game operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GameError {
    #[error("Betting is closed for the current round")]
    BettingClosed,

    #[error("No running round to cash out from")]
    NotRunning,

    #[error("A round is already in progress")]
    NotWaiting,

    #[error("No active bet found for this player")]
    NoActiveBet,

    #[error(transparent)]
    Account(#[from] AccountError),

    #[error("Game engine is unavailable")]
    EngineUnavailable,
}

/// Account and wallet errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AccountError {
    #[error("User not found")]
    NotFound,

    #[error("Insufficient {currency} balance")]
    InsufficientFunds { currency: Currency },

    #[error("Username is already taken")]
    UsernameTaken,
}

/// Archive storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rocksdb::Error),

    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupted data: {0}")]
    CorruptedData(String),
}

/// Price oracle errors
#[derive(Error, Debug)]
pub enum OracleError {
    #[error("Price request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Malformed price response: {0}")]
    MalformedResponse(String),
}

/// Configuration loading and validation errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("Invalid value for {field}: '{value}' ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Convenience type alias for game operation results
pub type GameResult<T> = Result<T, GameError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GameError::BettingClosed;
        assert_eq!(err.to_string(), "Betting is closed for the current round");

        let err = AccountError::InsufficientFunds {
            currency: Currency::Btc,
        };
        assert_eq!(err.to_string(), "Insufficient BTC balance");
    }

    #[test]
    fn test_account_error_conversion() {
        let err: GameError = AccountError::NotFound.into();
        assert_eq!(err, GameError::Account(AccountError::NotFound));
        assert_eq!(err.to_string(), "User not found");
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::InvalidValue {
            field: "server.port".to_string(),
            value: "0".to_string(),
            reason: "port must be non-zero".to_string(),
        };
        assert!(err.to_string().contains("server.port"));
        assert!(err.to_string().contains("'0'"));
    }
}
