//! Crashpoint - Provably Fair Crash Game Server
//!
//! A shared multiplier climbs from 1.00 until it hits a crash point that
//! was fixed and hash-committed before any bet was taken. Players stake
//! USD amounts converted to crypto at oracle prices, then race the crash
//! to cash out. Revealed seeds let anyone recompute past rounds.

pub mod accounts;
pub mod api;
pub mod config;
pub mod errors;
pub mod game;
pub mod oracle;
pub mod round_store;
pub mod storage;

pub use accounts::{Account, AccountStore, Wallet};
pub use config::{AppConfig, ConfigLoader};
pub use errors::{AccountError, ConfigError, GameError, GameResult, OracleError, StorageError};
pub use game::engine::{EngineHandle, GameEngine};
pub use game::types::{Bet, BetStatus, Currency, RoundStatus};
