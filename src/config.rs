//! Service configuration with validation and defaults
//!
//! Layering order: compiled defaults, then an optional TOML file, then
//! CRASHPOINT_* environment variables, then CLI flags applied by main.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

use crate::errors::ConfigError;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub game: GameConfig,
    pub oracle: OracleConfig,
    pub storage: StorageConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            game: GameConfig::default(),
            oracle: OracleConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

/// HTTP server settings
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// CORS origins; `*` allows any origin
    pub allowed_origins: Vec<String>,
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            allowed_origins: vec!["*".to_string()],
            request_timeout_secs: 30,
        }
    }
}

/// Round cadence settings
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GameConfig {
    /// Betting window between a crash and the next round start
    pub round_interval_ms: u64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            round_interval_ms: 10_000,
        }
    }
}

/// Price oracle settings
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OracleConfig {
    pub endpoint: String,
    pub timeout_ms: u64,
    pub cache_ttl_ms: u64,
    /// Prices served when the oracle is unreachable and no cache exists
    pub fallback_btc_usd: f64,
    pub fallback_eth_usd: f64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            endpoint:
                "https://api.coingecko.com/api/v3/simple/price?ids=bitcoin,ethereum&vs_currencies=usd"
                    .to_string(),
            timeout_ms: 5_000,
            cache_ttl_ms: 10_000,
            fallback_btc_usd: 95_000.0,
            fallback_eth_usd: 3_400.0,
        }
    }
}

/// Archive database settings
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: "./data/crashpoint-db".to_string(),
        }
    }
}

impl AppConfig {
    /// Validate for logical consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::InvalidValue {
                field: "server.port".to_string(),
                value: "0".to_string(),
                reason: "port must be non-zero".to_string(),
            });
        }
        if self.server.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "server.request_timeout_secs".to_string(),
                value: "0".to_string(),
                reason: "requests need a non-zero timeout".to_string(),
            });
        }
        if self.game.round_interval_ms < 100 {
            return Err(ConfigError::InvalidValue {
                field: "game.round_interval_ms".to_string(),
                value: self.game.round_interval_ms.to_string(),
                reason: "betting window must be at least one tick (100ms)".to_string(),
            });
        }
        if self.oracle.timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "oracle.timeout_ms".to_string(),
                value: "0".to_string(),
                reason: "oracle requests need a non-zero timeout".to_string(),
            });
        }
        if self.oracle.fallback_btc_usd <= 0.0 || self.oracle.fallback_eth_usd <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "oracle.fallback prices".to_string(),
                value: format!(
                    "BTC {} ETH {}",
                    self.oracle.fallback_btc_usd, self.oracle.fallback_eth_usd
                ),
                reason: "fallback prices must be positive".to_string(),
            });
        }
        if self.storage.db_path.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "storage.db_path".to_string(),
                value: String::new(),
                reason: "database path is required".to_string(),
            });
        }
        Ok(())
    }
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl GameConfig {
    pub fn round_interval(&self) -> Duration {
        Duration::from_millis(self.round_interval_ms)
    }
}

impl OracleConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }
}

/// Loads configuration from file and environment.
pub struct ConfigLoader {
    config_path: Option<String>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self { config_path: None }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    /// Load, apply environment overrides, validate.
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        let mut config = match &self.config_path {
            Some(path) => Self::load_from_file(path)?,
            None => AppConfig::default(),
        };
        Self::apply_env_overrides(&mut config)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<AppConfig, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::LoadFailed(format!("{}: {}", path.as_ref().display(), e)))?;
        toml::from_str(&content).map_err(|e| ConfigError::LoadFailed(e.to_string()))
    }

    fn apply_env_overrides(config: &mut AppConfig) -> Result<(), ConfigError> {
        if let Ok(host) = env::var("CRASHPOINT_HOST") {
            config.server.host = host;
        }
        if let Ok(port) = env::var("CRASHPOINT_PORT") {
            config.server.port = port.parse().map_err(|_| ConfigError::InvalidValue {
                field: "CRASHPOINT_PORT".to_string(),
                value: port.clone(),
                reason: "not a valid port number".to_string(),
            })?;
        }
        if let Ok(interval) = env::var("CRASHPOINT_ROUND_INTERVAL_MS") {
            config.game.round_interval_ms =
                interval.parse().map_err(|_| ConfigError::InvalidValue {
                    field: "CRASHPOINT_ROUND_INTERVAL_MS".to_string(),
                    value: interval.clone(),
                    reason: "not a valid millisecond count".to_string(),
                })?;
        }
        if let Ok(endpoint) = env::var("CRASHPOINT_ORACLE_ENDPOINT") {
            config.oracle.endpoint = endpoint;
        }
        if let Ok(db_path) = env::var("CRASHPOINT_DB_PATH") {
            config.storage.db_path = db_path;
        }
        Ok(())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.game.round_interval_ms, 10_000);
        assert_eq!(config.oracle.fallback_btc_usd, 95_000.0);
    }

    #[test]
    fn test_duration_conversions() {
        let config = AppConfig::default();
        assert_eq!(config.game.round_interval(), Duration::from_secs(10));
        assert_eq!(config.oracle.timeout(), Duration::from_secs(5));
        assert_eq!(config.oracle.cache_ttl(), Duration::from_secs(10));
        assert_eq!(config.server.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[server]\nport = 8080\n\n[game]\nround_interval_ms = 5000"
        )
        .unwrap();

        let config = ConfigLoader::load_from_file(file.path()).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.game.round_interval_ms, 5_000);
        // Sections absent from the file fall back to defaults.
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.storage.db_path, "./data/crashpoint-db");
        assert_eq!(config.oracle.timeout_ms, 5_000);
    }

    #[test]
    fn test_malformed_file_is_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[server\nport = not-a-number").unwrap();

        let err = ConfigLoader::load_from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::LoadFailed(_)));
    }

    #[test]
    fn test_missing_file_is_rejected() {
        let err = ConfigLoader::load_from_file("/nonexistent/config.toml").unwrap_err();
        assert!(matches!(err, ConfigError::LoadFailed(_)));
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.server.port = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.game.round_interval_ms = 50;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.storage.db_path = String::new();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.oracle.fallback_btc_usd = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_overrides() {
        env::set_var("CRASHPOINT_PORT", "4000");
        env::set_var("CRASHPOINT_DB_PATH", "/tmp/crash-test-db");

        let mut config = AppConfig::default();
        ConfigLoader::apply_env_overrides(&mut config).unwrap();
        assert_eq!(config.server.port, 4000);
        assert_eq!(config.storage.db_path, "/tmp/crash-test-db");

        env::set_var("CRASHPOINT_PORT", "not-a-port");
        let mut config = AppConfig::default();
        let err = ConfigLoader::apply_env_overrides(&mut config).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));

        env::remove_var("CRASHPOINT_PORT");
        env::remove_var("CRASHPOINT_DB_PATH");
    }
}
