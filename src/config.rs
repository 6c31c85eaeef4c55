//! # Configuration
//!
//! Layered configuration for the order/reservation core:
//!
//! 1. built-in defaults (`ComandaConfig::default()`)
//! 2. `config/comanda.toml` (optional)
//! 3. `config/comanda.<environment>.toml` (optional)
//! 4. `COMANDA__SECTION__KEY` environment variables
//! 5. `DATABASE_URL`, which always wins for `database.url`
//!
//! The environment name comes from `COMANDA_ENV` (default `development`).

use std::path::{Path, PathBuf};

use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

pub type ConfigResult<T> = Result<T, ConfigurationError>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ComandaConfig {
    pub database: DatabaseConfig,
    pub transactions: TransactionConfig,
    pub broadcaster: BroadcasterConfig,
    pub orders: OrderConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TransactionConfig {
    /// Deadline applied when the caller does not supply one
    pub default_timeout_ms: u64,
    /// Automatic retries for serialization failures and deadlocks
    pub serialization_retries: u32,
    pub retry_backoff_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BroadcasterConfig {
    /// Capacity of the outbound queue between writers and the dispatcher
    pub queue_capacity: usize,
    /// Per-connection FIFO buffer; a full buffer drops events for that listener
    pub subscriber_buffer: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct OrderConfig {
    /// New orders start in `confirmado` instead of `pendiente_confirmacion`
    pub auto_confirm: bool,
}

impl Default for ComandaConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            transactions: TransactionConfig::default(),
            broadcaster: BroadcasterConfig::default(),
            orders: OrderConfig::default(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgresql://localhost/comanda_development".to_string(),
            max_connections: 20,
            min_connections: 2,
            acquire_timeout_seconds: 5,
        }
    }
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: 5_000,
            serialization_retries: 1,
            retry_backoff_ms: 25,
        }
    }
}

impl Default for BroadcasterConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1_024,
            subscriber_buffer: 256,
        }
    }
}

impl ComandaConfig {
    /// Load from `./config` for the environment named by `COMANDA_ENV`.
    pub fn load() -> ConfigResult<Self> {
        Self::load_from(&default_config_directory(), &detect_environment())
    }

    /// Load from an explicit directory and environment.
    pub fn load_from(config_dir: &Path, environment: &str) -> ConfigResult<Self> {
        let base = config_dir.join("comanda.toml");
        let per_env = config_dir.join(format!("comanda.{environment}.toml"));

        let mut config: ComandaConfig = Config::builder()
            .add_source(Config::try_from(&ComandaConfig::default())?)
            .add_source(File::new(&base.to_string_lossy(), FileFormat::Toml).required(false))
            .add_source(File::new(&per_env.to_string_lossy(), FileFormat::Toml).required(false))
            .add_source(
                Environment::with_prefix("COMANDA")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        if let Ok(url) = std::env::var("DATABASE_URL") {
            config.database.url = url;
        }

        config.validate()?;

        debug!(
            environment = environment,
            config_dir = %config_dir.display(),
            max_connections = config.database.max_connections,
            default_timeout_ms = config.transactions.default_timeout_ms,
            "Configuration loaded"
        );

        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.database.url.trim().is_empty() {
            return Err(invalid("database.url", "must not be empty"));
        }
        if self.database.max_connections == 0 {
            return Err(invalid("database.max_connections", "must be at least 1"));
        }
        if self.database.min_connections > self.database.max_connections {
            return Err(invalid(
                "database.min_connections",
                "must not exceed max_connections",
            ));
        }
        if self.transactions.default_timeout_ms == 0 {
            return Err(invalid("transactions.default_timeout_ms", "must be positive"));
        }
        if self.broadcaster.queue_capacity == 0 {
            return Err(invalid("broadcaster.queue_capacity", "must be at least 1"));
        }
        if self.broadcaster.subscriber_buffer == 0 {
            return Err(invalid("broadcaster.subscriber_buffer", "must be at least 1"));
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigurationError {
    ConfigurationError::InvalidValue {
        field,
        reason: reason.to_string(),
    }
}

pub fn detect_environment() -> String {
    std::env::var("COMANDA_ENV").unwrap_or_else(|_| "development".to_string())
}

fn default_config_directory() -> PathBuf {
    PathBuf::from("config")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_defaults_are_valid() {
        let config = ComandaConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.transactions.serialization_retries, 1);
        assert!(!config.orders.auto_confirm);
    }

    #[test]
    fn test_environment_file_overrides_base_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("comanda.toml"),
            "[broadcaster]\nqueue_capacity = 64\nsubscriber_buffer = 8\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("comanda.staging.toml"),
            "[broadcaster]\nsubscriber_buffer = 4\n\n[orders]\nauto_confirm = true\n",
        )
        .unwrap();

        let config = ComandaConfig::load_from(dir.path(), "staging").unwrap();

        assert_eq!(config.broadcaster.queue_capacity, 64);
        assert_eq!(config.broadcaster.subscriber_buffer, 4);
        assert!(config.orders.auto_confirm);
        assert_eq!(config.transactions.default_timeout_ms, 5_000);
    }

    #[test]
    fn test_missing_files_fall_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ComandaConfig::load_from(dir.path(), "test").unwrap();
        assert_eq!(config.broadcaster, BroadcasterConfig::default());
    }

    #[test]
    fn test_zero_capacity_is_rejected() {
        let mut config = ComandaConfig::default();
        config.broadcaster.subscriber_buffer = 0;

        match config.validate() {
            Err(ConfigurationError::InvalidValue { field, .. }) => {
                assert_eq!(field, "broadcaster.subscriber_buffer")
            }
            other => panic!("expected InvalidValue, got {other:?}"),
        }
    }

    #[test]
    fn test_min_connections_bounded_by_max() {
        let mut config = ComandaConfig::default();
        config.database.min_connections = 50;
        assert!(config.validate().is_err());
    }
}
