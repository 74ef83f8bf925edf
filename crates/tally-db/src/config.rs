//! # Tally Configuration
//!
//! Settings for the database, pricing and ledger retry behaviour.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     TALLY_DATABASE_PATH=/var/lib/tally/tally.db                        │
//! │     TALLY_CURRENCY_SCALE=0                                             │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/tally/tally.toml (Linux)                                 │
//! │     ~/Library/Application Support/com.tally.tally/tally.toml (macOS)   │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # tally.toml
//! [database]
//! path = "tally.db"
//! max_connections = 5
//!
//! [pricing]
//! currency_scale = 2   # IDR deployments use 0
//!
//! [ledger]
//! initial_retry_ms = 10
//! max_retry_interval_ms = 250
//! max_retry_elapsed_ms = 2000
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tally_core::{PricingCalculator, DEFAULT_CURRENCY_SCALE};
use tracing::{debug, info, warn};

use crate::error::ConfigError;
use crate::ledger::RetryPolicy;
use crate::pool::DbConfig;

/// Largest scale a `Decimal` can carry.
const MAX_CURRENCY_SCALE: u32 = 28;

// =============================================================================
// Sections
// =============================================================================

/// `[database]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite database file.
    #[serde(default = "default_database_path")]
    pub path: PathBuf,

    /// Maximum pooled connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_path() -> PathBuf {
    PathBuf::from("tally.db")
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

/// `[pricing]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingSettings {
    /// Decimal places of the currency's minor unit.
    #[serde(default = "default_currency_scale")]
    pub currency_scale: u32,
}

fn default_currency_scale() -> u32 {
    DEFAULT_CURRENCY_SCALE
}

impl Default for PricingSettings {
    fn default() -> Self {
        Self {
            currency_scale: default_currency_scale(),
        }
    }
}

/// `[ledger]` section: backoff on version conflicts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSettings {
    #[serde(default = "default_initial_retry")]
    pub initial_retry_ms: u64,

    #[serde(default = "default_max_retry_interval")]
    pub max_retry_interval_ms: u64,

    /// Total retry budget per batch.
    #[serde(default = "default_max_retry_elapsed")]
    pub max_retry_elapsed_ms: u64,
}

fn default_initial_retry() -> u64 {
    10
}
fn default_max_retry_interval() -> u64 {
    250
}
fn default_max_retry_elapsed() -> u64 {
    2_000
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            initial_retry_ms: default_initial_retry(),
            max_retry_interval_ms: default_max_retry_interval(),
            max_retry_elapsed_ms: default_max_retry_elapsed(),
        }
    }
}

// =============================================================================
// Tally Config
// =============================================================================

/// Complete configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TallyConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub pricing: PricingSettings,

    #[serde(default)]
    pub ledger: LedgerSettings,
}

impl TallyConfig {
    /// Loads configuration from file (if present), then applies environment
    /// overrides and validates.
    ///
    /// ## Arguments
    /// * `config_path` - explicit file; `None` uses the platform config dir
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Like [`TallyConfig::load`], falling back to defaults on any error.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Writes the configuration as TOML.
    pub fn save(&self, config_path: Option<PathBuf>) -> Result<(), ConfigError> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| ConfigError::Invalid("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "database.max_connections must be greater than 0".into(),
            ));
        }

        if self.pricing.currency_scale > MAX_CURRENCY_SCALE {
            return Err(ConfigError::Invalid(format!(
                "pricing.currency_scale must be at most {}, got {}",
                MAX_CURRENCY_SCALE, self.pricing.currency_scale
            )));
        }

        let ledger = &self.ledger;
        if ledger.max_retry_elapsed_ms == 0 {
            return Err(ConfigError::Invalid(
                "ledger.max_retry_elapsed_ms must be greater than 0".into(),
            ));
        }
        if ledger.initial_retry_ms > ledger.max_retry_interval_ms {
            return Err(ConfigError::Invalid(
                "ledger.initial_retry_ms must not exceed ledger.max_retry_interval_ms".into(),
            ));
        }

        Ok(())
    }

    /// Applies `TALLY_*` environment variable overrides.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies overrides from any key lookup. Unparseable values are ignored.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup("TALLY_DATABASE_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Some(max) = lookup("TALLY_MAX_CONNECTIONS") {
            match max.parse::<u32>() {
                Ok(n) => self.database.max_connections = n,
                Err(_) => warn!(value = %max, "Ignoring invalid TALLY_MAX_CONNECTIONS"),
            }
        }

        if let Some(scale) = lookup("TALLY_CURRENCY_SCALE") {
            match scale.parse::<u32>() {
                Ok(s) => {
                    debug!(scale = s, "Overriding currency scale from environment");
                    self.pricing.currency_scale = s;
                }
                Err(_) => warn!(value = %scale, "Ignoring invalid TALLY_CURRENCY_SCALE"),
            }
        }

        if let Some(budget) = lookup("TALLY_RETRY_BUDGET_MS") {
            match budget.parse::<u64>() {
                Ok(ms) => self.ledger.max_retry_elapsed_ms = ms,
                Err(_) => warn!(value = %budget, "Ignoring invalid TALLY_RETRY_BUDGET_MS"),
            }
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "tally", "tally")
            .map(|dirs| dirs.config_dir().join("tally.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// Pricing calculator at the configured currency scale.
    pub fn pricing_calculator(&self) -> PricingCalculator {
        PricingCalculator::new(self.pricing.currency_scale)
    }

    /// Ledger retry policy.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            initial_interval: Duration::from_millis(self.ledger.initial_retry_ms),
            max_interval: Duration::from_millis(self.ledger.max_retry_interval_ms),
            max_elapsed: Duration::from_millis(self.ledger.max_retry_elapsed_ms),
        }
    }

    /// Database pool configuration.
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(self.database.path.clone()).max_connections(self.database.max_connections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = TallyConfig::default();
        assert_eq!(config.pricing.currency_scale, 2);
        assert_eq!(config.database.max_connections, 5);
        assert!(config.validate().is_ok());
        assert_eq!(config.retry_policy(), RetryPolicy::default());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: TallyConfig = toml::from_str("[pricing]\ncurrency_scale = 0\n").unwrap();
        assert_eq!(config.pricing.currency_scale, 0);
        assert_eq!(config.database, DatabaseSettings::default());
        assert_eq!(config.ledger, LedgerSettings::default());
    }

    #[test]
    fn test_config_validation() {
        let mut config = TallyConfig::default();

        config.pricing.currency_scale = 29;
        assert!(config.validate().is_err());

        config.pricing.currency_scale = 0;
        config.ledger.initial_retry_ms = 1_000;
        assert!(config.validate().is_err());

        config.ledger.initial_retry_ms = 10;
        config.database.max_connections = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("TALLY_DATABASE_PATH", "/tmp/other.db"),
            ("TALLY_CURRENCY_SCALE", "0"),
            ("TALLY_MAX_CONNECTIONS", "not-a-number"),
        ]
        .into_iter()
        .collect();

        let mut config = TallyConfig::default();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.database.path, PathBuf::from("/tmp/other.db"));
        assert_eq!(config.pricing.currency_scale, 0);
        assert_eq!(config.database.max_connections, 5);
    }

    #[test]
    fn test_toml_serialization() {
        let config = TallyConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[database]"));
        assert!(toml_str.contains("[ledger]"));

        let parsed: TallyConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir().join(format!("tally-config-{}.toml", uuid::Uuid::new_v4()));
        let mut config = TallyConfig::default();
        config.pricing.currency_scale = 0;
        config.save(Some(path.clone())).unwrap();

        let loaded: TallyConfig =
            toml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded.pricing.currency_scale, 0);

        std::fs::remove_file(path).ok();
    }
}
