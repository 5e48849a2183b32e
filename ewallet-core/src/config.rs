//! Configuration management
//!
//! Settings live in `settings.json` inside the data directory:
//! ```json
//! {
//!   "ledger": {
//!     "initialBalance": "100",
//!     "unitOfWorkTimeoutMs": 5000,
//!     "databaseFile": "ewallet.duckdb"
//!   }
//! }
//! ```
//!
//! Keys the ledger does not manage are preserved on save. Each ledger setting
//! can be overridden by an environment variable.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::result::{Error, Result};
use crate::domain::{validate_amount, DEFAULT_INITIAL_BALANCE};

pub const SETTINGS_FILE: &str = "settings.json";
pub const DEFAULT_DB_FILE: &str = "ewallet.duckdb";
pub const DEFAULT_UOW_TIMEOUT_MS: u64 = 5000;

pub const ENV_INITIAL_BALANCE: &str = "EWALLET_INITIAL_BALANCE";
pub const ENV_UOW_TIMEOUT_MS: &str = "EWALLET_UOW_TIMEOUT_MS";
pub const ENV_DB_FILE: &str = "EWALLET_DB_FILE";

/// Raw settings.json structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    #[serde(default)]
    ledger: LedgerSettings,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LedgerSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    initial_balance: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    unit_of_work_timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    database_file: Option<String>,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

/// Ledger configuration (resolved view of settings plus environment)
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Balance granted to every newly created account
    pub initial_balance: Decimal,
    /// Deadline for a single unit of work
    pub unit_of_work_timeout: Duration,
    /// Database file name, relative to the data directory
    pub database_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            initial_balance: DEFAULT_INITIAL_BALANCE,
            unit_of_work_timeout: Duration::from_millis(DEFAULT_UOW_TIMEOUT_MS),
            database_file: DEFAULT_DB_FILE.to_string(),
        }
    }
}

impl Config {
    /// Load config from the data directory, then apply environment overrides
    pub fn load(dir: &Path) -> Result<Self> {
        let raw = read_settings(dir)?;
        let defaults = Self::default();

        let mut config = Self {
            initial_balance: raw.ledger.initial_balance.unwrap_or(defaults.initial_balance),
            unit_of_work_timeout: raw
                .ledger
                .unit_of_work_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.unit_of_work_timeout),
            database_file: raw.ledger.database_file.unwrap_or(defaults.database_file),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;

        debug!(
            initial_balance = %config.initial_balance,
            timeout_ms = config.unit_of_work_timeout.as_millis() as u64,
            database_file = %config.database_file,
            "configuration loaded"
        );
        Ok(config)
    }

    /// Save config to the data directory
    /// Preserves other settings that the ledger doesn't manage
    pub fn save(&self, dir: &Path) -> Result<()> {
        let mut settings = read_settings(dir)?;

        settings.ledger.initial_balance = Some(self.initial_balance);
        settings.ledger.unit_of_work_timeout_ms = Some(self.unit_of_work_timeout.as_millis() as u64);
        settings.ledger.database_file = Some(self.database_file.clone());

        let content = serde_json::to_string_pretty(&settings)?;
        std::fs::write(dir.join(SETTINGS_FILE), content)?;
        Ok(())
    }

    /// Apply overrides from an environment lookup
    fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_INITIAL_BALANCE) {
            self.initial_balance = raw.trim().parse().map_err(|_| {
                Error::Config(format!("{} is not a decimal: '{}'", ENV_INITIAL_BALANCE, raw))
            })?;
        }
        if let Some(raw) = lookup(ENV_UOW_TIMEOUT_MS) {
            let ms: u64 = raw.trim().parse().map_err(|_| {
                Error::Config(format!("{} is not a number of milliseconds: '{}'", ENV_UOW_TIMEOUT_MS, raw))
            })?;
            self.unit_of_work_timeout = Duration::from_millis(ms);
        }
        if let Some(raw) = lookup(ENV_DB_FILE) {
            self.database_file = raw;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        validate_amount(self.initial_balance)
            .map_err(|e| Error::Config(format!("initialBalance: {}", e)))?;
        if self.unit_of_work_timeout.is_zero() {
            return Err(Error::Config("unitOfWorkTimeoutMs must be positive".to_string()));
        }
        if self.database_file.trim().is_empty() {
            return Err(Error::Config("databaseFile must not be empty".to_string()));
        }
        Ok(())
    }
}

fn read_settings(dir: &Path) -> Result<SettingsFile> {
    let settings_path = dir.join(SETTINGS_FILE);
    if !settings_path.exists() {
        return Ok(SettingsFile::default());
    }
    let content = std::fs::read_to_string(&settings_path)?;
    serde_json::from_str(&content)
        .map_err(|e| Error::Config(format!("{}: {}", settings_path.display(), e)))
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;
    use tempfile::TempDir;

    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_defaults_when_no_file() {
        let dir = TempDir::new().unwrap();
        let raw = read_settings(dir.path()).unwrap();
        assert!(raw.ledger.initial_balance.is_none());

        let mut config = Config::default();
        config.apply_env(no_env).unwrap();
        assert_eq!(config.initial_balance, dec!(100));
        assert_eq!(config.unit_of_work_timeout, Duration::from_millis(5000));
        assert_eq!(config.database_file, "ewallet.duckdb");
    }

    #[test]
    fn test_reads_ledger_section() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(SETTINGS_FILE),
            r#"{"ledger":{"initialBalance":"250.5","unitOfWorkTimeoutMs":1200,"databaseFile":"w.duckdb"}}"#,
        )
        .unwrap();

        let raw = read_settings(dir.path()).unwrap();
        assert_eq!(raw.ledger.initial_balance, Some(dec!(250.5)));
        assert_eq!(raw.ledger.unit_of_work_timeout_ms, Some(1200));
        assert_eq!(raw.ledger.database_file.as_deref(), Some("w.duckdb"));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config
            .apply_env(|key| match key {
                ENV_INITIAL_BALANCE => Some("7.25".to_string()),
                ENV_UOW_TIMEOUT_MS => Some("300".to_string()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.initial_balance, dec!(7.25));
        assert_eq!(config.unit_of_work_timeout, Duration::from_millis(300));
        assert_eq!(config.database_file, DEFAULT_DB_FILE);
    }

    #[test]
    fn test_invalid_env_is_config_error() {
        let mut config = Config::default();
        let err = config
            .apply_env(|key| (key == ENV_UOW_TIMEOUT_MS).then(|| "soon".to_string()))
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = Config {
            initial_balance: dec!(-1),
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let config = Config {
            unit_of_work_timeout: Duration::ZERO,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_save_preserves_unknown_keys() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(SETTINGS_FILE),
            r#"{"theme":"dark","ledger":{"initialBalance":"100","note":"keep me"}}"#,
        )
        .unwrap();

        let config = Config {
            initial_balance: dec!(42),
            ..Config::default()
        };
        config.save(dir.path()).unwrap();

        let content = std::fs::read_to_string(dir.path().join(SETTINGS_FILE)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(value["theme"], "dark");
        assert_eq!(value["ledger"]["note"], "keep me");
        assert_eq!(value["ledger"]["initialBalance"], "42");
        assert_eq!(value["ledger"]["unitOfWorkTimeoutMs"], 5000);
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(SETTINGS_FILE), "{not json").unwrap();
        assert!(matches!(read_settings(dir.path()), Err(Error::Config(_))));
    }
}
