//! Engine configuration.
//!
//! Every field has a default, so an empty JSON object is a valid config file.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Magnitude below which a balance counts as settled (one cent).
pub const DEFAULT_TOLERANCE: Decimal = dec!(0.01);

/// Default time-to-live for cached exchange rates: 24 hours.
pub const DEFAULT_RATE_TTL_SECS: u64 = 24 * 60 * 60;

pub const DEFAULT_FETCH_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Tunables shared by the normalizer, optimizer and CLI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Balances with a smaller magnitude are treated as settled.
    pub tolerance: Decimal,
    /// Cached exchange rates older than this are refreshed before use.
    pub rate_ttl_secs: u64,
    /// Upper bound handed to rate sources for a single fetch.
    pub fetch_timeout_ms: u64,
    /// Decimal places used when presenting amounts.
    pub display_dp: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            rate_ttl_secs: DEFAULT_RATE_TTL_SECS,
            fetch_timeout_ms: DEFAULT_FETCH_TIMEOUT_MS,
            display_dp: 2,
        }
    }
}

impl EngineConfig {
    /// Parse and validate a config from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a config from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tolerance <= Decimal::ZERO {
            return Err(ConfigError::Invalid(format!(
                "tolerance must be positive, got {}",
                self.tolerance
            )));
        }
        if self.rate_ttl_secs == 0 {
            return Err(ConfigError::Invalid("rate_ttl_secs must be positive".into()));
        }
        Ok(())
    }

    pub fn rate_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(i64::try_from(self.rate_ttl_secs).unwrap_or(i64::MAX))
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}
