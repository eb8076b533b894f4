//! Ingest provider configuration.
//!
//! Configuration is loaded from environment variables. Every setting has a
//! default, so an empty environment yields a valid configuration.

use common::config::ObservabilityConfig;
use common::error::CommonError;
use media_protocol::timebase::TimebaseConversion;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use thiserror::Error;

/// Environment variable selecting the tick/microsecond conversion mode.
pub const ENV_TIMEBASE_CONVERSION: &str = "PROVIDER_TIMEBASE_CONVERSION";

/// Environment variable enabling wraparound state reset on `stop()`.
pub const ENV_CLEAR_WRAPAROUND_ON_STOP: &str = "PROVIDER_CLEAR_WRAPAROUND_ON_STOP";

/// Timestamp engine settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimestampConfig {
    /// How tick/microsecond conversions are computed (default: exact).
    pub conversion: TimebaseConversion,

    /// Also forget wraparound counters and last raw values when a session
    /// stops (default: false, counters persist across epochs).
    pub clear_wraparound_on_stop: bool,
}

/// Ingest provider configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Timestamp engine settings.
    pub timestamp: TimestampConfig,

    /// Logging settings.
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl From<CommonError> for ConfigError {
    fn from(err: CommonError) -> Self {
        match err {
            CommonError::Configuration(msg) => ConfigError::InvalidValue(msg),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if a variable holds an unsupported value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if a variable holds an unsupported value.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let conversion = match vars.get(ENV_TIMEBASE_CONVERSION) {
            None => TimebaseConversion::default(),
            Some(value) => match value.to_ascii_lowercase().as_str() {
                "float" => TimebaseConversion::Float,
                "exact" => TimebaseConversion::Exact,
                other => {
                    return Err(ConfigError::InvalidValue(format!(
                        "{ENV_TIMEBASE_CONVERSION} must be 'float' or 'exact', got '{other}'"
                    )))
                }
            },
        };

        let clear_wraparound_on_stop = match vars.get(ENV_CLEAR_WRAPAROUND_ON_STOP) {
            None => false,
            Some(value) => value.parse::<bool>().map_err(|_| {
                ConfigError::InvalidValue(format!(
                    "{ENV_CLEAR_WRAPAROUND_ON_STOP} must be true or false, got '{value}'"
                ))
            })?,
        };

        let observability = ObservabilityConfig::from_vars(vars)?;

        Ok(Config {
            timestamp: TimestampConfig {
                conversion,
                clear_wraparound_on_stop,
            },
            observability,
        })
    }
}
