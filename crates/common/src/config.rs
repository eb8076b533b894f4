//! Common configuration types for the ingest provider crates.

use crate::error::{CommonError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;

/// Default log level when `LOG_LEVEL` is unset.
pub const DEFAULT_LOG_LEVEL: &str = "info";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Observability configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Enable JSON-formatted logs
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            json_logs: false,
        }
    }
}

impl ObservabilityConfig {
    /// Load observability settings from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `CommonError::Configuration` if a variable holds an unsupported value.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load observability settings from a `HashMap` (for testing).
    ///
    /// # Errors
    ///
    /// Returns `CommonError::Configuration` if `LOG_LEVEL` is not a known
    /// level or `LOG_JSON` is not a boolean.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self> {
        let log_level = match vars.get("LOG_LEVEL") {
            Some(level) => {
                let level = level.to_ascii_lowercase();
                if !LOG_LEVELS.contains(&level.as_str()) {
                    return Err(CommonError::Configuration(format!(
                        "LOG_LEVEL must be one of {LOG_LEVELS:?}, got '{level}'"
                    )));
                }
                level
            }
            None => DEFAULT_LOG_LEVEL.to_string(),
        };

        let json_logs = match vars.get("LOG_JSON").map(String::as_str) {
            None => false,
            Some(value) => value.parse::<bool>().map_err(|_| {
                CommonError::Configuration(format!("LOG_JSON must be true or false, got '{value}'"))
            })?,
        };

        Ok(Self {
            log_level,
            json_logs,
        })
    }
}
