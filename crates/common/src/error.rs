//! Common error types for the ingest provider crates.

use thiserror::Error;

/// Common errors that can occur across the ingest provider crates
#[derive(Error, Debug, PartialEq, Eq)]
pub enum CommonError {
    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Result type alias using `CommonError`
pub type Result<T> = std::result::Result<T, CommonError>;
