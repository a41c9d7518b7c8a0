//! Error types for the ratevol system.

use crate::types::{SecurityId, TimestampNs};
use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the ratevol system.
///
/// Only fatal conditions live here. A quote with no spot rate inside the
/// tolerance, or a window with a gap, is a missing value in the output.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Input validation failure (missing column, null field, bad timestamp).
    #[error("Validation error: {0}")]
    Validation(String),

    /// Two observations map to the same grid cell.
    #[error("Duplicate observation for security {security_id} at {snap_time}")]
    DuplicateObservation {
        security_id: SecurityId,
        snap_time: TimestampNs,
    },

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with message.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    /// Create a database error.
    pub fn database(msg: impl Into<String>) -> Self {
        Error::Database(msg.into())
    }

    /// Whether this error came from bad input data rather than setup.
    pub fn is_input_error(&self) -> bool {
        matches!(self, Error::Validation(_) | Error::DuplicateObservation { .. })
    }
}
