//! Error types for commlink
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using CommError
pub type Result<T> = std::result::Result<T, CommError>;

/// Error type returned by application callbacks
pub type CallbackError = Box<dyn std::error::Error + Send + Sync>;

/// Result type returned by application callbacks
pub type CallbackResult = std::result::Result<(), CallbackError>;

/// Unified error type for commlink operations
#[derive(Debug, Error)]
pub enum CommError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Connection Errors (connect / bind / accept)
    // -------------------------------------------------------------------------
    #[error("Connection error: {0}")]
    Connection(String),

    // -------------------------------------------------------------------------
    // Transmission Errors (send / receive)
    // -------------------------------------------------------------------------
    #[error("Transmission error: {0}")]
    Transmission(String),

    // -------------------------------------------------------------------------
    // Application Callback Errors
    // -------------------------------------------------------------------------
    #[error("Callback error: {0}")]
    Callback(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),

    // -------------------------------------------------------------------------
    // Reactor Errors
    // -------------------------------------------------------------------------
    #[error("Reactor has shut down")]
    ReactorClosed,
}

impl CommError {
    /// Wrap an I/O failure that happened while establishing a connection
    pub(crate) fn connection(context: &str, err: std::io::Error) -> Self {
        CommError::Connection(format!("{}: {}", context, err))
    }
}
