//! CallAgent error types.

use thiserror::Error;

/// Errors shared by every CallAgent crate.
#[derive(Debug, Error)]
pub enum CallAgentError {
    /// Configuration file could not be read or parsed.
    #[error("config error: {0}")]
    Config(String),

    /// Input rejected before it reached storage.
    #[error("validation error: {0}")]
    Validation(String),

    /// Backing key-value store failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// Every configured webhook endpoint failed.
    #[error("delivery failed: {0}")]
    Delivery(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl CallAgentError {
    /// Shorthand for building a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

/// Result type for CallAgent operations.
pub type Result<T> = std::result::Result<T, CallAgentError>;
