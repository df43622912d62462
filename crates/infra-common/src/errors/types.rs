use thiserror::Error;

/// Result type for infrastructure operations
pub type Result<T> = std::result::Result<T, Error>;

/// Base error type for infrastructure operations
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration could not be read or was invalid
    #[error("Configuration error: {0}")]
    Config(String),

    /// Underlying I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization failure
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Logging subsystem could not be initialised
    #[error("Logging error: {0}")]
    Logging(String),

    /// Free-form error with a message
    #[error("{0}")]
    Custom(String),

    /// Bug or unexpected internal state
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}
