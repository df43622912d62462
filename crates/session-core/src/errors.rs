//! Error types for session-core

use thiserror::Error;

use doorcam_media_core::MediaError;

/// Result type for session operations
pub type Result<T> = std::result::Result<T, SessionError>;

/// Errors surfaced to the host
///
/// Only construction and `prepare` return errors. Failures while a stream
/// runs are logged and reported as events instead.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The local address to advertise could not be determined
    #[error("Address resolution failed: {0}")]
    AddressResolution(String),

    /// Malformed request payload
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Key material did not match the SRTP suite
    #[error(transparent)]
    Rtp(#[from] doorcam_rtp_core::Error),

    /// Camera configuration or transcoder problem
    #[error(transparent)]
    Media(#[from] MediaError),
}

impl SessionError {
    pub fn address(msg: impl Into<String>) -> Self {
        SessionError::AddressResolution(msg.into())
    }

    pub fn invalid_request(msg: impl Into<String>) -> Self {
        SessionError::InvalidRequest(msg.into())
    }
}
