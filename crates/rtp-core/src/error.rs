//! Error types for rtp-core

use thiserror::Error;

/// Result type for rtp-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while handling SRTP parameters
#[derive(Debug, Error)]
pub enum Error {
    /// Master key or salt has the wrong length for the suite
    #[error("Invalid SRTP {what} length: expected {expected} bytes, got {actual}")]
    InvalidKeyLength {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
}
