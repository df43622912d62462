//! Error types for media-core

use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for media-core operations
pub type Result<T> = std::result::Result<T, MediaError>;

/// Errors raised while preparing or running transcoders
#[derive(Debug, Error)]
pub enum MediaError {
    /// The camera has no `source` configured
    #[error("Missing source for camera '{camera}'")]
    MissingSource { camera: String },

    /// A configured command-line fragment could not be tokenized
    #[error("Invalid command fragment '{fragment}': {reason}")]
    InvalidFragment { fragment: String, reason: String },

    /// The transcoder executable could not be started
    #[error("Failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The relay socket could not be bound
    #[error("Failed to bind relay on {addr}: {source}")]
    RelayBind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// The speaker session description could not be written
    #[error("Failed to write session description {}: {source}", path.display())]
    SdpWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration loading failed
    #[error(transparent)]
    Config(#[from] doorcam_infra_common::Error),

    /// SRTP parameter problem
    #[error(transparent)]
    Rtp(#[from] doorcam_rtp_core::Error),
}

impl MediaError {
    /// Create an invalid fragment error
    pub fn invalid_fragment(fragment: &str, reason: impl Into<String>) -> Self {
        Self::InvalidFragment {
            fragment: fragment.to_string(),
            reason: reason.into(),
        }
    }
}
