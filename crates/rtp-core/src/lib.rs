//! RTP-level building blocks for doorcam
//!
//! Streams to HomeKit clients are produced by an external transcoder, so
//! this crate does not packetize anything itself. It owns the identifiers
//! and key material that a session negotiates before the transcoder starts:
//!
//! - [`ssrc`]: per-stream synchronization source allocation
//! - [`srtp`]: the fixed SRTP suite and master key/salt handling
//! - [`security::sdes`]: the `a=crypto:` attribute used in session descriptions

pub mod error;
pub mod security;
pub mod srtp;
pub mod ssrc;

pub use error::{Error, Result};
pub use srtp::{SrtpCryptoSuite, SrtpKeyMaterial, SRTP_AES128_CM_SHA1_80};
pub use ssrc::generate_ssrc;

/// RTP synchronization source identifier
pub type RtpSsrc = u32;
