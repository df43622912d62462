//! Security descriptions for SRTP streams
//!
//! Keys are exchanged out of band by the controller, so the only piece
//! needed here is SDES (Security DEScriptions) formatting for the
//! `a=crypto:` line written into local session descriptions.

pub mod sdes;

pub use sdes::SdesCryptoAttribute;
