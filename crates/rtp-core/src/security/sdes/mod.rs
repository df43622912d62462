//! SDES crypto attribute (RFC 4568)
//!
//! `a=crypto:<tag> <suite> inline:<base64 key||salt>`

use std::fmt;

use crate::srtp::{SrtpCryptoSuite, SrtpKeyMaterial};


/// One `a=crypto:` attribute value with an inline key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SdesCryptoAttribute {
    /// Attribute tag
    pub tag: u32,
    /// Crypto suite name
    pub crypto_suite: &'static str,
    /// Base64 of master key followed by master salt
    pub key_info: String,
}

impl SdesCryptoAttribute {
    /// Build an inline attribute for the given suite and key material
    pub fn inline(tag: u32, suite: &SrtpCryptoSuite, material: &SrtpKeyMaterial) -> Self {
        Self {
            tag,
            crypto_suite: suite.name,
            key_info: material.to_base64(),
        }
    }

    /// Render as a full SDP line (`a=crypto:...`)
    pub fn to_sdp_line(&self) -> String {
        format!("a=crypto:{}", self)
    }
}

impl fmt::Display for SdesCryptoAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} inline:{}", self.tag, self.crypto_suite, self.key_info)
    }
}
