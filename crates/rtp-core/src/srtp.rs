//! SRTP suite and master key material
//!
//! Every stream uses AES_CM_128_HMAC_SHA1_80. The transcoder takes the
//! master key and salt concatenated and base64-encoded.

use std::fmt;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use crate::error::{Error, Result};

/// Description of an SRTP crypto suite
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SrtpCryptoSuite {
    /// Suite name as used in SDP and on the transcoder command line
    pub name: &'static str,
    /// Master key length in bytes
    pub key_length: usize,
    /// Master salt length in bytes
    pub salt_length: usize,
}

/// AES-128 counter mode with an 80-bit HMAC-SHA1 tag
pub const SRTP_AES128_CM_SHA1_80: SrtpCryptoSuite = SrtpCryptoSuite {
    name: "AES_CM_128_HMAC_SHA1_80",
    key_length: 16,
    salt_length: 14,
};

/// Master key and salt negotiated for one stream
#[derive(Clone, PartialEq, Eq)]
pub struct SrtpKeyMaterial {
    key: Vec<u8>,
    salt: Vec<u8>,
}

impl SrtpKeyMaterial {
    /// Wrap a key/salt pair as received from the controller
    pub fn new(key: impl Into<Vec<u8>>, salt: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            salt: salt.into(),
        }
    }

    /// Check the lengths against a suite
    pub fn validate(&self, suite: &SrtpCryptoSuite) -> Result<()> {
        if self.key.len() != suite.key_length {
            return Err(Error::InvalidKeyLength {
                what: "key",
                expected: suite.key_length,
                actual: self.key.len(),
            });
        }
        if self.salt.len() != suite.salt_length {
            return Err(Error::InvalidKeyLength {
                what: "salt",
                expected: suite.salt_length,
                actual: self.salt.len(),
            });
        }
        Ok(())
    }

    pub fn key(&self) -> &[u8] {
        &self.key
    }

    pub fn salt(&self) -> &[u8] {
        &self.salt
    }

    /// Key followed by salt
    pub fn master(&self) -> Vec<u8> {
        let mut master = Vec::with_capacity(self.key.len() + self.salt.len());
        master.extend_from_slice(&self.key);
        master.extend_from_slice(&self.salt);
        master
    }

    /// Base64 of key followed by salt
    pub fn to_base64(&self) -> String {
        BASE64.encode(self.master())
    }
}

// Key material must never end up in logs.
impl fmt::Debug for SrtpKeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SrtpKeyMaterial")
            .field("key_len", &self.key.len())
            .field("salt_len", &self.salt.len())
            .finish()
    }
}
