//! Session tokens

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use crate::errors::{Result, SessionError};

/// Opaque 16-byte identifier the host assigns to one stream session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionToken(pub Uuid);

impl SessionToken {
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        Uuid::from_slice(bytes)
            .map(Self)
            .map_err(|_| {
                SessionError::invalid_request(format!(
                    "session token must be 16 bytes, got {}",
                    bytes.len()
                ))
            })
    }

    /// A random token, for synthetic sessions
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for SessionToken {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

/// Accepts the hyphenated text form or the raw 16 bytes
impl<'de> Deserialize<'de> for SessionToken {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Text(Uuid),
            Bytes(Vec<u8>),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Text(uuid) => Ok(Self(uuid)),
            Repr::Bytes(bytes) => Self::from_slice(&bytes).map_err(serde::de::Error::custom),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_forms() {
        let bytes = [
            0x55, 0x0e, 0x84, 0x00, 0xe2, 0x9b, 0x41, 0xd4, 0xa7, 0x16, 0x44, 0x66, 0x55, 0x44,
            0x00, 0x00,
        ];
        let token = SessionToken::from_bytes(bytes);
        assert_eq!(token.to_string(), "550e8400-e29b-41d4-a716-446655440000");

        let quoted = "\"550e8400-e29b-41d4-a716-446655440000\"";
        let from_text: SessionToken = serde_json::from_str(quoted).unwrap();
        assert_eq!(from_text, token);

        let from_bytes: SessionToken =
            serde_json::from_value(serde_json::json!(bytes.to_vec())).unwrap();
        assert_eq!(from_bytes, token);

        assert_eq!(serde_json::to_string(&token).unwrap(), quoted);
    }

    #[test]
    fn test_wrong_length() {
        assert!(SessionToken::from_slice(&[1, 2, 3]).is_err());
        assert!(serde_json::from_str::<SessionToken>("[1,2,3]").is_err());
    }
}
