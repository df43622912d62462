//! Request and response shapes exchanged with the host
//!
//! Field names follow the host protocol (`sessionID`, `targetAddress`,
//! `srtp_key`). Key and salt bytes travel as base64 strings in JSON.

use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use doorcam_media_core::{AudioRequest, VideoRequest};
use doorcam_rtp_core::RtpSsrc;

use crate::session::SessionToken;

/// Port and SRTP master key/salt offered by the controller for one leg
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointRequest {
    pub port: u16,
    #[serde(with = "base64_bytes")]
    pub srtp_key: Vec<u8>,
    #[serde(with = "base64_bytes")]
    pub srtp_salt: Vec<u8>,
}

/// `prepare` input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrepareStreamRequest {
    #[serde(rename = "sessionID")]
    pub session_id: SessionToken,
    #[serde(rename = "targetAddress")]
    pub target_address: IpAddr,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<EndpointRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<EndpointRequest>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AddressKind {
    #[serde(rename = "v4")]
    V4,
    #[serde(rename = "v6")]
    V6,
}

impl AddressKind {
    pub fn of(address: &IpAddr) -> Self {
        match address {
            IpAddr::V4(_) => AddressKind::V4,
            IpAddr::V6(_) => AddressKind::V6,
        }
    }
}

/// The local address the controller should expect streams from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressInfo {
    pub address: IpAddr,
    #[serde(rename = "type")]
    pub kind: AddressKind,
}

impl From<IpAddr> for AddressInfo {
    fn from(address: IpAddr) -> Self {
        Self {
            kind: AddressKind::of(&address),
            address,
        }
    }
}

/// One negotiated leg, echoed back with the locally chosen SSRC
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointResponse {
    pub port: u16,
    pub ssrc: RtpSsrc,
    #[serde(with = "base64_bytes")]
    pub srtp_key: Vec<u8>,
    #[serde(with = "base64_bytes")]
    pub srtp_salt: Vec<u8>,
}

/// `prepare` output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrepareStreamResponse {
    pub address: AddressInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<EndpointResponse>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<EndpointResponse>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamRequestKind {
    Start,
    Stop,
    /// Anything else the host may send, such as `reconfigure`; ignored
    #[serde(other)]
    Other,
}

/// `handleStreamRequest` input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamRequest {
    #[serde(rename = "sessionID")]
    pub session_id: SessionToken,
    #[serde(rename = "type")]
    pub kind: StreamRequestKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<VideoRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<AudioRequest>,
}

impl StreamRequest {
    pub fn start(
        session_id: SessionToken,
        video: Option<VideoRequest>,
        audio: Option<AudioRequest>,
    ) -> Self {
        Self {
            session_id,
            kind: StreamRequestKind::Start,
            video,
            audio,
        }
    }

    pub fn stop(session_id: SessionToken) -> Self {
        Self {
            session_id,
            kind: StreamRequestKind::Stop,
            video: None,
            audio: None,
        }
    }
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}
