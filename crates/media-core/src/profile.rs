//! Profile negotiation
//!
//! A start request carries what the controller would like; the camera's
//! configuration carries what it allows. The negotiated profile is the lower
//! of the two for frame rate and bitrate, while resolution and audio values
//! are taken from the request as-is.

use serde::{Deserialize, Serialize};

use crate::config::VideoConfig;

pub const DEFAULT_WIDTH: u32 = 1280;
pub const DEFAULT_HEIGHT: u32 = 720;
/// kbit/s
pub const DEFAULT_AUDIO_BITRATE: u32 = 32;
/// kHz
pub const DEFAULT_AUDIO_SAMPLE_RATE: u32 = 16;

pub const PIXEL_FORMAT: &str = "yuv420p";

/// Video parameters of a start request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoRequest {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// kbit/s
    pub max_bit_rate: u32,
}

/// Audio parameters of a start request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioRequest {
    /// kbit/s
    pub max_bit_rate: u32,
    /// kHz
    pub sample_rate: u32,
}

/// Negotiated video output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoProfile {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// kbit/s
    pub bitrate: u32,
    pub codec: String,
    pub pixel_format: &'static str,
    /// Comma-joined `-vf` chain, absent when no filter applies
    pub filter: Option<String>,
    pub packet_size: u32,
}

/// Negotiated audio output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioProfile {
    pub codec: String,
    /// kHz
    pub sample_rate: u32,
    /// kbit/s
    pub bitrate: u32,
    pub channels: u8,
}

impl VideoProfile {
    /// Negotiate against the camera ceilings; no request means the defaults
    pub fn negotiate(config: &VideoConfig, request: Option<&VideoRequest>) -> Self {
        let mut width = DEFAULT_WIDTH;
        let mut height = DEFAULT_HEIGHT;
        let mut fps = config.max_fps;
        let mut bitrate = config.max_bitrate;

        if let Some(request) = request {
            width = request.width;
            height = request.height;
            fps = fps.min(request.fps);
            bitrate = bitrate.min(request.max_bit_rate);
        }

        Self {
            width,
            height,
            fps,
            bitrate,
            codec: config.vcodec.clone(),
            pixel_format: PIXEL_FORMAT,
            filter: filter_chain(config, width, height),
            packet_size: config.packet_size,
        }
    }

    /// `WxH`
    pub fn resolution(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}

impl AudioProfile {
    pub fn negotiate(config: &VideoConfig, request: Option<&AudioRequest>) -> Self {
        let (bitrate, sample_rate) = match request {
            Some(r) => (r.max_bit_rate, r.sample_rate),
            None => (DEFAULT_AUDIO_BITRATE, DEFAULT_AUDIO_SAMPLE_RATE),
        };
        Self {
            codec: config.acodec.clone(),
            sample_rate,
            bitrate,
            channels: 1,
        }
    }
}

/// Build the `-vf` value for a requested size
///
/// Unset or `none` disables filtering entirely, including flips. An empty
/// string scales to the requested size. Flips follow the base filter.
pub fn filter_chain(config: &VideoConfig, width: u32, height: u32) -> Option<String> {
    let base = match config.video_filter.as_deref() {
        None | Some("none") => return None,
        Some("") => format!("scale={}:{}", width, height),
        Some(custom) => custom.to_string(),
    };

    let mut chain = vec![base];
    if config.hflip {
        chain.push("hflip".to_string());
    }
    if config.vflip {
        chain.push("vflip".to_string());
    }
    Some(chain.join(","))
}
