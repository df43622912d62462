//! Camera configuration
//!
//! Mirrors the platform block of the host's JSON configuration file:
//!
//! ```json
//! {
//!   "platform": "Camera-ffmpeg",
//!   "videoProcessor": "ffmpeg",
//!   "interfaceName": "",
//!   "cameras": [
//!     { "name": "Front Door", "videoConfig": { "source": "-re -i rtsp://..." } }
//!   ]
//! }
//! ```
//!
//! Values that the host treats as "unset" when falsy (empty strings, zero
//! numbers) fall back to their defaults in [`VideoConfig::normalized`].

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use doorcam_infra_common::{Error, ErrorExt};

use crate::error::{MediaError, Result};
use crate::process::RestartPolicy;

pub const DEFAULT_VIDEO_PROCESSOR: &str = "ffmpeg";
pub const DEFAULT_MAX_STREAMS: usize = 2;
pub const DEFAULT_MAX_WIDTH: u32 = 1280;
pub const DEFAULT_MAX_HEIGHT: u32 = 720;
pub const DEFAULT_MAX_FPS: u32 = 10;
pub const DEFAULT_MAX_BITRATE: u32 = 300;
pub const DEFAULT_VCODEC: &str = "libx264";
pub const DEFAULT_ACODEC: &str = "libfdk_aac";
pub const DEFAULT_PACKET_SIZE: u32 = 1316;
pub const DEFAULT_ADDITIONAL_COMMANDLINE: &str = "-tune zerolatency";
pub const DEFAULT_MAP_VIDEO: &str = "0:0";
pub const DEFAULT_MAP_AUDIO: &str = "0:1";
pub const DEFAULT_SPEAKER_SDP_DIR: &str = "/homebridge";

/// Marker prefix of the `audio` value that enables two-way audio
pub const TWO_WAY_MARKER: &str = "2way";

/// Playback output used when the two-way marker has nothing after it
pub const DEFAULT_SPEAKER_OUTPUT: &str = "-y speaker.mp4";

/// Top-level platform configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformConfig {
    /// Platform identifier, informational only
    #[serde(default)]
    pub platform: Option<String>,

    /// Transcoder executable
    #[serde(default = "default_video_processor")]
    pub video_processor: String,

    /// Network interface whose address is advertised to controllers
    #[serde(default)]
    pub interface_name: String,

    /// Raw camera entries; see [`PlatformConfig::camera_configs`]
    #[serde(default)]
    pub cameras: Vec<CameraEntry>,
}

/// A camera entry as written in the file, before validation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraEntry {
    pub name: Option<String>,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub serial_number: Option<String>,
    pub firmware_revision: Option<String>,
    pub video_config: Option<VideoConfig>,
}

/// A camera with a name and video configuration
#[derive(Debug, Clone)]
pub struct CameraConfig {
    /// Display name; also used to derive the speaker session description path
    pub name: String,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub serial_number: Option<String>,
    pub firmware_revision: Option<String>,
    /// Normalized video configuration
    pub video: VideoConfig,
}

/// Audio setting: a flag, or a string that may enable two-way audio
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AudioSetting {
    /// `true` / `false`
    Enabled(bool),
    /// Any string; non-empty enables audio, a `2way` prefix enables two-way audio
    Mode(String),
}

impl Default for AudioSetting {
    fn default() -> Self {
        AudioSetting::Enabled(false)
    }
}

impl AudioSetting {
    /// Whether the camera streams audio at all
    pub fn is_enabled(&self) -> bool {
        match self {
            AudioSetting::Enabled(enabled) => *enabled,
            AudioSetting::Mode(mode) => !mode.is_empty(),
        }
    }

    /// Whether return audio is played back through a second transcoder
    pub fn is_two_way(&self) -> bool {
        matches!(self, AudioSetting::Mode(mode) if mode.starts_with(TWO_WAY_MARKER))
    }

    /// Output arguments for the playback transcoder, when two-way
    pub fn speaker_output(&self) -> Option<&str> {
        match self {
            AudioSetting::Mode(mode) if mode.starts_with(TWO_WAY_MARKER) => {
                let rest = &mode[TWO_WAY_MARKER.len()..];
                if rest.is_empty() {
                    Some(DEFAULT_SPEAKER_OUTPUT)
                } else {
                    Some(rest)
                }
            }
            _ => None,
        }
    }
}

/// Per-camera video configuration (`videoConfig`)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoConfig {
    /// Input arguments for the main stream, e.g. `-re -i rtsp://cam/stream`
    pub source: Option<String>,
    /// Input arguments used for snapshots instead of `source`
    pub still_image_source: Option<String>,
    #[serde(default = "default_max_streams")]
    pub max_streams: usize,
    #[serde(default = "default_max_width")]
    pub max_width: u32,
    #[serde(default = "default_max_height")]
    pub max_height: u32,
    #[serde(rename = "maxFPS", default = "default_max_fps")]
    pub max_fps: u32,
    /// Ceiling in kbit/s
    #[serde(default = "default_max_bitrate")]
    pub max_bitrate: u32,
    #[serde(default = "default_vcodec")]
    pub vcodec: String,
    #[serde(default = "default_acodec")]
    pub acodec: String,
    #[serde(default)]
    pub audio: AudioSetting,
    #[serde(default = "default_packet_size")]
    pub packet_size: u32,
    #[serde(default)]
    pub debug: bool,
    #[serde(default = "default_additional_commandline")]
    pub additional_commandline: String,
    #[serde(default)]
    pub vflip: bool,
    #[serde(default)]
    pub hflip: bool,
    #[serde(default = "default_map_video")]
    pub mapvideo: String,
    #[serde(default = "default_map_audio")]
    pub mapaudio: String,
    /// `None` or `"none"`: no filter; `""`: scale to the requested size
    #[serde(default)]
    pub video_filter: Option<String>,
    /// Directory for the speaker session description file
    #[serde(default = "default_speaker_sdp_dir")]
    pub speaker_sdp_dir: PathBuf,
    /// Kill leftover transcoders with the same executable name before streaming
    #[serde(default = "default_true")]
    pub reap_stray_processes: bool,
    /// Restart policy for the two-way audio playback process
    #[serde(default)]
    pub speaker_restart: RestartPolicy,
}

impl VideoConfig {
    /// A configuration with every default and the given source
    pub fn with_source(source: impl Into<String>) -> Self {
        Self {
            source: Some(source.into()),
            still_image_source: None,
            max_streams: DEFAULT_MAX_STREAMS,
            max_width: DEFAULT_MAX_WIDTH,
            max_height: DEFAULT_MAX_HEIGHT,
            max_fps: DEFAULT_MAX_FPS,
            max_bitrate: DEFAULT_MAX_BITRATE,
            vcodec: DEFAULT_VCODEC.to_string(),
            acodec: DEFAULT_ACODEC.to_string(),
            audio: AudioSetting::default(),
            packet_size: DEFAULT_PACKET_SIZE,
            debug: false,
            additional_commandline: DEFAULT_ADDITIONAL_COMMANDLINE.to_string(),
            vflip: false,
            hflip: false,
            mapvideo: DEFAULT_MAP_VIDEO.to_string(),
            mapaudio: DEFAULT_MAP_AUDIO.to_string(),
            video_filter: None,
            speaker_sdp_dir: PathBuf::from(DEFAULT_SPEAKER_SDP_DIR),
            reap_stray_processes: true,
            speaker_restart: RestartPolicy::default(),
        }
    }

    /// Replace falsy values with their defaults
    pub fn normalized(mut self) -> Self {
        fn or_default(value: &mut String, default: &str) {
            if value.is_empty() {
                *value = default.to_string();
            }
        }
        fn or_default_num<T: PartialEq + Default>(value: &mut T, default: T) {
            if *value == T::default() {
                *value = default;
            }
        }

        or_default(&mut self.vcodec, DEFAULT_VCODEC);
        or_default(&mut self.acodec, DEFAULT_ACODEC);
        or_default(&mut self.additional_commandline, DEFAULT_ADDITIONAL_COMMANDLINE);
        or_default(&mut self.mapvideo, DEFAULT_MAP_VIDEO);
        or_default(&mut self.mapaudio, DEFAULT_MAP_AUDIO);
        or_default_num(&mut self.max_streams, DEFAULT_MAX_STREAMS);
        or_default_num(&mut self.max_width, DEFAULT_MAX_WIDTH);
        or_default_num(&mut self.max_height, DEFAULT_MAX_HEIGHT);
        or_default_num(&mut self.max_fps, DEFAULT_MAX_FPS);
        or_default_num(&mut self.max_bitrate, DEFAULT_MAX_BITRATE);
        or_default_num(&mut self.packet_size, DEFAULT_PACKET_SIZE);
        if self.source.as_deref() == Some("") {
            self.source = None;
        }
        self
    }

    /// Input arguments for snapshots
    pub fn image_source(&self) -> Option<&str> {
        self.still_image_source.as_deref().or(self.source.as_deref())
    }
}

impl CameraConfig {
    /// Build a validated camera; a missing source is fatal
    pub fn new(name: impl Into<String>, video: VideoConfig) -> Result<Self> {
        let name = name.into();
        let video = video.normalized();
        if video.source.is_none() {
            return Err(MediaError::MissingSource { camera: name });
        }
        Ok(Self {
            name,
            manufacturer: None,
            model: None,
            serial_number: None,
            firmware_revision: None,
            video,
        })
    }

    /// Main stream input arguments
    pub fn source(&self) -> &str {
        // Checked in `new`
        self.video.source.as_deref().unwrap_or_default()
    }
}

impl PlatformConfig {
    /// Parse a platform block from JSON text
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config = serde_json::from_str(json)
            .map_err(Error::from)
            .with_context("platform-config", "parse")?;
        Ok(config)
    }

    /// Read and parse a platform configuration file
    ///
    /// Accepts either the platform block itself or a full host config with a
    /// `platforms` array, in which case the first platform with cameras is used.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(Error::from)
            .with_context("platform-config", format!("read {}", path.display()))?;
        let value: serde_json::Value = serde_json::from_str(&text)
            .map_err(Error::from)
            .with_context("platform-config", "parse")?;

        let block = match value.get("platforms").and_then(|p| p.as_array()) {
            Some(platforms) => platforms
                .iter()
                .find(|p| p.get("cameras").is_some())
                .cloned()
                .ok_or_else(|| {
                    Error::config(format!("no platform with cameras in {}", path.display()))
                })?,
            None => value,
        };

        let config = serde_json::from_value(block)
            .map_err(Error::from)
            .with_context("platform-config", "decode")?;
        Ok(config)
    }

    /// Validated cameras
    ///
    /// Entries without a name or video configuration are skipped with a log
    /// line; an entry with a video configuration but no source is an error.
    pub fn camera_configs(&self) -> Result<Vec<CameraConfig>> {
        let mut cameras = Vec::with_capacity(self.cameras.len());
        for entry in &self.cameras {
            let (Some(name), Some(video)) = (entry.name.as_ref(), entry.video_config.as_ref())
            else {
                warn!("Missing parameters.");
                continue;
            };
            let mut camera = CameraConfig::new(name.clone(), video.clone())?;
            camera.manufacturer = entry.manufacturer.clone();
            camera.model = entry.model.clone();
            camera.serial_number = entry.serial_number.clone();
            camera.firmware_revision = entry.firmware_revision.clone();
            cameras.push(camera);
        }
        Ok(cameras)
    }

    /// Interface name, `None` when unset
    pub fn interface(&self) -> Option<&str> {
        if self.interface_name.is_empty() {
            None
        } else {
            Some(&self.interface_name)
        }
    }
}

fn default_video_processor() -> String {
    DEFAULT_VIDEO_PROCESSOR.to_string()
}
fn default_max_streams() -> usize {
    DEFAULT_MAX_STREAMS
}
fn default_max_width() -> u32 {
    DEFAULT_MAX_WIDTH
}
fn default_max_height() -> u32 {
    DEFAULT_MAX_HEIGHT
}
fn default_max_fps() -> u32 {
    DEFAULT_MAX_FPS
}
fn default_max_bitrate() -> u32 {
    DEFAULT_MAX_BITRATE
}
fn default_vcodec() -> String {
    DEFAULT_VCODEC.to_string()
}
fn default_acodec() -> String {
    DEFAULT_ACODEC.to_string()
}
fn default_packet_size() -> u32 {
    DEFAULT_PACKET_SIZE
}
fn default_additional_commandline() -> String {
    DEFAULT_ADDITIONAL_COMMANDLINE.to_string()
}
fn default_map_video() -> String {
    DEFAULT_MAP_VIDEO.to_string()
}
fn default_map_audio() -> String {
    DEFAULT_MAP_AUDIO.to_string()
}
fn default_speaker_sdp_dir() -> PathBuf {
    PathBuf::from(DEFAULT_SPEAKER_SDP_DIR)
}
fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const PLATFORM: &str = r#"{
        "platform": "Camera-ffmpeg",
        "interfaceName": "eth0",
        "bell": { "gpio": 17, "powergpio": 27 },
        "locker": { "gpio": 22, "seconds": 3 },
        "cameras": [
            {
                "name": "Front Door",
                "manufacturer": "Acme",
                "videoConfig": {
                    "source": "-re -i rtsp://10.0.0.5/stream",
                    "maxFPS": 30,
                    "audio": "2way -f alsa default",
                    "hflip": true
                }
            },
            { "name": "No Video" },
            { "videoConfig": { "source": "-i x" } }
        ]
    }"#;

    #[test]
    fn test_platform_defaults() {
        let platform = PlatformConfig::from_json_str(PLATFORM).unwrap();
        assert_eq!(platform.video_processor, "ffmpeg");
        assert_eq!(platform.interface(), Some("eth0"));

        let cameras = platform.camera_configs().unwrap();
        assert_eq!(cameras.len(), 1);

        let camera = &cameras[0];
        assert_eq!(camera.name, "Front Door");
        assert_eq!(camera.manufacturer.as_deref(), Some("Acme"));
        assert_eq!(camera.source(), "-re -i rtsp://10.0.0.5/stream");
        assert_eq!(camera.video.max_fps, 30);
        assert_eq!(camera.video.max_bitrate, 300);
        assert_eq!(camera.video.max_width, 1280);
        assert_eq!(camera.video.max_height, 720);
        assert_eq!(camera.video.max_streams, 2);
        assert_eq!(camera.video.vcodec, "libx264");
        assert_eq!(camera.video.acodec, "libfdk_aac");
        assert_eq!(camera.video.packet_size, 1316);
        assert_eq!(camera.video.additional_commandline, "-tune zerolatency");
        assert_eq!(camera.video.mapvideo, "0:0");
        assert_eq!(camera.video.mapaudio, "0:1");
        assert!(camera.video.hflip);
        assert!(!camera.video.vflip);
        assert_eq!(camera.video.video_filter, None);
        assert!(camera.video.reap_stray_processes);
    }

    #[test]
    fn test_missing_source_is_fatal() {
        let json = r#"{ "cameras": [ { "name": "Broken", "videoConfig": { "maxFPS": 15 } } ] }"#;
        let platform = PlatformConfig::from_json_str(json).unwrap();
        let err = platform.camera_configs().unwrap_err();
        assert!(matches!(err, MediaError::MissingSource { ref camera } if camera == "Broken"));

        let err = CameraConfig::new("Empty", VideoConfig {
            source: Some(String::new()),
            ..VideoConfig::with_source("x")
        })
        .unwrap_err();
        assert!(matches!(err, MediaError::MissingSource { .. }));
    }

    #[test]
    fn test_falsy_values_fall_back() {
        let json = r#"{
            "source": "-i x",
            "maxFPS": 0,
            "maxBitrate": 0,
            "vcodec": "",
            "additionalCommandline": "",
            "packetSize": 0
        }"#;
        let video: VideoConfig = serde_json::from_str(json).unwrap();
        let video = video.normalized();
        assert_eq!(video.max_fps, 10);
        assert_eq!(video.max_bitrate, 300);
        assert_eq!(video.vcodec, "libx264");
        assert_eq!(video.additional_commandline, "-tune zerolatency");
        assert_eq!(video.packet_size, 1316);
    }

    #[test]
    fn test_audio_setting() {
        let off = AudioSetting::Enabled(false);
        assert!(!off.is_enabled());
        assert!(!off.is_two_way());

        let on = AudioSetting::Enabled(true);
        assert!(on.is_enabled());
        assert!(!on.is_two_way());
        assert_eq!(on.speaker_output(), None);

        let empty = AudioSetting::Mode(String::new());
        assert!(!empty.is_enabled());

        let bare = AudioSetting::Mode("2way".to_string());
        assert!(bare.is_enabled());
        assert!(bare.is_two_way());
        assert_eq!(bare.speaker_output(), Some("-y speaker.mp4"));

        let alsa = AudioSetting::Mode("2way -f alsa plughw:1".to_string());
        assert_eq!(alsa.speaker_output(), Some(" -f alsa plughw:1"));

        let parsed: AudioSetting = serde_json::from_str("true").unwrap();
        assert_eq!(parsed, AudioSetting::Enabled(true));
        let parsed: AudioSetting = serde_json::from_str("\"2way\"").unwrap();
        assert!(parsed.is_two_way());
    }

    #[test]
    fn test_image_source_prefers_still() {
        let mut video = VideoConfig::with_source("-i main");
        assert_eq!(video.image_source(), Some("-i main"));
        video.still_image_source = Some("-i still.jpg".to_string());
        assert_eq!(video.image_source(), Some("-i still.jpg"));
    }

    #[test]
    fn test_load_full_host_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let host = format!(
            r#"{{ "bridge": {{ "name": "hb" }}, "platforms": [ {{ "platform": "Other" }}, {} ] }}"#,
            PLATFORM
        );
        std::fs::write(&path, host).unwrap();

        let platform = PlatformConfig::load(&path).unwrap();
        assert_eq!(platform.platform.as_deref(), Some("Camera-ffmpeg"));
        assert_eq!(platform.camera_configs().unwrap().len(), 1);

        let missing = PlatformConfig::load(dir.path().join("nope.json"));
        assert!(matches!(missing, Err(MediaError::Config(_))));
    }
}
