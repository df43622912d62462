//! # doorcam media-core
//!
//! Everything between a negotiated camera session and the external
//! transcoder process:
//!
//! - [`config`]: camera configuration as found in the platform JSON
//! - [`capabilities`]: what each camera advertises to its stream controllers
//! - [`profile`]: video/audio profile negotiation against camera ceilings
//! - [`command`]: typed transcoder argument lists (stream, snapshot, speaker)
//! - [`process`]: spawning, exit classification and termination of transcoders,
//!   plus the restart loop for the two-way audio playback process
//! - [`relay`]: the UDP relay that splits return audio off to the playback process
//! - [`sdp`]: the session description consumed by the playback process
//! - [`snapshot`]: one-shot still image capture

pub mod capabilities;
pub mod command;
pub mod config;
pub mod error;
pub mod process;
pub mod profile;
pub mod relay;
pub mod sdp;
pub mod snapshot;

pub use capabilities::{
    services, AudioCodecOption, ServiceKind, StreamControllerOptions, VideoResolution,
};
pub use command::{
    build_snapshot_command, build_speaker_command, split_fragment, AudioLeg, StreamCommandBuilder,
    StreamEndpoint, TranscoderCommand, VideoLeg,
};
pub use config::{AudioSetting, CameraConfig, PlatformConfig, VideoConfig};
pub use error::{MediaError, Result};
pub use process::{
    reap_stray_processes, spawn_supervised, start_speaker, ExitKind, ExitWatch, ProcessExit,
    RestartPolicy, SpeakerHandle, TranscoderProcess,
};
pub use profile::{AudioProfile, AudioRequest, VideoProfile, VideoRequest};
pub use relay::{route_for, RelayConfig, RelayHandle, RelayRoute, RelayStatsSnapshot, UdpRelay};
pub use sdp::{speaker_sdp_path, SpeakerSdp};
pub use snapshot::{SnapshotFetcher, SnapshotRequest};
