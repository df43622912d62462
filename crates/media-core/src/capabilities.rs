//! What a camera advertises to its stream controllers

use serde::Serialize;

use crate::config::{CameraConfig, VideoConfig};

/// Frame rate ceiling advertised for any resolution
pub const MAX_ADVERTISED_FPS: u32 = 30;

/// Reduced frame rate offered for the smallest resolutions
pub const LOW_FPS: u32 = 15;

/// `[width, height, fps]` as the host expects it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VideoResolution(pub u32, pub u32, pub u32);

impl VideoResolution {
    pub fn width(&self) -> u32 {
        self.0
    }

    pub fn height(&self) -> u32 {
        self.1
    }

    pub fn fps(&self) -> u32 {
        self.2
    }
}

/// One audio codec offer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AudioCodecOption {
    #[serde(rename = "type")]
    pub codec: &'static str,
    /// Sample rate in kHz
    pub samplerate: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VideoCodecOptions {
    pub profiles: Vec<u8>,
    pub levels: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VideoOptions {
    pub resolutions: Vec<VideoResolution>,
    pub codec: VideoCodecOptions,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AudioOptions {
    pub codecs: Vec<AudioCodecOption>,
}

/// Options handed to every stream controller of a camera
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamControllerOptions {
    pub proxy: bool,
    pub srtp: bool,
    pub video: VideoOptions,
    pub audio: AudioOptions,
}

/// Services a camera accessory exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ServiceKind {
    CameraControl,
    Microphone,
    Speaker,
}

impl StreamControllerOptions {
    /// Options for a camera, computed from its ceilings
    pub fn for_camera(camera: &CameraConfig) -> Self {
        Self::for_video(&camera.video)
    }

    pub fn for_video(video: &VideoConfig) -> Self {
        Self {
            proxy: false,
            srtp: true,
            video: VideoOptions {
                resolutions: resolutions(video.max_width, video.max_height, video.max_fps),
                codec: VideoCodecOptions {
                    profiles: vec![0, 1, 2],
                    levels: vec![0, 1, 2],
                },
            },
            audio: AudioOptions {
                codecs: vec![
                    AudioCodecOption { codec: "OPUS", samplerate: 24 },
                    AudioCodecOption { codec: "AAC-eld", samplerate: 16 },
                ],
            },
        }
    }
}

/// Resolutions allowed by the given ceilings, smallest first
pub fn resolutions(max_width: u32, max_height: u32, max_fps: u32) -> Vec<VideoResolution> {
    let fps = max_fps.min(MAX_ADVERTISED_FPS);
    let fits = |w: u32, h: u32| w <= max_width && h <= max_height;
    let mut out = Vec::new();

    if fits(320, 240) {
        out.push(VideoResolution(320, 240, fps));
        if fps > LOW_FPS {
            out.push(VideoResolution(320, 240, LOW_FPS));
        }
    }
    if fits(320, 180) {
        out.push(VideoResolution(320, 180, fps));
        if fps > LOW_FPS {
            out.push(VideoResolution(320, 180, LOW_FPS));
        }
    }
    for (w, h) in [
        (480, 360),
        (480, 270),
        (640, 480),
        (640, 360),
        (1280, 960),
        (1280, 720),
        (1920, 1080),
    ] {
        if fits(w, h) {
            out.push(VideoResolution(w, h, fps));
        }
    }
    out
}

/// Services for a camera, in registration order
pub fn services(video: &VideoConfig) -> Vec<ServiceKind> {
    let mut services = vec![ServiceKind::CameraControl];
    if video.audio.is_enabled() {
        services.push(ServiceKind::Microphone);
        if video.audio.is_two_way() {
            services.push(ServiceKind::Speaker);
        }
    }
    services
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AudioSetting;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_ceilings() {
        let res = resolutions(1280, 720, 10);
        assert_eq!(
            res,
            vec![
                VideoResolution(320, 240, 10),
                VideoResolution(320, 180, 10),
                VideoResolution(480, 360, 10),
                VideoResolution(480, 270, 10),
                VideoResolution(640, 480, 10),
                VideoResolution(640, 360, 10),
                VideoResolution(1280, 720, 10),
            ]
        );
    }

    #[test]
    fn test_fps_capped_and_low_variants() {
        let res = resolutions(1920, 1080, 60);
        assert_eq!(res[0], VideoResolution(320, 240, 30));
        assert_eq!(res[1], VideoResolution(320, 240, 15));
        assert_eq!(res[2], VideoResolution(320, 180, 30));
        assert_eq!(res[3], VideoResolution(320, 180, 15));
        assert_eq!(res.last(), Some(&VideoResolution(1920, 1080, 30)));
        assert!(res.contains(&VideoResolution(1280, 960, 30)));
        assert_eq!(res.len(), 11);
    }

    #[test]
    fn test_small_ceiling() {
        assert_eq!(resolutions(320, 200, 15), vec![VideoResolution(320, 180, 15)]);
        assert!(resolutions(100, 100, 15).is_empty());
    }

    #[test]
    fn test_services() {
        let mut video = VideoConfig::with_source("-i x");
        assert_eq!(services(&video), vec![ServiceKind::CameraControl]);

        video.audio = AudioSetting::Enabled(true);
        assert_eq!(services(&video), vec![ServiceKind::CameraControl, ServiceKind::Microphone]);

        video.audio = AudioSetting::Mode("2way".to_string());
        assert_eq!(
            services(&video),
            vec![ServiceKind::CameraControl, ServiceKind::Microphone, ServiceKind::Speaker]
        );
    }

    #[test]
    fn test_options_shape() {
        let video = VideoConfig::with_source("-i x");
        let options = StreamControllerOptions::for_video(&video);
        assert!(!options.proxy);
        assert!(options.srtp);
        assert_eq!(options.video.codec.profiles, vec![0, 1, 2]);

        let json = serde_json::to_value(&options).unwrap();
        assert_eq!(json["audio"]["codecs"][1]["type"], "AAC-eld");
        assert_eq!(json["video"]["resolutions"][0], serde_json::json!([320, 240, 10]));
    }
}
