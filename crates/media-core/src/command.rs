//! Transcoder command lines
//!
//! Arguments are appended as discrete tokens. Configured fragments such as
//! `source` or `additionalCommandline` are tokenized once with
//! [`split_fragment`], which honours quotes, so a value containing spaces can
//! be passed as `-i "/media/front door.mp4"`.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;
use std::process::Stdio;

use doorcam_rtp_core::{RtpSsrc, SrtpKeyMaterial, SRTP_AES128_CM_SHA1_80};

use crate::config::{CameraConfig, VideoConfig};
use crate::error::{MediaError, Result};
use crate::profile::{AudioProfile, VideoProfile};
use crate::relay::RELAY_RTCP_PORT;

pub const VIDEO_PAYLOAD_TYPE: u8 = 99;
pub const AUDIO_PAYLOAD_TYPE: u8 = 110;

/// A program and its argument tokens
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscoderCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl TranscoderCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Append one token
    pub fn arg(&mut self, arg: impl Into<String>) -> &mut Self {
        self.args.push(arg.into());
        self
    }

    /// Append `flag value`
    pub fn opt(&mut self, flag: &str, value: impl fmt::Display) -> &mut Self {
        self.args.push(flag.to_string());
        self.args.push(value.to_string());
        self
    }

    /// Tokenize a configured fragment and append the tokens
    pub fn extend_fragment(&mut self, fragment: &str) -> Result<&mut Self> {
        self.args.extend(split_fragment(fragment)?);
        Ok(self)
    }

    /// Shell-like rendering for logs and dry runs
    pub fn to_command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .map(quote_for_display)
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// A tokio command with stdin closed and the parent's environment
    pub fn to_tokio_command(&self) -> tokio::process::Command {
        let mut command = tokio::process::Command::new(&self.program);
        command.args(&self.args).stdin(Stdio::null());
        command
    }
}

impl fmt::Display for TranscoderCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_command_line())
    }
}

fn quote_for_display(token: &str) -> String {
    if token.is_empty() {
        "''".to_string()
    } else if token.chars().any(|c| c.is_whitespace() || c == '\'' || c == '"') {
        format!("'{}'", token.replace('\'', "'\\''"))
    } else {
        token.to_string()
    }
}

/// Split a configured fragment into tokens
///
/// Whitespace separates tokens. Single quotes keep everything literal,
/// double quotes allow `\"` and `\\`, and a backslash outside quotes escapes
/// the next character.
pub fn split_fragment(fragment: &str) -> Result<Vec<String>> {
    #[derive(PartialEq)]
    enum Quote {
        None,
        Single,
        Double,
    }

    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut quote = Quote::None;
    let mut chars = fragment.chars();

    while let Some(c) = chars.next() {
        match quote {
            Quote::Single => {
                if c == '\'' {
                    quote = Quote::None;
                } else {
                    current.push(c);
                }
            }
            Quote::Double => match c {
                '"' => quote = Quote::None,
                '\\' => match chars.next() {
                    Some(next @ ('"' | '\\')) => current.push(next),
                    Some(next) => {
                        current.push('\\');
                        current.push(next);
                    }
                    None => {
                        return Err(MediaError::invalid_fragment(fragment, "trailing backslash"))
                    }
                },
                _ => current.push(c),
            },
            Quote::None => match c {
                '\'' => {
                    quote = Quote::Single;
                    in_token = true;
                }
                '"' => {
                    quote = Quote::Double;
                    in_token = true;
                }
                '\\' => match chars.next() {
                    Some(next) => {
                        current.push(next);
                        in_token = true;
                    }
                    None => {
                        return Err(MediaError::invalid_fragment(fragment, "trailing backslash"))
                    }
                },
                c if c.is_whitespace() => {
                    if in_token {
                        tokens.push(std::mem::take(&mut current));
                        in_token = false;
                    }
                }
                c => {
                    current.push(c);
                    in_token = true;
                }
            },
        }
    }

    if quote != Quote::None {
        return Err(MediaError::invalid_fragment(fragment, "unterminated quote"));
    }
    if in_token {
        tokens.push(current);
    }
    Ok(tokens)
}

/// Where one output leg is sent and how it is protected
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEndpoint {
    pub address: IpAddr,
    pub port: u16,
    /// Master key and salt as sent by the controller
    pub srtp: SrtpKeyMaterial,
    pub ssrc: RtpSsrc,
}

impl StreamEndpoint {
    /// `srtp://` sink URL
    pub fn sink_url(&self, address: IpAddr, local_rtcp_port: u16, packet_size: u32) -> String {
        let host = match address {
            IpAddr::V4(v4) => v4.to_string(),
            IpAddr::V6(v6) => format!("[{}]", v6),
        };
        format!(
            "srtp://{}:{}?rtcpport={}&localrtcpport={}&pkt_size={}",
            host, self.port, self.port, local_rtcp_port, packet_size
        )
    }
}

#[derive(Debug, Clone)]
pub struct VideoLeg {
    pub profile: VideoProfile,
    pub endpoint: StreamEndpoint,
}

#[derive(Debug, Clone)]
pub struct AudioLeg {
    pub profile: AudioProfile,
    pub endpoint: StreamEndpoint,
}

/// Builds the primary stream command for one camera
#[derive(Debug, Clone)]
pub struct StreamCommandBuilder<'a> {
    processor: &'a str,
    camera: &'a CameraConfig,
}

impl<'a> StreamCommandBuilder<'a> {
    pub fn new(processor: &'a str, camera: &'a CameraConfig) -> Self {
        Self { processor, camera }
    }

    fn video(&self) -> &VideoConfig {
        &self.camera.video
    }

    /// Source, video leg, audio leg when audio is enabled, then debug flags
    pub fn build(&self, video: &VideoLeg, audio: Option<&AudioLeg>) -> Result<TranscoderCommand> {
        let config = self.video();
        let mut cmd = TranscoderCommand::new(self.processor);
        cmd.extend_fragment(self.camera.source())?;

        self.push_video(&mut cmd, video)?;

        if config.audio.is_enabled() {
            if let Some(audio) = audio {
                self.push_audio(&mut cmd, audio);
            }
        }

        if config.debug {
            cmd.opt("-loglevel", "debug");
        }
        Ok(cmd)
    }

    fn push_video(&self, cmd: &mut TranscoderCommand, leg: &VideoLeg) -> Result<()> {
        let config = self.video();
        let profile = &leg.profile;
        let bitrate = format!("{}k", profile.bitrate);

        cmd.opt("-map", &config.mapvideo)
            .opt("-vcodec", &profile.codec)
            .opt("-pix_fmt", profile.pixel_format)
            .opt("-r", profile.fps)
            .opt("-f", "rawvideo");
        cmd.extend_fragment(&config.additional_commandline)?;
        if let Some(filter) = &profile.filter {
            cmd.opt("-vf", filter);
        }
        cmd.opt("-b:v", &bitrate)
            .opt("-bufsize", &bitrate)
            .opt("-maxrate", &bitrate)
            .opt("-payload_type", VIDEO_PAYLOAD_TYPE);

        let endpoint = &leg.endpoint;
        push_srtp_output(
            cmd,
            endpoint,
            endpoint.sink_url(endpoint.address, endpoint.port, profile.packet_size),
        );
        Ok(())
    }

    fn push_audio(&self, cmd: &mut TranscoderCommand, leg: &AudioLeg) {
        let config = self.video();
        let profile = &leg.profile;
        let bitrate = format!("{}k", profile.bitrate);

        cmd.opt("-map", &config.mapaudio)
            .opt("-acodec", &profile.codec)
            .opt("-profile:a", "aac_eld")
            .opt("-flags", "+global_header")
            .opt("-f", "null")
            .opt("-ar", format!("{}k", profile.sample_rate))
            .opt("-b:a", &bitrate)
            .opt("-bufsize", &bitrate)
            .opt("-ac", profile.channels)
            .opt("-payload_type", AUDIO_PAYLOAD_TYPE);

        let endpoint = &leg.endpoint;
        // Two-way audio goes through the local relay, which owns the negotiated port
        let (address, local_rtcp_port) = if config.audio.is_two_way() {
            (IpAddr::V4(Ipv4Addr::LOCALHOST), RELAY_RTCP_PORT)
        } else {
            (endpoint.address, endpoint.port)
        };
        let url = endpoint.sink_url(address, local_rtcp_port, config.packet_size);
        push_srtp_output(cmd, endpoint, url);
    }
}

fn push_srtp_output(cmd: &mut TranscoderCommand, endpoint: &StreamEndpoint, url: String) {
    cmd.opt("-ssrc", endpoint.ssrc)
        .opt("-f", "rtp")
        .opt("-srtp_out_suite", SRTP_AES128_CM_SHA1_80.name)
        .opt("-srtp_out_params", endpoint.srtp.to_base64())
        .arg(url);
}

/// One-second still capture written to stdout
pub fn build_snapshot_command(
    processor: &str,
    camera: &CameraConfig,
    width: u32,
    height: u32,
) -> Result<TranscoderCommand> {
    let source = camera.video.image_source().unwrap_or(camera.source());
    let mut cmd = TranscoderCommand::new(processor);
    cmd.extend_fragment(source)?;
    cmd.opt("-t", 1)
        .opt("-s", format!("{}x{}", width, height))
        .opt("-f", "image2")
        .arg("-");
    Ok(cmd)
}

/// Playback of the return audio leg described by `sdp_path`
pub fn build_speaker_command(
    processor: &str,
    sdp_path: &Path,
    output: &str,
) -> Result<TranscoderCommand> {
    let mut cmd = TranscoderCommand::new(processor);
    cmd.opt("-v", "error")
        .arg("-nostats")
        .arg("-nostdin")
        .opt("-max_ts_probe", 0)
        .opt("-protocol_whitelist", "file,udp,rtp")
        .opt("-i", sdp_path.display());
    cmd.extend_fragment(output)?;
    Ok(cmd)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AudioSetting;
    use crate::profile::{AudioRequest, VideoRequest};
    use pretty_assertions::assert_eq;

    fn material() -> SrtpKeyMaterial {
        SrtpKeyMaterial::new(vec![1u8; 16], vec![2u8; 14])
    }

    fn camera(audio: AudioSetting) -> CameraConfig {
        let mut video = VideoConfig::with_source("-re -i rtsp://10.0.0.5/stream");
        video.audio = audio;
        video.max_fps = 30;
        CameraConfig::new("Front Door", video).unwrap()
    }

    fn legs(camera: &CameraConfig) -> (VideoLeg, AudioLeg) {
        let request = VideoRequest { width: 640, height: 480, fps: 15, max_bit_rate: 200 };
        let video = VideoLeg {
            profile: VideoProfile::negotiate(&camera.video, Some(&request)),
            endpoint: StreamEndpoint {
                address: "192.168.1.20".parse().unwrap(),
                port: 51000,
                srtp: material(),
                ssrc: 1234,
            },
        };
        let audio = AudioLeg {
            profile: AudioProfile::negotiate(
                &camera.video,
                Some(&AudioRequest {
                    max_bit_rate: 24,
                    sample_rate: 16,
                }),
            ),
            endpoint: StreamEndpoint {
                address: "192.168.1.20".parse().unwrap(),
                port: 51002,
                srtp: material(),
                ssrc: 5678,
            },
        };
        (video, audio)
    }

    fn strings(tokens: &[&str]) -> Vec<String> {
        tokens.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_video_only_command() {
        let camera = camera(AudioSetting::Enabled(false));
        let (video, audio) = legs(&camera);
        let cmd = StreamCommandBuilder::new("ffmpeg", &camera).build(&video, Some(&audio)).unwrap();
        let key = material().to_base64();

        assert_eq!(cmd.program, "ffmpeg");
        assert_eq!(
            cmd.args,
            strings(&[
                "-re", "-i", "rtsp://10.0.0.5/stream",
                "-map", "0:0", "-vcodec", "libx264", "-pix_fmt", "yuv420p", "-r", "15",
                "-f", "rawvideo", "-tune", "zerolatency",
                "-b:v", "200k", "-bufsize", "200k", "-maxrate", "200k", "-payload_type", "99",
                "-ssrc", "1234", "-f", "rtp",
                "-srtp_out_suite", "AES_CM_128_HMAC_SHA1_80", "-srtp_out_params", key.as_str(),
                "srtp://192.168.1.20:51000?rtcpport=51000&localrtcpport=51000&pkt_size=1316",
            ])
        );
    }

    #[test]
    fn test_audio_leg_direct() {
        let camera = camera(AudioSetting::Enabled(true));
        let (video, audio) = legs(&camera);
        let cmd = StreamCommandBuilder::new("ffmpeg", &camera).build(&video, Some(&audio)).unwrap();

        let start = cmd.args.iter().position(|a| a == "0:1").unwrap() - 1;
        let key = material().to_base64();
        assert_eq!(
            cmd.args[start..].to_vec(),
            strings(&[
                "-map", "0:1", "-acodec", "libfdk_aac", "-profile:a", "aac_eld",
                "-flags", "+global_header", "-f", "null", "-ar", "16k",
                "-b:a", "24k", "-bufsize", "24k", "-ac", "1", "-payload_type", "110",
                "-ssrc", "5678", "-f", "rtp",
                "-srtp_out_suite", "AES_CM_128_HMAC_SHA1_80", "-srtp_out_params", key.as_str(),
                "srtp://192.168.1.20:51002?rtcpport=51002&localrtcpport=51002&pkt_size=1316",
            ])
        );
    }

    #[test]
    fn test_two_way_audio_goes_to_relay() {
        let camera = camera(AudioSetting::Mode("2way".to_string()));
        let (video, audio) = legs(&camera);
        let cmd = StreamCommandBuilder::new("ffmpeg", &camera).build(&video, Some(&audio)).unwrap();
        assert_eq!(
            cmd.args.last().map(String::as_str),
            Some("srtp://127.0.0.1:51002?rtcpport=51002&localrtcpport=9998&pkt_size=1316")
        );
    }

    #[test]
    fn test_filter_and_debug_flags() {
        let mut camera = camera(AudioSetting::Enabled(false));
        camera.video.video_filter = Some(String::new());
        camera.video.hflip = true;
        camera.video.debug = true;
        let (video, _) = legs(&camera);
        let cmd = StreamCommandBuilder::new("ffmpeg", &camera).build(&video, None).unwrap();

        let vf = cmd.args.iter().position(|a| a == "-vf").unwrap();
        assert_eq!(cmd.args[vf + 1], "scale=640:480,hflip");
        assert_eq!(cmd.args[vf - 1], "zerolatency");
        assert_eq!(cmd.args[cmd.args.len() - 2..].to_vec(), strings(&["-loglevel", "debug"]));

        camera.video.video_filter = Some("none".to_string());
        let (video, _) = legs(&camera);
        let cmd = StreamCommandBuilder::new("ffmpeg", &camera).build(&video, None).unwrap();
        assert!(!cmd.args.iter().any(|a| a == "-vf"));
    }

    #[test]
    fn test_ipv6_target_is_bracketed() {
        let camera = camera(AudioSetting::Enabled(false));
        let (mut video, _) = legs(&camera);
        video.endpoint.address = "fe80::1".parse().unwrap();
        let cmd = StreamCommandBuilder::new("ffmpeg", &camera).build(&video, None).unwrap();
        assert!(cmd.args.last().unwrap().starts_with("srtp://[fe80::1]:51000?"));
    }

    #[test]
    fn test_snapshot_command() {
        let mut camera = camera(AudioSetting::Enabled(false));
        let cmd = build_snapshot_command("ffmpeg", &camera, 640, 360).unwrap();
        assert_eq!(
            cmd.args,
            strings(&[
                "-re",
                "-i",
                "rtsp://10.0.0.5/stream",
                "-t",
                "1",
                "-s",
                "640x360",
                "-f",
                "image2",
                "-",
            ])
        );

        camera.video.still_image_source = Some("-i http://cam/still.jpg".to_string());
        let cmd = build_snapshot_command("ffmpeg", &camera, 640, 360).unwrap();
        assert_eq!(cmd.args[..2].to_vec(), strings(&["-i", "http://cam/still.jpg"]));
    }

    #[test]
    fn test_speaker_command() {
        let sdp = Path::new("/homebridge/Front_Door_speaker.sdp");
        let cmd = build_speaker_command("ffmpeg", sdp, " -f alsa plughw:1").unwrap();
        assert_eq!(
            cmd.args,
            strings(&[
                "-v", "error", "-nostats", "-nostdin", "-max_ts_probe", "0",
                "-protocol_whitelist", "file,udp,rtp", "-i", "/homebridge/Front_Door_speaker.sdp",
                "-f", "alsa", "plughw:1",
            ])
        );
    }

    #[test]
    fn test_split_fragment() {
        assert_eq!(
            split_fragment("  -re  -i rtsp://x ").unwrap(),
            strings(&["-re", "-i", "rtsp://x"])
        );
        assert_eq!(
            split_fragment(r#"-i "/media/front door.mp4" -metadata 'title=a b'"#).unwrap(),
            strings(&["-i", "/media/front door.mp4", "-metadata", "title=a b"])
        );
        assert_eq!(split_fragment(r"a\ b").unwrap(), strings(&["a b"]));
        assert_eq!(split_fragment(r#"-x """#).unwrap(), strings(&["-x", ""]));
        assert!(split_fragment("").unwrap().is_empty());
        assert!(matches!(split_fragment("-i 'open"), Err(MediaError::InvalidFragment { .. })));
    }

    #[test]
    fn test_command_line_rendering() {
        let mut cmd = TranscoderCommand::new("ffmpeg");
        cmd.arg("-i").arg("front door.mp4").arg("-");
        assert_eq!(cmd.to_command_line(), "ffmpeg -i 'front door.mp4' -");
    }
}
