use std::net::IpAddr;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use doorcam_infra_common::{log_welcome, setup_logging, LoggingConfig};
use doorcam_media_core::{
    AudioLeg, AudioProfile, PlatformConfig, SnapshotRequest, StreamCommandBuilder, StreamEndpoint,
    VideoLeg, VideoProfile, VideoRequest,
};
use doorcam_rtp_core::ssrc::generate_ssrc;
use doorcam_rtp_core::SrtpKeyMaterial;
use doorcam_session_core::CameraStreamSource;

#[derive(Parser)]
#[command(name = "doorcam", version, about = "Inspect doorcam camera configurations")]
struct Cli {
    /// Platform or host configuration file
    #[arg(short, long, env = "DOORCAM_CONFIG", default_value = "config.json")]
    config: PathBuf,

    /// Verbose logging
    #[arg(long)]
    debug: bool,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List configured cameras with their stream options
    Cameras,
    /// Capture one still image
    Snapshot {
        #[arg(long)]
        camera: String,
        #[arg(long, default_value_t = 1280)]
        width: u32,
        #[arg(long, default_value_t = 720)]
        height: u32,
        #[arg(short, long, default_value = "snapshot.jpg")]
        output: PathBuf,
    },
    /// Print the transcoder command a stream request would run
    Command {
        #[arg(long)]
        camera: String,
        #[arg(long)]
        width: Option<u32>,
        #[arg(long)]
        height: Option<u32>,
        #[arg(long)]
        fps: Option<u32>,
        #[arg(long)]
        bitrate: Option<u32>,
        /// Controller address the stream would be sent to
        #[arg(long, default_value = "127.0.0.1")]
        target: IpAddr,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let platform = PlatformConfig::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    let camera_debug = platform
        .cameras
        .iter()
        .any(|entry| entry.video_config.as_ref().is_some_and(|video| video.debug));
    let mut logging = LoggingConfig::default().with_debug(cli.debug || camera_debug);
    if cli.json_logs {
        logging = logging.with_json();
    }
    setup_logging(logging)?;
    log_welcome("doorcam", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Cameras => list_cameras(&platform)?,
        Commands::Snapshot { camera, width, height, output } => {
            let source = find_camera(&platform, &camera)?;
            let image = source.handle_snapshot_request(SnapshotRequest { width, height }).await;
            if image.is_empty() {
                return Err(anyhow!("{} returned no image", camera));
            }
            tokio::fs::write(&output, &image)
                .await
                .with_context(|| format!("writing {}", output.display()))?;
            info!("Wrote {} bytes to {}", image.len(), output.display());
        }
        Commands::Command { camera, width, height, fps, bitrate, target } => {
            let source = find_camera(&platform, &camera)?;
            let config = &source.camera().video;
            let request = VideoRequest {
                width: width.unwrap_or(config.max_width),
                height: height.unwrap_or(config.max_height),
                fps: fps.unwrap_or(config.max_fps),
                max_bit_rate: bitrate.unwrap_or(config.max_bitrate),
            };
            let video = VideoLeg {
                profile: VideoProfile::negotiate(config, Some(&request)),
                endpoint: sample_endpoint(target, 51000),
            };
            let audio = AudioLeg {
                profile: AudioProfile::negotiate(config, None),
                endpoint: sample_endpoint(target, 51002),
            };
            let command = StreamCommandBuilder::new(&platform.video_processor, source.camera())
                .build(&video, Some(&audio))?;
            println!("{}", command.to_command_line());
        }
    }
    Ok(())
}

fn list_cameras(platform: &PlatformConfig) -> Result<()> {
    for source in CameraStreamSource::from_platform(platform)? {
        let camera = source.camera();
        let summary = serde_json::json!({
            "name": camera.name,
            "source": camera.source(),
            "streams": source.stream_count(),
            "services": source.services(),
            "options": source.stream_options(),
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }
    Ok(())
}

fn find_camera(platform: &PlatformConfig, name: &str) -> Result<CameraStreamSource> {
    CameraStreamSource::from_platform(platform)?
        .into_iter()
        .find(|source| source.camera().name == name)
        .ok_or_else(|| anyhow!("no camera named '{}'", name))
}

/// Endpoint with throwaway keys, for rendering a command without a controller
fn sample_endpoint(address: IpAddr, port: u16) -> StreamEndpoint {
    StreamEndpoint {
        address,
        port,
        srtp: SrtpKeyMaterial::new(
            rand::random::<[u8; 16]>().to_vec(),
            rand::random::<[u8; 14]>().to_vec(),
        ),
        ssrc: generate_ssrc(),
    }
}
