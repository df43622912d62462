//! Config → command → process, end to end against stand-in executables

use std::time::Duration;

use doorcam_media_core::process::ExitKind;
use doorcam_media_core::{
    build_speaker_command, spawn_supervised, speaker_sdp_path, start_speaker, AudioLeg,
    AudioProfile, PlatformConfig, RestartPolicy, SpeakerSdp, StreamCommandBuilder, StreamEndpoint,
    VideoLeg, VideoProfile, VideoRequest,
};
use doorcam_rtp_core::{generate_ssrc, SrtpKeyMaterial};
use tokio_test::assert_ok;

const PLATFORM: &str = r#"{
    "platform": "Camera-ffmpeg",
    "cameras": [
        {
            "name": "Side Gate",
            "videoConfig": {
                "source": "-re -i rtsp://10.0.0.7/live",
                "maxFPS": 30,
                "maxBitrate": 500,
                "audio": "2way -f alsa default",
                "videoFilter": "",
                "vflip": true,
                "debug": true,
                "reapStrayProcesses": false,
                "speakerRestart": { "maxRestarts": 2 }
            }
        }
    ]
}"#;

fn material() -> SrtpKeyMaterial {
    SrtpKeyMaterial::new((0u8..16).collect::<Vec<_>>(), (16u8..30).collect::<Vec<_>>())
}

#[test]
fn test_platform_to_command_line() {
    let platform = assert_ok!(PlatformConfig::from_json_str(PLATFORM));
    let cameras = assert_ok!(platform.camera_configs());
    let camera = &cameras[0];
    assert!(!camera.video.reap_stray_processes);

    let request = VideoRequest { width: 1280, height: 720, fps: 24, max_bit_rate: 800 };
    let video = VideoLeg {
        profile: VideoProfile::negotiate(&camera.video, Some(&request)),
        endpoint: StreamEndpoint {
            address: "10.0.0.30".parse().unwrap(),
            port: 50000,
            srtp: material(),
            ssrc: generate_ssrc(),
        },
    };
    let audio = AudioLeg {
        profile: AudioProfile::negotiate(&camera.video, None),
        endpoint: StreamEndpoint {
            address: "10.0.0.30".parse().unwrap(),
            port: 50002,
            srtp: material(),
            ssrc: generate_ssrc(),
        },
    };

    let builder = StreamCommandBuilder::new(&platform.video_processor, camera);
    let cmd = assert_ok!(builder.build(&video, Some(&audio)));
    let line = cmd.to_command_line();

    assert!(line.starts_with("ffmpeg -re -i rtsp://10.0.0.7/live -map 0:0"));
    assert!(line.contains(" -r 24 "));
    assert!(line.contains(" -vf scale=1280:720,vflip "));
    assert!(line.contains(" -b:v 500k -bufsize 500k -maxrate 500k "));
    assert!(line.contains(
        "srtp://10.0.0.30:50000?rtcpport=50000&localrtcpport=50000&pkt_size=1316"
    ));
    assert!(line.contains(
        "srtp://127.0.0.1:50002?rtcpport=50002&localrtcpport=9998&pkt_size=1316"
    ));
    assert!(line.ends_with(" -loglevel debug"));
}

#[tokio::test]
async fn test_supervised_stream_process_is_terminated() {
    let mut cmd = doorcam_media_core::TranscoderCommand::new("yes");
    cmd.arg("frame");
    let (process, exit) = assert_ok!(spawn_supervised(&cmd, "stream", false));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!process.has_exited());
    assert!(process.terminate());

    let exit = tokio::time::timeout(Duration::from_secs(5), exit.wait()).await.unwrap();
    assert_eq!(exit.kind(), ExitKind::Clean);
}

#[tokio::test]
async fn test_speaker_restarts_are_capped() {
    let platform = PlatformConfig::from_json_str(PLATFORM).unwrap();
    let camera = platform.camera_configs().unwrap().remove(0);
    let dir = tempfile::tempdir().unwrap();

    let sdp_path = speaker_sdp_path(dir.path(), &camera.name);
    assert!(sdp_path.ends_with("Side_Gate_speaker.sdp"));
    assert_ok!(SpeakerSdp::new(32, &material()).write_to(&sdp_path).await);

    let output = camera.video.audio.speaker_output().unwrap();
    // `sh -v error ...` fails to open a script called `error`
    let cmd = assert_ok!(build_speaker_command("sh", &sdp_path, output));
    assert_eq!(camera.video.speaker_restart, RestartPolicy { max_restarts: Some(2), delay_ms: 0 });

    let handle = start_speaker(cmd, camera.video.speaker_restart, false);
    tokio::time::timeout(Duration::from_secs(10), async {
        while !handle.is_finished() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
    assert_eq!(handle.restart_count(), 2);
}
