//! One-shot still image capture

use std::process::Stdio;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::command::build_snapshot_command;
use crate::config::CameraConfig;

/// Requested image size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotRequest {
    pub width: u32,
    pub height: u32,
}

/// Runs the transcoder for a single frame of a camera
#[derive(Debug, Clone)]
pub struct SnapshotFetcher {
    processor: String,
    camera: CameraConfig,
}

impl SnapshotFetcher {
    pub fn new(processor: impl Into<String>, camera: &CameraConfig) -> Self {
        Self {
            processor: processor.into(),
            camera: camera.clone(),
        }
    }

    /// Capture one image
    ///
    /// Whatever the transcoder wrote to stdout is returned, whatever its exit
    /// code. Failures to start it are logged and yield an empty buffer.
    pub async fn fetch(&self, request: &SnapshotRequest) -> Bytes {
        let debug_enabled = self.camera.video.debug;
        info!(
            "Snapshot from {} at {}x{}",
            self.camera.name, request.width, request.height
        );

        let built =
            build_snapshot_command(&self.processor, &self.camera, request.width, request.height);
        let command = match built {
            Ok(command) => command,
            Err(e) => {
                error!(camera = %self.camera.name, error = %e, "Invalid snapshot command");
                return Bytes::new();
            }
        };
        if debug_enabled {
            debug!("{}", command);
        }

        let output = command
            .to_tokio_command()
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .output()
            .await;

        match output {
            Ok(output) => {
                if !output.status.success() {
                    debug!(
                        camera = %self.camera.name,
                        status = %output.status,
                        "snapshot transcoder exited"
                    );
                }
                Bytes::from(output.stdout)
            }
            Err(e) => {
                error!("An error occurs while making snapshot request");
                if debug_enabled {
                    error!(error = %e, "snapshot spawn failed");
                }
                Bytes::new()
            }
        }
    }
}
