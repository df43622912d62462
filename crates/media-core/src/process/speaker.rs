use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::{spawn_supervised, ExitKind};
use crate::command::TranscoderCommand;

/// When to respawn the playback transcoder after a failed exit
///
/// The default never gives up and restarts immediately.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RestartPolicy {
    /// Upper bound on restarts per session, unbounded when `None`
    pub max_restarts: Option<u32>,
    /// Pause before each restart
    pub delay_ms: u64,
}

impl RestartPolicy {
    /// Whether restart number `ordinal` (1-based) may happen
    pub fn allows(&self, ordinal: u32) -> bool {
        self.max_restarts.map_or(true, |max| ordinal <= max)
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

/// Handle to the playback transcoder loop
///
/// Stopping (or dropping) the handle terminates the current process and
/// ends the loop.
#[derive(Debug)]
pub struct SpeakerHandle {
    shutdown: watch::Sender<bool>,
    restarts: Arc<AtomicU32>,
    task: JoinHandle<()>,
}

impl SpeakerHandle {
    pub fn stop(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Restarts performed so far
    pub fn restart_count(&self) -> u32 {
        self.restarts.load(Ordering::SeqCst)
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the loop to end
    pub async fn join(mut self) {
        let _ = (&mut self.task).await;
    }
}

impl Drop for SpeakerHandle {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
    }
}

/// Run the playback transcoder, respawning it on failed exits
pub fn start_speaker(
    command: TranscoderCommand,
    policy: RestartPolicy,
    debug: bool,
) -> SpeakerHandle {
    let (shutdown, shutdown_rx) = watch::channel(false);
    let restarts = Arc::new(AtomicU32::new(0));
    let task = tokio::spawn(run_speaker(command, policy, debug, shutdown_rx, restarts.clone()));
    SpeakerHandle {
        shutdown,
        restarts,
        task,
    }
}

async fn run_speaker(
    command: TranscoderCommand,
    policy: RestartPolicy,
    debug: bool,
    mut shutdown: watch::Receiver<bool>,
    restarts: Arc<AtomicU32>,
) {
    if debug {
        debug!("[Speaker] {}", command);
    }

    loop {
        if *shutdown.borrow() {
            break;
        }

        let (process, exit) = match spawn_supervised(&command, "speaker", debug) {
            Ok(spawned) => spawned,
            Err(e) => {
                error!("An error occurs while making Speaker stream request");
                if debug {
                    debug!(error = %e, "speaker spawn failed");
                }
                break;
            }
        };

        let exit = tokio::select! {
            _ = shutdown.changed() => {
                process.terminate();
                break;
            }
            exit = exit.wait() => exit,
        };

        let code = match exit.kind() {
            ExitKind::Clean => {
                info!("Speaker Stopped streaming");
                break;
            }
            ExitKind::Failed(code) => code,
        };

        error!("ERROR: Speaker FFmpeg exited with code {}", code);
        let ordinal = restarts.load(Ordering::SeqCst) + 1;
        if !policy.allows(ordinal) {
            error!(restarts = ordinal - 1, "Speaker restart limit reached, giving up");
            break;
        }
        restarts.store(ordinal, Ordering::SeqCst);
        info!(restart = ordinal, "Restarting speaker transcoder");

        if !policy.delay().is_zero() {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = tokio::time::sleep(policy.delay()) => {}
            }
        }
    }
}
