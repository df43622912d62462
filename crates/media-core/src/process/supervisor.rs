use std::path::Path;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr};
use tokio::sync::{oneshot, Notify};
use tracing::{debug, info, warn};

use super::ProcessExit;
use crate::command::TranscoderCommand;
use crate::error::{MediaError, Result};

#[derive(Debug, Default)]
struct ProcessState {
    exited: AtomicBool,
    terminate_requested: AtomicBool,
    terminate: Notify,
}

/// Handle to a running transcoder
///
/// The child itself is owned by a monitor task; this handle only asks it to
/// terminate. Dropping the handle leaves the process running.
#[derive(Debug, Clone)]
pub struct TranscoderProcess {
    label: String,
    pid: Option<u32>,
    state: Arc<ProcessState>,
}

impl TranscoderProcess {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn has_exited(&self) -> bool {
        self.state.exited.load(Ordering::SeqCst)
    }

    /// Send SIGTERM once
    ///
    /// Returns `false` when the process already exited or a termination was
    /// already requested; neither case signals again.
    pub fn terminate(&self) -> bool {
        if self.has_exited() {
            return false;
        }
        if self.state.terminate_requested.swap(true, Ordering::SeqCst) {
            return false;
        }
        debug!(process = %self.label, pid = ?self.pid, "Terminating transcoder");
        self.state.terminate.notify_one();
        true
    }
}

/// Resolves with the exit of a supervised process
#[derive(Debug)]
pub struct ExitWatch {
    rx: oneshot::Receiver<ProcessExit>,
}

impl ExitWatch {
    /// Wait for the exit; a lost monitor counts as a signal death
    pub async fn wait(self) -> ProcessExit {
        self.rx.await.unwrap_or(ProcessExit::new(None))
    }
}

/// Spawn `command` with stdout discarded and stderr drained
///
/// Stderr is always read so the transcoder never stalls on a full pipe; it
/// is only logged when `debug` is set. Must be called inside a tokio runtime.
pub fn spawn_supervised(
    command: &TranscoderCommand,
    label: impl Into<String>,
    debug: bool,
) -> Result<(TranscoderProcess, ExitWatch)> {
    let label = label.into();
    let mut child = command
        .to_tokio_command()
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| MediaError::Spawn {
            program: command.program.clone(),
            source,
        })?;

    let pid = child.id();
    if debug {
        debug!(process = %label, pid = ?pid, "{}", command);
    }

    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(drain_stderr(stderr, label.clone(), debug));
    }

    let state = Arc::new(ProcessState::default());
    let (tx, rx) = oneshot::channel();
    tokio::spawn(monitor(child, state.clone(), label.clone(), tx));

    Ok((TranscoderProcess { label, pid, state }, ExitWatch { rx }))
}

async fn drain_stderr(stderr: ChildStderr, label: String, debug: bool) {
    let mut reader = BufReader::new(stderr);
    let mut line = Vec::new();
    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line).await {
            Ok(0) => break,
            Ok(_) => {
                if debug {
                    debug!(process = %label, "{}", String::from_utf8_lossy(&line).trim_end());
                }
            }
            Err(e) => {
                debug!(process = %label, error = %e, "stderr closed");
                break;
            }
        }
    }
}

async fn monitor(
    mut child: Child,
    state: Arc<ProcessState>,
    label: String,
    tx: oneshot::Sender<ProcessExit>,
) {
    let mut signalled = false;
    let exit = loop {
        tokio::select! {
            status = child.wait() => {
                break match status {
                    Ok(status) => ProcessExit::from(status),
                    Err(e) => {
                        warn!(process = %label, error = %e, "Failed to wait for transcoder");
                        ProcessExit::new(None)
                    }
                };
            }
            _ = state.terminate.notified(), if !signalled => {
                signalled = true;
                send_sigterm(&mut child, &label);
            }
        }
    };

    state.exited.store(true, Ordering::SeqCst);
    debug!(process = %label, code = %exit, "Transcoder exited");
    let _ = tx.send(exit);
}

#[cfg(unix)]
fn send_sigterm(child: &mut Child, label: &str) {
    use nix::errno::Errno;
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let Some(pid) = child.id() else {
        return;
    };
    match kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => warn!(process = %label, pid, error = %e, "Failed to signal transcoder"),
    }
}

#[cfg(not(unix))]
fn send_sigterm(child: &mut Child, label: &str) {
    if let Err(e) = child.start_kill() {
        warn!(process = %label, error = %e, "Failed to kill transcoder");
    }
}

/// Kill leftover transcoders with the same executable name, system-wide
pub async fn reap_stray_processes(processor: &str) {
    let name = Path::new(processor)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| processor.to_string());

    info!("killall -9 {}", name);
    let result = tokio::process::Command::new("killall")
        .arg("-9")
        .arg(&name)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;
    if let Err(e) = result {
        debug!(error = %e, "killall unavailable");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::ExitKind;
    use std::time::Duration;

    fn sh(script: &str) -> TranscoderCommand {
        let mut cmd = TranscoderCommand::new("sh");
        cmd.arg("-c").arg(script);
        cmd
    }

    #[tokio::test]
    async fn test_clean_exit() {
        let (process, exit) = spawn_supervised(&sh("echo done >&2; exit 0"), "test", true).unwrap();
        assert!(process.pid().is_some());
        let exit = exit.wait().await;
        assert_eq!(exit.kind(), ExitKind::Clean);
        assert!(process.has_exited());
        assert!(!process.terminate());
    }

    #[tokio::test]
    async fn test_failed_exit() {
        let (_process, exit) = spawn_supervised(&sh("exit 3"), "test", false).unwrap();
        assert_eq!(exit.wait().await.kind(), ExitKind::Failed(3));
    }

    #[tokio::test]
    async fn test_terminate_once() {
        let mut cmd = TranscoderCommand::new("sleep");
        cmd.arg("30");
        let (process, exit) = spawn_supervised(&cmd, "sleeper", false).unwrap();

        assert!(process.terminate());
        assert!(!process.terminate());

        let exit = tokio::time::timeout(Duration::from_secs(5), exit.wait()).await.unwrap();
        assert_eq!(exit.code, None);
        assert!(exit.is_clean());
        assert!(!process.terminate());
    }

    #[tokio::test]
    async fn test_spawn_error() {
        let cmd = TranscoderCommand::new("/nonexistent/doorcam-transcoder");
        let err = spawn_supervised(&cmd, "missing", false).unwrap_err();
        assert!(matches!(
            err,
            MediaError::Spawn { ref program, .. } if program == "/nonexistent/doorcam-transcoder"
        ));
    }

    #[tokio::test]
    async fn test_chatty_stderr_does_not_block() {
        let script = "i=0; while [ $i -lt 2000 ]; do echo line $i >&2; i=$((i+1)); done";
        let (_process, exit) = spawn_supervised(&sh(script), "chatty", false).unwrap();
        let exit = tokio::time::timeout(Duration::from_secs(10), exit.wait()).await.unwrap();
        assert!(exit.is_clean());
    }
}
