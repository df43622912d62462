//! Transcoder process supervision
//!
//! [`spawn_supervised`] starts a transcoder and hands back a
//! [`TranscoderProcess`] for termination plus an [`ExitWatch`] that resolves
//! once the process is gone. Exit codes are classified with [`ProcessExit::kind`].
//!
//! The two-way audio playback process runs under [`start_speaker`], which
//! respawns it on failure according to a [`RestartPolicy`].

mod speaker;
mod supervisor;

pub use speaker::{start_speaker, RestartPolicy, SpeakerHandle};
pub use supervisor::{reap_stray_processes, spawn_supervised, ExitWatch, TranscoderProcess};

use std::fmt;
use std::process::ExitStatus;

/// Exit code the transcoder uses when it is asked to quit
pub const INTERRUPTED_EXIT_CODE: i32 = 255;

/// How a transcoder ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitKind {
    /// Normal termination, a signal, or the transcoder's own interrupt code
    Clean,
    /// Any other exit code
    Failed(i32),
}

/// Exit code of a finished process; `None` when killed by a signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessExit {
    pub code: Option<i32>,
}

impl ProcessExit {
    pub fn new(code: Option<i32>) -> Self {
        Self { code }
    }

    pub fn kind(&self) -> ExitKind {
        match self.code {
            None | Some(0) | Some(INTERRUPTED_EXIT_CODE) => ExitKind::Clean,
            Some(code) => ExitKind::Failed(code),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.kind() == ExitKind::Clean
    }
}

impl From<ExitStatus> for ProcessExit {
    fn from(status: ExitStatus) -> Self {
        Self::new(status.code())
    }
}

impl fmt::Display for ProcessExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "{}", code),
            None => f.write_str("null"),
        }
    }
}
