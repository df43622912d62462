//! Session registry
//!
//! Owns every session of one camera, keyed by token. A session moves
//! `Pending` (after prepare) → `Starting` (start reserved it) → `Active`
//! (transcoder running) and is removed on stop or process exit. The
//! `Starting` reservation is what keeps two concurrent starts for one token
//! from spawning two transcoders.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::Mutex;
use tracing::{debug, info};

use doorcam_media_core::{
    RelayHandle, RelayStatsSnapshot, SpeakerHandle, StreamEndpoint, TranscoderProcess,
};

use crate::session::SessionToken;

/// Parameters negotiated at prepare time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSession {
    pub target_address: IpAddr,
    pub video: Option<StreamEndpoint>,
    pub audio: Option<StreamEndpoint>,
}

/// Resources owned by a running session
#[derive(Debug)]
pub struct ActiveSession {
    /// Distinguishes this run from a later session reusing the token
    pub generation: u64,
    pub process: TranscoderProcess,
    pub relay: Option<RelayHandle>,
    pub speaker: Option<SpeakerHandle>,
}

impl ActiveSession {
    /// Terminate the transcoder and release the relay and speaker
    pub async fn teardown(self) -> Option<RelayStatsSnapshot> {
        self.process.terminate();
        self.release().await
    }

    /// Release the relay and speaker; the transcoder is left alone
    ///
    /// Returns the relay's final counters when the session had one.
    pub async fn release(self) -> Option<RelayStatsSnapshot> {
        if let Some(speaker) = &self.speaker {
            speaker.stop();
        }
        let relay = self.relay?;
        let local_addr = relay.local_addr();
        let stats = relay.shutdown().await;
        info!(
            relay = %local_addr,
            to_local = stats.packets_to_local,
            to_remote = stats.packets_to_remote,
            bytes = stats.bytes_relayed,
            send_errors = stats.send_errors,
            "Audio relay closed"
        );
        Some(stats)
    }
}

#[derive(Debug)]
enum SessionState {
    Pending(PendingSession),
    Starting,
    Active(ActiveSession),
}

/// Phase of a registered session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Pending,
    Starting,
    Active,
}

#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<SessionToken, SessionState>>,
    generation: AtomicU64,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a prepared session
    ///
    /// A running session under the same token is displaced and returned so
    /// the caller can tear it down.
    pub async fn insert_pending(
        &self,
        token: SessionToken,
        pending: PendingSession,
    ) -> Option<ActiveSession> {
        let mut sessions = self.sessions.lock().await;
        let previous = sessions.insert(token, SessionState::Pending(pending));
        debug!(session = %token, "Registered pending session");
        match previous {
            Some(SessionState::Active(active)) => Some(active),
            _ => None,
        }
    }

    /// Claim a pending session for starting
    ///
    /// Returns `None` for unknown tokens and for sessions already starting
    /// or active.
    pub async fn take_pending(&self, token: &SessionToken) -> Option<PendingSession> {
        let mut sessions = self.sessions.lock().await;
        let state = sessions.get_mut(token)?;
        if !matches!(state, SessionState::Pending(_)) {
            return None;
        }
        match std::mem::replace(state, SessionState::Starting) {
            SessionState::Pending(pending) => Some(pending),
            _ => None,
        }
    }

    /// Complete a start
    ///
    /// Fails, handing the session back, when a stop removed the reservation
    /// in the meantime.
    pub async fn activate(
        &self,
        token: SessionToken,
        active: ActiveSession,
    ) -> Result<(), ActiveSession> {
        let mut sessions = self.sessions.lock().await;
        if !matches!(sessions.get(&token), Some(SessionState::Starting)) {
            return Err(active);
        }
        sessions.insert(token, SessionState::Active(active));
        Ok(())
    }

    /// Drop a reservation whose start failed
    pub async fn abandon(&self, token: &SessionToken) {
        let mut sessions = self.sessions.lock().await;
        if matches!(sessions.get(token), Some(SessionState::Starting)) {
            sessions.remove(token);
        }
    }

    /// Remove a session in any phase, returning it if it was running
    pub async fn stop(&self, token: &SessionToken) -> Option<ActiveSession> {
        let mut sessions = self.sessions.lock().await;
        match sessions.remove(token) {
            Some(SessionState::Active(active)) => Some(active),
            _ => None,
        }
    }

    /// Remove a running session after its transcoder exited
    ///
    /// Only the run identified by `generation` is removed.
    pub async fn finish(&self, token: &SessionToken, generation: u64) -> Option<ActiveSession> {
        let mut sessions = self.sessions.lock().await;
        let current = matches!(
            sessions.get(token),
            Some(SessionState::Active(active)) if active.generation == generation
        );
        if !current {
            return None;
        }
        match sessions.remove(token) {
            Some(SessionState::Active(active)) => Some(active),
            _ => None,
        }
    }

    /// Remove every session, returning the running ones
    pub async fn drain(&self) -> Vec<ActiveSession> {
        let mut sessions = self.sessions.lock().await;
        sessions
            .drain()
            .filter_map(|(_, state)| match state {
                SessionState::Active(active) => Some(active),
                _ => None,
            })
            .collect()
    }

    pub fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub async fn phase(&self, token: &SessionToken) -> Option<SessionPhase> {
        let sessions = self.sessions.lock().await;
        sessions.get(token).map(|state| match state {
            SessionState::Pending(_) => SessionPhase::Pending,
            SessionState::Starting => SessionPhase::Starting,
            SessionState::Active(_) => SessionPhase::Active,
        })
    }

    pub async fn contains(&self, token: &SessionToken) -> bool {
        self.sessions.lock().await.contains_key(token)
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }
}
