//! Camera events
//!
//! Published on a broadcast channel; publishing never blocks and events
//! are dropped when nobody listens.

use tokio::sync::broadcast;

use crate::session::SessionToken;

const EVENT_CAPACITY: usize = 64;

/// Why a stream ended without escalation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The host sent `stop`
    Requested,
    /// The transcoder exited cleanly on its own
    ProcessExited { code: Option<i32> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CameraEvent {
    SessionPrepared { token: SessionToken },
    StreamStarted { token: SessionToken, width: u32, height: u32, bitrate: u32 },
    StreamStopped { token: SessionToken, reason: StopReason },
    /// The transcoder failed; `code` is `None` when it could not be started
    ForcedStop { token: SessionToken, code: Option<i32> },
    SnapshotTaken { bytes: usize },
}

impl CameraEvent {
    pub fn token(&self) -> Option<SessionToken> {
        match self {
            CameraEvent::SessionPrepared { token }
            | CameraEvent::StreamStarted { token, .. }
            | CameraEvent::StreamStopped { token, .. }
            | CameraEvent::ForcedStop { token, .. } => Some(*token),
            CameraEvent::SnapshotTaken { .. } => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<CameraEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self { tx }
    }

    pub fn publish(&self, event: CameraEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CameraEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_without_subscribers() {
        let bus = EventBus::new();
        bus.publish(CameraEvent::SnapshotTaken { bytes: 1 });

        let mut rx = bus.subscribe();
        let token = SessionToken::new_random();
        bus.publish(CameraEvent::SessionPrepared { token });
        let event = rx.recv().await.unwrap();
        assert_eq!(event.token(), Some(token));
    }
}
