use crate::session::SessionToken;

/// One of a camera's streaming slots on the host side
///
/// The stream source calls back into controllers when a transcoder fails
/// (so the host does not wait for a close that never comes) and when a
/// connection drops.
pub trait StreamController: Send + Sync {
    /// Slot number, `0..maxStreams`
    fn index(&self) -> usize;

    /// Session currently bound to this slot
    fn session_token(&self) -> Option<SessionToken>;

    /// End the slot's stream from the camera side
    fn force_stop(&self);

    /// The controller connection `connection_id` went away
    fn handle_close_connection(&self, connection_id: &str);
}
