//! # doorcam session-core
//!
//! Stream sessions for a camera accessory. The host drives a two-phase
//! protocol per session token:
//!
//! 1. `prepare`: SSRCs are allocated and the controller's SRTP parameters
//!    stored, the local address is returned;
//! 2. `start` spawns the transcoder (plus relay and speaker for two-way
//!    audio), `stop` terminates it.
//!
//! ```no_run
//! use doorcam_media_core::PlatformConfig;
//! use doorcam_session_core::CameraStreamSource;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let platform = PlatformConfig::load("config.json")?;
//! for source in CameraStreamSource::from_platform(&platform)? {
//!     println!("{}: {} streams", source.camera().name, source.stream_count());
//! }
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod errors;
pub mod events;
pub mod net;
pub mod registry;
pub mod session;
pub mod source;

pub use api::{
    AddressInfo, AddressKind, EndpointRequest, EndpointResponse, PrepareStreamRequest,
    PrepareStreamResponse, StreamController, StreamRequest, StreamRequestKind,
};
pub use errors::{Result, SessionError};
pub use events::{CameraEvent, EventBus, StopReason};
pub use net::resolve_local_address;
pub use registry::{ActiveSession, PendingSession, SessionPhase, SessionRegistry};
pub use session::SessionToken;
pub use source::CameraStreamSource;
