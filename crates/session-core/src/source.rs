//! Camera stream source
//!
//! The per-camera entry point the host talks to: `prepare_stream`,
//! `handle_stream_request` (start/stop), `close_all` and
//! `handle_snapshot_request`. Running sessions live in a [`SessionRegistry`];
//! each transcoder exit is handled by a watcher task that removes the
//! session, releases its relay and speaker, and escalates failures to the
//! controllers bound to that session.

use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, RwLock};

use bytes::Bytes;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use doorcam_media_core::capabilities::services;
use doorcam_media_core::command::build_speaker_command;
use doorcam_media_core::process::{ExitKind, ExitWatch, ProcessExit};
use doorcam_media_core::sdp::speaker_sdp_path;
use doorcam_media_core::{
    reap_stray_processes, spawn_supervised, start_speaker, AudioLeg, AudioProfile, AudioRequest,
    CameraConfig, MediaError, PlatformConfig, RelayConfig, RelayHandle, ServiceKind,
    SnapshotFetcher, SnapshotRequest, SpeakerHandle, SpeakerSdp, StreamCommandBuilder,
    StreamControllerOptions, StreamEndpoint, UdpRelay, VideoLeg, VideoProfile, VideoRequest,
};
use doorcam_rtp_core::{generate_ssrc, SrtpKeyMaterial, SRTP_AES128_CM_SHA1_80};

use crate::api::{
    AddressInfo, EndpointRequest, EndpointResponse, PrepareStreamRequest, PrepareStreamResponse,
    StreamController, StreamRequest, StreamRequestKind,
};
use crate::errors::Result;
use crate::events::{CameraEvent, EventBus, StopReason};
use crate::net::resolve_local_address;
use crate::registry::{ActiveSession, PendingSession, SessionPhase, SessionRegistry};
use crate::session::SessionToken;

/// Streams and snapshots for one camera
#[derive(Clone)]
pub struct CameraStreamSource {
    inner: Arc<Inner>,
}

struct Inner {
    camera: CameraConfig,
    processor: String,
    interface: Option<String>,
    options: StreamControllerOptions,
    registry: SessionRegistry,
    controllers: RwLock<Vec<Arc<dyn StreamController>>>,
    events: EventBus,
    snapshots: SnapshotFetcher,
}

impl std::fmt::Debug for CameraStreamSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraStreamSource")
            .field("camera", &self.inner.camera.name)
            .field("processor", &self.inner.processor)
            .finish()
    }
}

impl CameraStreamSource {
    /// Create the source for a camera; a camera without a source is rejected
    pub fn new(
        processor: impl Into<String>,
        interface: Option<&str>,
        camera: CameraConfig,
    ) -> Result<Self> {
        if camera.video.source.as_deref().map_or(true, str::is_empty) {
            return Err(MediaError::MissingSource { camera: camera.name }.into());
        }
        let processor = processor.into();
        let options = StreamControllerOptions::for_camera(&camera);
        let snapshots = SnapshotFetcher::new(processor.clone(), &camera);
        Ok(Self {
            inner: Arc::new(Inner {
                camera,
                processor,
                interface: interface.filter(|name| !name.is_empty()).map(str::to_string),
                options,
                registry: SessionRegistry::new(),
                controllers: RwLock::new(Vec::new()),
                events: EventBus::new(),
                snapshots,
            }),
        })
    }

    /// One source per configured camera
    pub fn from_platform(platform: &PlatformConfig) -> Result<Vec<Self>> {
        platform
            .camera_configs()?
            .into_iter()
            .map(|camera| Self::new(platform.video_processor.clone(), platform.interface(), camera))
            .collect()
    }

    pub fn camera(&self) -> &CameraConfig {
        &self.inner.camera
    }

    pub fn stream_options(&self) -> &StreamControllerOptions {
        &self.inner.options
    }

    pub fn services(&self) -> Vec<ServiceKind> {
        services(&self.inner.camera.video)
    }

    /// Number of stream controllers the host should create
    pub fn stream_count(&self) -> usize {
        self.inner.camera.video.max_streams
    }

    pub fn attach_controller(&self, controller: Arc<dyn StreamController>) {
        self.inner
            .controllers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(controller);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CameraEvent> {
        self.inner.events.subscribe()
    }

    pub async fn session_phase(&self, token: &SessionToken) -> Option<SessionPhase> {
        self.inner.registry.phase(token).await
    }

    pub async fn session_count(&self) -> usize {
        self.inner.registry.len().await
    }

    /// Negotiate a session
    ///
    /// Each requested leg gets a fresh SSRC; the controller's ports and keys
    /// are echoed back with the local address. Nothing is stored when the
    /// address cannot be resolved or key material is malformed.
    pub async fn prepare_stream(
        &self,
        request: PrepareStreamRequest,
    ) -> Result<PrepareStreamResponse> {
        let inner = &self.inner;
        let token = request.session_id;
        let target = request.target_address;

        let video = request.video.as_ref().map(|leg| negotiate_endpoint(target, leg)).transpose()?;
        let audio = request.audio.as_ref().map(|leg| negotiate_endpoint(target, leg)).transpose()?;

        let address = resolve_local_address(inner.interface.as_deref())?;

        let response = PrepareStreamResponse {
            address: AddressInfo::from(address),
            video: video.as_ref().map(endpoint_response),
            audio: audio.as_ref().map(endpoint_response),
        };

        let pending = PendingSession {
            target_address: target,
            video,
            audio,
        };
        if let Some(displaced) = inner.registry.insert_pending(token, pending).await {
            warn!(session = %token, "Prepare for a running session, stopping it");
            displaced.teardown().await;
        }

        debug!(
            camera = %inner.camera.name,
            session = %token,
            address = %address,
            "Prepared stream"
        );
        inner.events.publish(CameraEvent::SessionPrepared { token });
        Ok(response)
    }

    /// Start or stop a session; unknown tokens are ignored
    pub async fn handle_stream_request(&self, request: StreamRequest) {
        if self.inner.camera.video.debug {
            debug!(camera = %self.inner.camera.name, ?request, "Stream request");
        }
        match request.kind {
            StreamRequestKind::Start => {
                self.start_stream(request.session_id, request.video, request.audio).await
            }
            StreamRequestKind::Stop => self.stop_stream(&request.session_id).await,
            StreamRequestKind::Other => {
                debug!(session = %request.session_id, "Ignoring stream request");
            }
        }
    }

    /// Spawn the transcoder for a prepared session
    pub async fn start_stream(
        &self,
        token: SessionToken,
        video: Option<VideoRequest>,
        audio: Option<AudioRequest>,
    ) {
        let inner = &self.inner;
        let Some(pending) = inner.registry.take_pending(&token).await else {
            debug!(session = %token, "Start for unknown session ignored");
            return;
        };

        let Some(video_endpoint) = pending.video.clone() else {
            warn!(
                camera = %inner.camera.name,
                session = %token,
                "Start without a video endpoint, dropping session"
            );
            inner.registry.abandon(&token).await;
            return;
        };

        let config = &inner.camera.video;
        let video_leg = VideoLeg {
            profile: VideoProfile::negotiate(config, video.as_ref()),
            endpoint: video_endpoint,
        };
        let audio_leg = pending.audio.clone().map(|endpoint| AudioLeg {
            profile: AudioProfile::negotiate(config, audio.as_ref()),
            endpoint,
        });

        let builder = StreamCommandBuilder::new(&inner.processor, &inner.camera);
        let command = match builder.build(&video_leg, audio_leg.as_ref()) {
            Ok(command) => command,
            Err(e) => {
                error!(camera = %inner.camera.name, error = %e, "Invalid stream command");
                inner.registry.abandon(&token).await;
                self.escalate(token, None);
                return;
            }
        };

        if config.reap_stray_processes {
            reap_stray_processes(&inner.processor).await;
        }

        let profile = &video_leg.profile;
        info!(
            "Start streaming video from {} with {}x{}@{}kBit",
            inner.camera.name, profile.width, profile.height, profile.bitrate
        );
        if config.debug {
            debug!("{}", command);
        }

        let label = format!("{}/{}", inner.camera.name, token);
        let (process, exit) = match spawn_supervised(&command, label, config.debug) {
            Ok(spawned) => spawned,
            Err(e) => {
                error!("An error occurs while making stream request");
                if config.debug {
                    error!(error = %e, "stream spawn failed");
                }
                inner.registry.abandon(&token).await;
                self.escalate(token, None);
                return;
            }
        };

        let (relay, speaker) = match (&audio_leg, config.audio.is_two_way()) {
            (Some(leg), true) => self.start_two_way_audio(&pending, leg).await,
            _ => (None, None),
        };

        let generation = inner.registry.next_generation();
        let active = ActiveSession {
            generation,
            process,
            relay,
            speaker,
        };
        if let Err(active) = inner.registry.activate(token, active).await {
            debug!(session = %token, "Session stopped while starting");
            active.teardown().await;
            return;
        }

        inner.events.publish(CameraEvent::StreamStarted {
            token,
            width: profile.width,
            height: profile.height,
            bitrate: profile.bitrate,
        });
        tokio::spawn(self.clone().watch_exit(token, generation, exit));
    }

    /// Relay plus speaker transcoder for the return audio leg
    ///
    /// Either part failing is logged; the video stream runs regardless.
    async fn start_two_way_audio(
        &self,
        pending: &PendingSession,
        leg: &AudioLeg,
    ) -> (Option<RelayHandle>, Option<SpeakerHandle>) {
        let inner = &self.inner;
        let config = &inner.camera.video;
        let remote = SocketAddr::new(pending.target_address, leg.endpoint.port);

        let relay = match UdpRelay::bind(RelayConfig::for_session(remote)).await {
            Ok(relay) => Some(relay),
            Err(e) => {
                error!(camera = %inner.camera.name, error = %e, "server error");
                None
            }
        };

        let sdp_path = speaker_sdp_path(&config.speaker_sdp_dir, &inner.camera.name);
        let sdp = SpeakerSdp::new(leg.profile.bitrate, &leg.endpoint.srtp);
        if let Err(e) = sdp.write_to(&sdp_path).await {
            error!(camera = %inner.camera.name, error = %e, "Speaker disabled");
            return (relay, None);
        }

        let output = config.audio.speaker_output().unwrap_or_default();
        let speaker = match build_speaker_command(&inner.processor, &sdp_path, output) {
            Ok(command) => Some(start_speaker(command, config.speaker_restart, config.debug)),
            Err(e) => {
                error!(camera = %inner.camera.name, error = %e, "Invalid speaker command");
                None
            }
        };
        (relay, speaker)
    }

    async fn watch_exit(self, token: SessionToken, generation: u64, exit: ExitWatch) {
        let exit = exit.wait().await;
        self.on_exit(token, generation, exit).await;
    }

    async fn on_exit(&self, token: SessionToken, generation: u64, exit: ProcessExit) {
        let inner = &self.inner;
        let session = inner.registry.finish(&token, generation).await;
        let still_registered = session.is_some();
        if let Some(session) = session {
            session.release().await;
        }

        match exit.kind() {
            ExitKind::Clean => {
                info!("Stopped streaming");
                if still_registered {
                    inner.events.publish(CameraEvent::StreamStopped {
                        token,
                        reason: StopReason::ProcessExited { code: exit.code },
                    });
                }
            }
            ExitKind::Failed(code) => {
                error!("ERROR: FFmpeg exited with code {}", code);
                self.escalate(token, Some(code));
            }
        }
    }

    /// Force-stop every controller bound to `token`
    fn escalate(&self, token: SessionToken, code: Option<i32>) {
        for controller in self.controllers() {
            if controller.session_token() == Some(token) {
                debug!(session = %token, controller = controller.index(), "Forcing stop");
                controller.force_stop();
            }
        }
        self.inner.events.publish(CameraEvent::ForcedStop { token, code });
    }

    /// Terminate a session's transcoder and release its relay; idempotent
    pub async fn stop_stream(&self, token: &SessionToken) {
        match self.inner.registry.stop(token).await {
            Some(active) => {
                active.teardown().await;
                self.inner.events.publish(CameraEvent::StreamStopped {
                    token: *token,
                    reason: StopReason::Requested,
                });
            }
            None => debug!(session = %token, "Stop for inactive session ignored"),
        }
    }

    /// Forward a dropped controller connection to every stream controller
    pub fn close_all(&self, connection_id: &str) {
        for controller in self.controllers() {
            controller.handle_close_connection(connection_id);
        }
    }

    /// Capture a still image; empty when the transcoder could not start
    pub async fn handle_snapshot_request(&self, request: SnapshotRequest) -> Bytes {
        let image = self.inner.snapshots.fetch(&request).await;
        self.inner.events.publish(CameraEvent::SnapshotTaken { bytes: image.len() });
        image
    }

    /// Stop every session of this camera
    pub async fn shutdown(&self) {
        for active in self.inner.registry.drain().await {
            active.teardown().await;
        }
    }

    fn controllers(&self) -> Vec<Arc<dyn StreamController>> {
        self.inner
            .controllers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

fn negotiate_endpoint(target: IpAddr, leg: &EndpointRequest) -> Result<StreamEndpoint> {
    let srtp = SrtpKeyMaterial::new(leg.srtp_key.clone(), leg.srtp_salt.clone());
    srtp.validate(&SRTP_AES128_CM_SHA1_80)?;
    Ok(StreamEndpoint {
        address: target,
        port: leg.port,
        srtp,
        ssrc: generate_ssrc(),
    })
}

fn endpoint_response(endpoint: &StreamEndpoint) -> EndpointResponse {
    EndpointResponse {
        port: endpoint.port,
        ssrc: endpoint.ssrc,
        srtp_key: endpoint.srtp.key().to_vec(),
        srtp_salt: endpoint.srtp.salt().to_vec(),
    }
}
