//! Two-way audio relay
//!
//! The relay owns the negotiated audio port. Datagrams arriving from the
//! controller's audio port are the return leg and go to the speaker
//! transcoder on loopback; everything else comes from the primary transcoder
//! and goes back out to the controller.
//!
//! ```text
//!  controller:aport ──► relay:aport ──► 127.0.0.1:9998, 127.0.0.1:9999
//!  transcoder       ──► relay:aport ──► controller:aport
//! ```

use std::io::ErrorKind;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{MediaError, Result};

/// Loopback port the primary transcoder uses for audio RTCP, and the
/// speaker transcoder's RTCP sink
pub const RELAY_RTCP_PORT: u16 = 9998;

/// Loopback port the speaker transcoder receives RTP on
pub const SPEAKER_RTP_PORT: u16 = 9999;

const MAX_DATAGRAM: usize = 65536;

/// Relay endpoints for one session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    /// Local address to bind, normally the negotiated audio port on all interfaces
    pub bind_addr: SocketAddr,
    /// The controller's audio endpoint
    pub remote: SocketAddr,
    /// Loopback sinks for the return leg
    pub local_sinks: Vec<SocketAddr>,
    pub max_packet_size: usize,
}

impl RelayConfig {
    /// Bind the controller's audio port locally and fan the return leg out
    /// to the speaker ports
    pub fn for_session(remote: SocketAddr) -> Self {
        let any = match remote.ip() {
            IpAddr::V4(_) => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            IpAddr::V6(_) => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
        };
        let loopback = IpAddr::V4(Ipv4Addr::LOCALHOST);
        Self {
            bind_addr: SocketAddr::new(any, remote.port()),
            remote,
            local_sinks: vec![
                SocketAddr::new(loopback, RELAY_RTCP_PORT),
                SocketAddr::new(loopback, SPEAKER_RTP_PORT),
            ],
            max_packet_size: MAX_DATAGRAM,
        }
    }
}

/// Where a datagram goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayRoute {
    /// Return audio from the controller, to the speaker sinks
    ToLocal,
    /// Outbound audio, to the controller
    ToRemote,
}

/// Route by source port only
pub fn route_for(source: SocketAddr, remote_port: u16) -> RelayRoute {
    if source.port() == remote_port {
        RelayRoute::ToLocal
    } else {
        RelayRoute::ToRemote
    }
}

#[derive(Debug, Default)]
struct RelayStats {
    packets_to_local: AtomicU64,
    packets_to_remote: AtomicU64,
    bytes_relayed: AtomicU64,
    send_errors: AtomicU64,
}

/// Counters at a point in time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStatsSnapshot {
    /// Datagrams fanned out to the local sinks
    pub packets_to_local: u64,
    pub packets_to_remote: u64,
    pub bytes_relayed: u64,
    pub send_errors: u64,
}

impl RelayStats {
    fn snapshot(&self) -> RelayStatsSnapshot {
        RelayStatsSnapshot {
            packets_to_local: self.packets_to_local.load(Ordering::Relaxed),
            packets_to_remote: self.packets_to_remote.load(Ordering::Relaxed),
            bytes_relayed: self.bytes_relayed.load(Ordering::Relaxed),
            send_errors: self.send_errors.load(Ordering::Relaxed),
        }
    }
}

/// UDP relay for one two-way audio session
pub struct UdpRelay;

impl UdpRelay {
    /// Bind and start relaying
    pub async fn bind(config: RelayConfig) -> Result<RelayHandle> {
        let socket = UdpSocket::bind(config.bind_addr)
            .await
            .map_err(|source| MediaError::RelayBind {
                addr: config.bind_addr,
                source,
            })?;
        let local_addr = socket.local_addr().map_err(|source| MediaError::RelayBind {
            addr: config.bind_addr,
            source,
        })?;
        info!("proxy listening {}", local_addr);

        let stats = Arc::new(RelayStats::default());
        let task = tokio::spawn(relay_loop(socket, config, stats.clone()));
        Ok(RelayHandle {
            local_addr,
            stats,
            task,
        })
    }
}

async fn relay_loop(socket: UdpSocket, config: RelayConfig, stats: Arc<RelayStats>) {
    let mut buf = vec![0u8; config.max_packet_size];
    let remote_port = config.remote.port();

    loop {
        let (len, source) = match socket.recv_from(&mut buf).await {
            Ok(received) => received,
            Err(e) if is_unreachable_echo(&e) => continue,
            Err(e) => {
                warn!(error = %e, "relay socket error, closing");
                break;
            }
        };
        let packet = &buf[..len];

        match route_for(source, remote_port) {
            RelayRoute::ToLocal => {
                stats.packets_to_local.fetch_add(1, Ordering::Relaxed);
                for sink in &config.local_sinks {
                    send(&socket, packet, *sink, &stats).await;
                }
            }
            RelayRoute::ToRemote => {
                stats.packets_to_remote.fetch_add(1, Ordering::Relaxed);
                send(&socket, packet, config.remote, &stats).await;
            }
        }
    }
}

/// ICMP unreachable from an earlier send surfaces on receive on some platforms
fn is_unreachable_echo(e: &std::io::Error) -> bool {
    matches!(e.kind(), ErrorKind::ConnectionReset | ErrorKind::ConnectionRefused)
}

async fn send(socket: &UdpSocket, packet: &[u8], target: SocketAddr, stats: &RelayStats) {
    match socket.send_to(packet, target).await {
        Ok(sent) => {
            stats.bytes_relayed.fetch_add(sent as u64, Ordering::Relaxed);
        }
        Err(e) => {
            stats.send_errors.fetch_add(1, Ordering::Relaxed);
            debug!(%target, error = %e, "relay send failed");
        }
    }
}

/// A running relay; closing is idempotent and also happens on drop
#[derive(Debug)]
pub struct RelayHandle {
    local_addr: SocketAddr,
    stats: Arc<RelayStats>,
    task: JoinHandle<()>,
}

impl RelayHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn stats(&self) -> RelayStatsSnapshot {
        self.stats.snapshot()
    }

    /// Stop relaying; the socket is released once the task unwinds
    pub fn close(&self) {
        self.task.abort();
    }

    /// Stop relaying and wait until the socket is released
    ///
    /// Returns the final counters.
    pub async fn shutdown(mut self) -> RelayStatsSnapshot {
        self.task.abort();
        let _ = (&mut self.task).await;
        self.stats.snapshot()
    }

    pub fn is_closed(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for RelayHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
