//! UDP Broadcast Discovery Module
//!
//! Nodes broadcast their presence on the local network and listen for other
//! nodes announcing the same service. Not designed for use across a WAN.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::net::UdpSocket;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use crate::config::BeepConfig;
use crate::error::{Error, Result};

/// Discovery message prefix
const DISCOVERY_PREFIX: &str = "BEEP";

/// Discovery message version
const DISCOVERY_VERSION: u8 = 1;

/// Announcement seen on the discovery channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredPeer {
    /// Service name the remote node announced
    pub service_name: String,
    /// Host taken from the datagram source address
    pub host: String,
    /// HTTP port the remote node announced
    pub port: u16,
}

/// Callback invoked for every announcement from another node
pub type PeerFoundHandler = Arc<dyn Fn(DiscoveredPeer) -> BoxFuture<'static, ()> + Send + Sync>;

/// UDP broadcast discovery
pub struct Discovery {
    /// Identifies our own broadcasts so we can skip them
    instance_id: String,
    /// UDP port announcements are sent to and received on
    discovery_port: u16,
    /// Broadcast interval
    broadcast_interval: Duration,
    /// Subscribers
    handlers: Arc<RwLock<Vec<PeerFoundHandler>>>,
    /// Running flag
    running: Arc<RwLock<bool>>,
}

impl Discovery {
    /// Create a new discovery instance
    pub fn new(instance_id: String, discovery_port: u16, broadcast_interval: Duration) -> Self {
        Self {
            instance_id,
            discovery_port,
            broadcast_interval,
            handlers: Arc::new(RwLock::new(Vec::new())),
            running: Arc::new(RwLock::new(true)),
        }
    }

    /// Create a discovery instance from the node configuration
    pub fn from_config(config: &BeepConfig) -> Self {
        Self::new(
            config.node.id.clone(),
            config.discovery.port,
            config.broadcast_interval(),
        )
    }

    /// Subscribe to announcements from other nodes
    pub async fn on_peer_found(&self, handler: PeerFoundHandler) {
        self.handlers.write().await.push(handler);
    }

    /// Advertise this node under `service_name`, reachable on `port`
    pub async fn announce(&self, service_name: &str, port: u16) -> Result<JoinHandle<()>> {
        let socket = UdpSocket::bind("0.0.0.0:0").await
            .map_err(|e| Error::Network(format!("Failed to bind broadcast socket: {}", e)))?;

        socket.set_broadcast(true)
            .map_err(|e| Error::Network(format!("Failed to enable broadcast: {}", e)))?;

        let message = format_discovery_message(service_name, &self.instance_id, port);
        let broadcast_addr = SocketAddr::from(([255, 255, 255, 255], self.discovery_port));
        let interval = self.broadcast_interval;
        let running = Arc::clone(&self.running);

        tracing::info!(
            "Announcing {} on port {} (UDP broadcast to {})",
            service_name, port, broadcast_addr
        );

        Ok(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);

            loop {
                ticker.tick().await;

                if !*running.read().await {
                    break;
                }

                if let Err(e) = socket.send_to(message.as_bytes(), broadcast_addr).await {
                    // Broadcast might not be supported on all networks
                    tracing::trace!("Broadcast send failed (network may not support broadcast): {}", e);
                } else {
                    tracing::trace!("Discovery broadcast sent");
                }
            }
        }))
    }

    /// Start listening for announcements.
    ///
    /// The port is shared, so several nodes on one host all hear every
    /// announcement. Returns `None` when the port cannot be bound at all;
    /// this node then still announces itself.
    pub async fn listen(&self) -> Option<JoinHandle<()>> {
        let socket = match bind_shared(self.discovery_port) {
            Ok(s) => s,
            Err(e) => {
                tracing::debug!(
                    "Could not bind discovery listener on port {}: {} (announce only)",
                    self.discovery_port, e
                );
                return None;
            }
        };

        let instance_id = self.instance_id.clone();
        let handlers = Arc::clone(&self.handlers);
        let running = Arc::clone(&self.running);

        Some(tokio::spawn(async move {
            let mut buf = [0u8; 512];

            loop {
                if !*running.read().await {
                    break;
                }

                // Use timeout to periodically check running flag
                let recv_result = tokio::time::timeout(
                    Duration::from_secs(1),
                    socket.recv_from(&mut buf),
                ).await;

                let (len, src) = match recv_result {
                    Ok(Ok((len, src))) => (len, src),
                    Ok(Err(e)) => {
                        tracing::trace!("Discovery recv error: {}", e);
                        continue;
                    }
                    Err(_) => continue,
                };

                dispatch_datagram(&instance_id, &handlers, &buf[..len], src).await;
            }
        }))
    }

    /// Stop the discovery tasks
    pub async fn stop(&self) {
        *self.running.write().await = false;
    }
}

/// Bind the discovery port with address (and on unix, port) reuse enabled
fn bind_shared(port: u16) -> std::io::Result<UdpSocket> {
    let socket = socket2::Socket::new(
        socket2::Domain::IPV4,
        socket2::Type::DGRAM,
        Some(socket2::Protocol::UDP),
    )?;

    socket.set_reuse_address(true)?;
    #[cfg(unix)]
    socket.set_reuse_port(true)?;
    socket.set_broadcast(true)?;

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    socket.bind(&addr.into())?;
    socket.set_nonblocking(true)?;

    UdpSocket::from_std(socket.into())
}

/// Parse one datagram and notify subscribers. Returns whether it was delivered.
async fn dispatch_datagram(
    instance_id: &str,
    handlers: &RwLock<Vec<PeerFoundHandler>>,
    data: &[u8],
    src: SocketAddr,
) -> bool {
    let message = match std::str::from_utf8(data) {
        Ok(s) => s,
        Err(_) => return false,
    };

    let (service_name, sender_id, port) = match parse_discovery_message(message) {
        Some(parsed) => parsed,
        None => return false,
    };

    // Skip our own broadcasts
    if sender_id == instance_id {
        return false;
    }

    let peer = DiscoveredPeer {
        service_name,
        host: src.ip().to_string(),
        port,
    };
    tracing::trace!("Announcement from {} ({:?})", src, peer);

    let handlers = handlers.read().await.clone();
    for handler in handlers {
        handler(peer.clone()).await;
    }

    true
}

/// Format a discovery broadcast message
fn format_discovery_message(service_name: &str, instance_id: &str, port: u16) -> String {
    format!(
        "{}|{}|{}|{}|{}",
        DISCOVERY_PREFIX,
        DISCOVERY_VERSION,
        service_name,
        instance_id,
        port
    )
}

/// Parse a discovery broadcast message
/// Returns (service_name, instance_id, port)
fn parse_discovery_message(message: &str) -> Option<(String, String, u16)> {
    let parts: Vec<&str> = message.split('|').collect();

    if parts.len() != 5 {
        return None;
    }

    // Validate prefix
    if parts[0] != DISCOVERY_PREFIX {
        return None;
    }

    // Validate version
    let version: u8 = parts[1].parse().ok()?;
    if version != DISCOVERY_VERSION {
        return None;
    }

    if parts[2].is_empty() || parts[3].is_empty() {
        return None;
    }

    let port: u16 = parts[4].parse().ok()?;

    Some((parts[2].to_string(), parts[3].to_string(), port))
}
