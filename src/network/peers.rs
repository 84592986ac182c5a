//! Peer Directory
//!
//! Tracks the live set of remote nodes learned through discovery.

use std::collections::BTreeMap;
use std::net::Ipv6Addr;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// Locally assigned peer identifier, stable for the process lifetime
pub type PeerId = u64;

/// A remote node reachable over HTTP
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peer {
    pub id: PeerId,
    pub host: String,
    pub port: u16,
    /// When this peer was first registered
    pub discovered_at: chrono::DateTime<chrono::Utc>,
}

impl Peer {
    /// Base URL of the peer's API
    pub fn base_url(&self) -> String {
        format!("http://{}", self.address())
    }

    /// `host:port` label, IPv6 hosts in brackets
    pub fn address(&self) -> String {
        if self.host.parse::<Ipv6Addr>().is_ok() {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

/// Set of live peers, unique by (host, port)
#[derive(Debug, Default)]
pub struct PeerDirectory {
    peers: RwLock<BTreeMap<PeerId, Peer>>,
    counter: AtomicU64,
}

impl PeerDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a peer. Returns `None` if (host, port) is already known.
    pub async fn add(&self, host: &str, port: u16) -> Option<Peer> {
        let mut peers = self.peers.write().await;

        if peers.values().any(|p| p.host == host && p.port == port) {
            return None;
        }

        let id = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        let peer = Peer {
            id,
            host: host.to_string(),
            port,
            discovered_at: chrono::Utc::now(),
        };
        peers.insert(id, peer.clone());

        tracing::info!("Found peer #{} (host={}, port={})", id, host, port);
        Some(peer)
    }

    /// Remove a peer
    pub async fn remove(&self, id: PeerId) -> Option<Peer> {
        self.peers.write().await.remove(&id)
    }

    pub async fn contains(&self, id: PeerId) -> bool {
        self.peers.read().await.contains_key(&id)
    }

    pub async fn get(&self, id: PeerId) -> Option<Peer> {
        self.peers.read().await.get(&id).cloned()
    }

    /// All live peers ordered by id
    pub async fn list(&self) -> Vec<Peer> {
        self.peers.read().await.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.peers.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.peers.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_add_assigns_increasing_ids() {
        let peers = PeerDirectory::new();

        let a = peers.add("10.0.0.2", 8080).await.unwrap();
        let b = peers.add("10.0.0.3", 8080).await.unwrap();

        assert_eq!(a.id, 1);
        assert_eq!(b.id, 2);
        assert_eq!(peers.len().await, 2);
        assert_eq!(a.base_url(), "http://10.0.0.2:8080");
    }

    #[tokio::test]
    async fn test_ipv6_hosts_are_bracketed() {
        let peers = PeerDirectory::new();

        let peer = peers.add("::1", 8080).await.unwrap();
        assert_eq!(peer.address(), "[::1]:8080");
        assert_eq!(peer.base_url(), "http://[::1]:8080");

        let named = peers.add("peer-b", 8081).await.unwrap();
        assert_eq!(named.base_url(), "http://peer-b:8081");
    }

    #[tokio::test]
    async fn test_duplicate_host_port_ignored() {
        let peers = PeerDirectory::new();

        assert!(peers.add("10.0.0.2", 8080).await.is_some());
        assert!(peers.add("10.0.0.2", 8080).await.is_none());
        // Same host, different port is a different peer
        assert!(peers.add("10.0.0.2", 8081).await.is_some());

        assert_eq!(peers.len().await, 2);
    }

    #[tokio::test]
    async fn test_remove_keeps_ids_stable() {
        let peers = PeerDirectory::new();
        let a = peers.add("a", 1).await.unwrap();
        let b = peers.add("b", 2).await.unwrap();

        assert!(peers.remove(a.id).await.is_some());
        assert!(!peers.contains(a.id).await);
        assert_eq!(peers.get(b.id).await.unwrap().host, "b");

        // Re-registering a removed peer gets a fresh id
        let again = peers.add("a", 1).await.unwrap();
        assert_eq!(again.id, 3);
        assert_eq!(
            peers.list().await.iter().map(|p| p.id).collect::<Vec<_>>(),
            vec![2, 3]
        );
    }
}
