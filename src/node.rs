//! Node
//!
//! The single context object of a running process: it owns the log store,
//! the peer directory, the view indexer and the replication coordinator,
//! and drives the periodic sweep + view pass.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::RwLock;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::config::BeepConfig;
use crate::error::{Error, Result};
use crate::log::{AppendOnlyLog, Entry, LogStore, LogSummary, MessageDraft, SeqNum};
use crate::network::{DiscoveredPeer, Discovery, HttpPeerClient, Peer, PeerDirectory, PeerFoundHandler};
use crate::replication::{RemoteLogs, ReplicationCoordinator, SweepReport};
use crate::view::{ViewIndexer, ViewRecord};

/// A participant in the replication network
pub struct Node {
    config: BeepConfig,
    store: Arc<RwLock<LogStore>>,
    view: RwLock<ViewIndexer>,
    peers: Arc<PeerDirectory>,
    coordinator: Arc<ReplicationCoordinator>,
    discovery: Discovery,
    started: AtomicBool,
    shutdown: RwLock<bool>,
}

impl Node {
    /// Create a node that talks to peers over HTTP
    pub fn new(config: BeepConfig) -> Result<Self> {
        let client = HttpPeerClient::new(config.request_timeout())?;
        Ok(Self::with_remote(config, Arc::new(client)))
    }

    /// Create a node with a custom peer transport
    pub fn with_remote(config: BeepConfig, remote: Arc<dyn RemoteLogs>) -> Self {
        let store = Arc::new(RwLock::new(LogStore::new()));
        let peers = Arc::new(PeerDirectory::new());
        let coordinator = Arc::new(ReplicationCoordinator::new(
            Arc::clone(&store),
            Arc::clone(&peers),
            remote,
        ));
        let discovery = Discovery::from_config(&config);

        Self {
            config,
            store,
            view: RwLock::new(ViewIndexer::new()),
            peers,
            coordinator,
            discovery,
            started: AtomicBool::new(false),
            shutdown: RwLock::new(false),
        }
    }

    pub fn config(&self) -> &BeepConfig {
        &self.config
    }

    pub fn peer_directory(&self) -> &Arc<PeerDirectory> {
        &self.peers
    }

    /// Start finding peers and syncing with them. `port` is the port our
    /// HTTP API is reachable on; it is what we announce. Without one the
    /// node still pulls from peers but never announces itself.
    ///
    /// A node starts at most once; later calls fail.
    pub async fn start(self: &Arc<Self>, port: Option<u16>) -> Result<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(Error::Internal(format!("node {} is already started", self.config.node.id)));
        }

        for (host, peer_port) in self.config.seed_peers()? {
            let is_self = Some(peer_port) == port
                && self.config.node.advertise_host.as_deref() == Some(host.as_str());
            if is_self {
                tracing::debug!("Skipping seed peer {}:{} (that's us)", host, peer_port);
                continue;
            }
            self.peers.add(&host, peer_port).await;
        }

        if self.config.discovery.enabled {
            self.start_discovery(port).await?;
        } else {
            tracing::info!("Peer discovery disabled");
        }

        let node = Arc::clone(self);
        tokio::spawn(async move {
            node.run_driver().await;
        });

        tracing::info!(
            "Node {} started (sync every {:?}, {} seed peers)",
            self.config.node.id,
            self.config.sync_interval(),
            self.peers.len().await
        );
        Ok(())
    }

    async fn start_discovery(&self, port: Option<u16>) -> Result<()> {
        let service_name = self.config.discovery.service_name.clone();
        let handler = peer_found_handler(service_name.clone(), Arc::clone(&self.peers));

        self.discovery.on_peer_found(handler).await;
        self.discovery.listen().await;
        match port {
            Some(port) => {
                self.discovery.announce(&service_name, port).await?;
            }
            None => tracing::info!("No API port to announce, listening for peers only"),
        }
        Ok(())
    }

    /// Periodic driver: each tick issues a sweep and then runs the view pass.
    ///
    /// Sweeps are spawned rather than awaited, so a slow peer can make two
    /// sweeps overlap; the coordinator's peer lock keeps them apart.
    async fn run_driver(self: Arc<Self>) {
        let period = self.config.sync_interval();
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            if *self.shutdown.read().await {
                break;
            }

            let coordinator = Arc::clone(&self.coordinator);
            tokio::spawn(async move {
                coordinator.sweep().await;
            });

            self.update_views().await;
        }

        tracing::info!("Sync loop stopped");
    }

    /// Stop the driver and discovery
    pub async fn stop(&self) {
        *self.shutdown.write().await = true;
        self.discovery.stop().await;
    }

    /// Run one sweep to completion, then the view pass
    pub async fn tick(&self) -> SweepReport {
        let report = self.coordinator.sweep().await;
        self.update_views().await;
        report
    }

    /// Bring the materialized view up to date with every log
    pub async fn update_views(&self) -> usize {
        let store = self.store.read().await;
        self.view.write().await.update_all(&store)
    }

    // ============ Entry points for the API layer ============

    /// Append a locally authored message, creating the log if needed
    pub async fn append_to_log(&self, key: &str, draft: MessageDraft) -> Result<Entry> {
        let mut store = self.store.write().await;
        let entry = store.get_or_create(key).append(draft, None, None)?.clone();

        tracing::info!(
            "Append to log %{} (seqNum={}, type={}, id={})",
            key, entry.message.seq_num, entry.message.resource_type, entry.message.id
        );
        Ok(entry)
    }

    pub async fn log_exists(&self, key: &str) -> bool {
        self.store.read().await.exists(key)
    }

    /// Every log with its size
    pub async fn get_all_logs(&self) -> Vec<LogSummary> {
        self.store.read().await.summaries()
    }

    pub async fn get_log(&self, key: &str) -> Result<AppendOnlyLog> {
        Ok(self.store.read().await.get(key)?.clone())
    }

    pub async fn get_log_message(&self, key: &str, seq_num: SeqNum) -> Result<Entry> {
        let store = self.store.read().await;
        Ok(store.get(key)?.get(seq_num)?.clone())
    }

    pub async fn find_all(&self, resource_type: &str) -> Vec<ViewRecord> {
        self.view.read().await.find_all(resource_type)
    }

    pub async fn find(&self, resource_type: &str, id: &str) -> Result<ViewRecord> {
        Ok(self.view.read().await.find(resource_type, id)?.clone())
    }

    pub async fn peers(&self) -> Vec<Peer> {
        self.peers.list().await
    }
}

/// Discovery subscriber that registers peers announcing `service_name`
fn peer_found_handler(service_name: String, peers: Arc<PeerDirectory>) -> PeerFoundHandler {
    Arc::new(move |found: DiscoveredPeer| {
        let peers = Arc::clone(&peers);
        let matches = found.service_name == service_name;
        async move {
            if matches {
                peers.add(&found.host, found.port).await;
            } else {
                tracing::trace!("Ignoring {} announcement from {}", found.service_name, found.host);
            }
        }
        .boxed()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    /// Peer that always serves the same logs
    struct StaticRemote {
        logs: Vec<(String, Vec<Entry>)>,
    }

    #[async_trait::async_trait]
    impl RemoteLogs for StaticRemote {
        async fn fetch_index(&self, _peer: &Peer) -> Result<Vec<LogSummary>> {
            Ok(self
                .logs
                .iter()
                .map(|(key, entries)| LogSummary { key: key.clone(), size: entries.len() as u64 })
                .collect())
        }

        async fn fetch_entry(&self, _peer: &Peer, key: &str, seq_num: SeqNum) -> Result<Entry> {
            self.logs
                .iter()
                .find(|(k, _)| k == key)
                .and_then(|(_, entries)| entries.get(seq_num as usize))
                .cloned()
                .ok_or_else(|| Error::EntryFetchFailed {
                    key: key.to_string(),
                    seq_num,
                    reason: "missing".into(),
                })
        }
    }

    fn node() -> Node {
        let mut config = BeepConfig::default();
        config.discovery.enabled = false;
        Node::new(config).unwrap()
    }

    fn draft(resource_type: &str, id: &str, text: &str) -> MessageDraft {
        MessageDraft {
            id: id.to_string(),
            resource_type: resource_type.to_string(),
            text: text.to_string(),
        }
    }

    #[tokio::test]
    async fn test_append_creates_log() {
        let node = node();
        assert!(!node.log_exists("alice").await);

        let first = node.append_to_log("alice", draft("post", "1", "hi")).await.unwrap();
        let second = node.append_to_log("alice", draft("post", "2", "yo")).await.unwrap();

        assert_eq!(first.message.seq_num, 0);
        assert_eq!(second.message.seq_num, 1);
        assert_eq!(
            node.get_all_logs().await,
            vec![LogSummary { key: "alice".into(), size: 2 }]
        );
        assert_eq!(node.get_log_message("alice", 1).await.unwrap(), second);
        assert_eq!(node.get_log("alice").await.unwrap().size(), 2);
    }

    #[tokio::test]
    async fn test_lookups_report_not_found() {
        let node = node();
        assert!(matches!(node.get_log("nobody").await, Err(Error::LogNotFound(_))));

        node.append_to_log("alice", draft("post", "1", "hi")).await.unwrap();
        assert!(matches!(
            node.get_log_message("alice", 1).await,
            Err(Error::EntryNotFound { seq_num: 1, .. })
        ));
        assert!(node.find("post", "1").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_views_follow_appends_after_tick() {
        let node = node();
        node.append_to_log("alice", draft("post", "1", "v1")).await.unwrap();
        node.append_to_log("bob", draft("post", "2", "other")).await.unwrap();

        // Not indexed until the next pass
        assert!(node.find_all("post").await.is_empty());

        let report = node.tick().await;
        assert_eq!(report, SweepReport::default());
        assert_eq!(node.find_all("post").await.len(), 2);

        node.append_to_log("alice", draft("post", "1", "v2")).await.unwrap();
        node.tick().await;

        let record = node.find("post", "1").await.unwrap();
        assert_eq!(record.key, "alice");
        assert_eq!(record.message.text, "v2");
        assert_eq!(record.message.seq_num, 1);
    }

    #[tokio::test]
    async fn test_start_registers_seed_peers() {
        let mut config = BeepConfig::default();
        config.discovery.enabled = false;
        config.replication.sync_interval_ms = 60_000;
        config.replication.peers = vec!["10.1.1.1:8080".into(), "10.1.1.1:8080".into()];
        let node = Arc::new(Node::new(config).unwrap());

        node.start(Some(9000)).await.unwrap();
        let peers = node.peers().await;
        assert_eq!(peers.len(), 1);
        assert_eq!(peers[0].address(), "10.1.1.1:8080");

        node.stop().await;
    }

    #[tokio::test]
    async fn test_start_twice_is_rejected() {
        let mut config = BeepConfig::default();
        config.discovery.enabled = false;
        config.replication.sync_interval_ms = 60_000;
        config.replication.peers = vec!["10.1.1.1:8080".into()];
        let node = Arc::new(Node::new(config).unwrap());

        node.start(None).await.unwrap();
        assert!(matches!(node.start(None).await, Err(Error::Internal(_))));
        assert_eq!(node.peers().await.len(), 1);

        node.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_driver_pulls_then_indexes_every_period() {
        let entries = vec![
            Entry::new(draft("post", "1", "first"), 0, 1_000),
            Entry::new(draft("post", "1", "second"), 1, 2_000),
        ];
        let remote = Arc::new(StaticRemote { logs: vec![("alice".to_string(), entries)] });

        let mut config = BeepConfig::default();
        config.discovery.enabled = false;
        config.replication.sync_interval_ms = 500;
        config.replication.peers = vec!["10.0.0.9:8080".into()];
        let node = Arc::new(Node::with_remote(config, remote));

        node.start(None).await.unwrap();

        // No sweep before the first period has elapsed
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert!(!node.log_exists("alice").await);

        // Tick at 500ms sweeps, the view pass at 1000ms at the latest indexes
        tokio::time::sleep(Duration::from_millis(700)).await;
        let log = node.get_log("alice").await.unwrap();
        assert_eq!(log.size(), 2);
        assert_eq!(log.get(1).unwrap().timestamp, 2_000);

        let record = node.find("post", "1").await.unwrap();
        assert_eq!(record.key, "alice");
        assert_eq!(record.message.text, "second");

        node.stop().await;
    }

    #[tokio::test]
    async fn test_discovery_handler_adds_only_matching_service() {
        let peers = Arc::new(PeerDirectory::new());
        let handler = peer_found_handler("beep-beep".to_string(), Arc::clone(&peers));

        let announced = |service_name: &str| DiscoveredPeer {
            service_name: service_name.to_string(),
            host: "10.0.0.5".to_string(),
            port: 8080,
        };

        handler(announced("other-app")).await;
        assert!(peers.is_empty().await);

        handler(announced("beep-beep")).await;
        handler(announced("beep-beep")).await;

        let listed = peers.list().await;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].address(), "10.0.0.5:8080");
    }
}
