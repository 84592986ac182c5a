//! Replication Coordinator
//!
//! One sweep visits every known peer in turn: fetch the peer's log
//! directory, diff sizes against the local store and pull the missing
//! entries one seqNum at a time, in order.
//!
//! Two lock sets keep sweeps from stepping on each other:
//! - a peer stays locked while a sweep is syncing with it, so an overlapping
//!   sweep (a slow peer outliving its timer tick) skips that peer;
//! - a key stays locked from the moment a sweep schedules a pull for it until
//!   that sweep ends, so no two peers ever feed the same log concurrently.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use super::RemoteLogs;
use crate::error::{Error, Result};
use crate::log::{AppendOnlyLog, LogStore, LogSummary, SeqNum};
use crate::network::{Peer, PeerDirectory, PeerId};

/// Entries `[from, to)` of one log to pull from a peer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRange {
    pub key: String,
    pub from: SeqNum,
    pub to: SeqNum,
}

impl PullRange {
    pub fn len(&self) -> u64 {
        self.to.saturating_sub(self.from)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Outcome of one sweep
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Peers whose directory was fetched
    pub peers_synced: usize,
    /// Peers skipped because another sweep still holds them
    pub peers_skipped: usize,
    /// Peers removed as unreachable
    pub peers_dropped: Vec<PeerId>,
    /// Entries appended to local logs
    pub entries_pulled: u64,
}

/// Drives pairwise synchronization with every peer in the directory
pub struct ReplicationCoordinator {
    store: Arc<RwLock<LogStore>>,
    peers: Arc<PeerDirectory>,
    remote: Arc<dyn RemoteLogs>,
    locked_peers: Mutex<HashSet<PeerId>>,
    locked_keys: Mutex<HashSet<String>>,
}

impl ReplicationCoordinator {
    pub fn new(
        store: Arc<RwLock<LogStore>>,
        peers: Arc<PeerDirectory>,
        remote: Arc<dyn RemoteLogs>,
    ) -> Self {
        Self {
            store,
            peers,
            remote,
            locked_peers: Mutex::new(HashSet::new()),
            locked_keys: Mutex::new(HashSet::new()),
        }
    }

    /// Run one full sweep over all known peers, strictly one peer at a time
    pub async fn sweep(&self) -> SweepReport {
        let mut report = SweepReport::default();
        let mut locked_keys = Vec::new();

        for peer in self.peers.list().await {
            // Dropped by an overlapping sweep since the listing
            if !self.peers.contains(peer.id).await {
                continue;
            }

            if !self.locked_peers.lock().await.insert(peer.id) {
                tracing::debug!("Peer #{} is still syncing, skipping", peer.id);
                report.peers_skipped += 1;
                continue;
            }

            let result = self.sync_peer(&peer, &mut locked_keys).await;

            self.locked_peers.lock().await.remove(&peer.id);

            match result {
                Ok(pulled) => {
                    report.peers_synced += 1;
                    report.entries_pulled += pulled;
                }
                Err(e) => {
                    tracing::warn!("Disconnect peer #{} ({}): {}", peer.id, peer.address(), e);
                    self.peers.remove(peer.id).await;
                    report.peers_dropped.push(peer.id);
                }
            }
        }

        // Keys stay locked for the whole sweep
        {
            let mut keys = self.locked_keys.lock().await;
            for key in &locked_keys {
                keys.remove(key);
            }
        }

        if report.entries_pulled > 0 || !report.peers_dropped.is_empty() {
            tracing::debug!("Sweep finished: {:?}", report);
        }

        report
    }

    /// Sync every log of one peer. Only an unreachable peer is an error.
    async fn sync_peer(&self, peer: &Peer, locked_keys: &mut Vec<String>) -> Result<u64> {
        let index = self.remote.fetch_index(peer).await.map_err(|e| match e {
            Error::PeerUnreachable { .. } => e,
            other => Error::PeerUnreachable {
                peer: peer.address(),
                reason: other.to_string(),
            },
        })?;

        let ranges = self.schedule(&index, locked_keys).await;

        let mut pulled = 0;
        for range in &ranges {
            pulled += self.pull_range(peer, range).await;
        }

        Ok(pulled)
    }

    /// Diff a remote directory against the local store and lock every key
    /// that gets a pull range. Keys locked elsewhere are left alone.
    async fn schedule(&self, index: &[LogSummary], locked_keys: &mut Vec<String>) -> Vec<PullRange> {
        let mut ranges = Vec::new();

        for remote in index {
            let mut keys = self.locked_keys.lock().await;
            if keys.contains(&remote.key) {
                tracing::debug!("Log %{} is locked, skipping", remote.key);
                continue;
            }

            let local_size = {
                let mut store = self.store.write().await;
                let existing = store.get(&remote.key).ok().map(|log| log.size());
                match existing {
                    Some(local_size) => {
                        if local_size < remote.size {
                            tracing::info!(
                                "Updated log %{} (localSize={}, remoteSize={})",
                                remote.key, local_size, remote.size
                            );
                        }
                        local_size
                    }
                    None => {
                        store.set(remote.key.clone(), AppendOnlyLog::new(remote.key.clone()));
                        tracing::info!(
                            "New log %{} (localSize=0, remoteSize={})",
                            remote.key, remote.size
                        );
                        0
                    }
                }
            };

            if local_size >= remote.size {
                continue;
            }

            keys.insert(remote.key.clone());
            locked_keys.push(remote.key.clone());
            ranges.push(PullRange {
                key: remote.key.clone(),
                from: local_size,
                to: remote.size,
            });
        }

        ranges
    }

    /// Pull one range in increasing seqNum order. Returns the number of entries appended.
    ///
    /// The pull stops at the first entry that cannot be fetched or appended,
    /// leaving the local log gap-free; the next sweep's size diff resumes
    /// from exactly that seqNum.
    async fn pull_range(&self, peer: &Peer, range: &PullRange) -> u64 {
        let mut pulled = 0;

        for seq_num in range.from..range.to {
            if !self.peers.contains(peer.id).await {
                break;
            }

            let entry = match self.remote.fetch_entry(peer, &range.key, seq_num).await {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(
                        "Could not fetch message {} from %{} (peer #{}): {}",
                        seq_num, range.key, peer.id, e
                    );
                    break;
                }
            };

            let appended = {
                let mut store = self.store.write().await;
                store.get_mut(&range.key).and_then(|log| {
                    log.append(entry.draft(), Some(seq_num), Some(entry.timestamp))
                        .map(|_| ())
                })
            };

            if let Err(e) = appended {
                tracing::warn!("Stopped replicating %{} at {}: {}", range.key, seq_num, e);
                break;
            }

            pulled += 1;
        }

        tracing::info!("Replicated {} messages from %{}", pulled, range.key);
        pulled
    }
}
