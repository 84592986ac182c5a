//! Replication Module
//!
//! Pairwise pull-based synchronization of logs with every known peer.

mod coordinator;

pub use coordinator::{PullRange, ReplicationCoordinator, SweepReport};

use crate::error::Result;
use crate::log::{Entry, LogSummary, SeqNum};
use crate::network::Peer;

/// Read access to a remote node's logs
#[async_trait::async_trait]
pub trait RemoteLogs: Send + Sync {
    /// Every log the peer holds, with sizes only.
    /// Failures are reported as [`crate::Error::PeerUnreachable`].
    async fn fetch_index(&self, peer: &Peer) -> Result<Vec<LogSummary>>;

    /// One entry of one log.
    /// Failures are reported as [`crate::Error::EntryFetchFailed`].
    async fn fetch_entry(&self, peer: &Peer, key: &str, seq_num: SeqNum) -> Result<Entry>;
}
