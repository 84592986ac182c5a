//! beepnode - Peer-to-peer append-only log replication
//!
//! Each author owns an append-only log of small JSON messages. Nodes find
//! each other on the local network, pull whatever their peers have that they
//! don't, and fold every log into a materialized view keyed by resource type
//! and id.
//!
//! # Architecture
//!
//! There is no leader. Every node periodically sweeps its known peers,
//! compares log sizes and pulls the missing suffix of each log, one entry
//! at a time. Per-peer and per-log locks keep overlapping sweeps from
//! duplicating work.
//!
//! # Features
//!
//! - Append-only logs with dense sequence numbers
//! - UDP broadcast peer discovery plus static seed peers
//! - Pull-based pairwise replication over HTTP
//! - Last-writer-wins view per (type, id)
//! - HTTP API for reads, local appends and view queries

pub mod config;
pub mod error;
pub mod log;
pub mod network;
pub mod replication;
pub mod view;
pub mod node;
pub mod api;

pub use config::BeepConfig;
pub use error::{Error, Result};
pub use node::Node;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::BeepConfig;
    pub use crate::error::{Error, Result};
    pub use crate::log::{AppendOnlyLog, Entry, LogStore, LogSummary, Message, MessageDraft, SeqNum};
    pub use crate::network::{Peer, PeerDirectory};
    pub use crate::node::Node;
    pub use crate::view::{ViewIndexer, ViewRecord};
}
