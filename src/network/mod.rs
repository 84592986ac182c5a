//! Network Module
//!
//! Peer discovery on the local network, the live peer set and the HTTP
//! transport used to read other nodes' logs.

pub mod discovery;
mod peers;
mod client;

pub use discovery::{Discovery, DiscoveredPeer, PeerFoundHandler};
pub use peers::{Peer, PeerDirectory, PeerId};
pub use client::HttpPeerClient;
