//! HTTP Peer Client
//!
//! Reads a peer's log directory and entries through the same REST API
//! clients use.

use std::time::Duration;

use crate::error::{Error, Result};
use crate::log::{Entry, LogSummary, SeqNum};
use crate::network::Peer;
use crate::replication::RemoteLogs;

/// [`RemoteLogs`] over the peer's `/api/logs` routes
#[derive(Debug, Clone)]
pub struct HttpPeerClient {
    client: reqwest::Client,
}

impl HttpPeerClient {
    /// Create a client. No timeout is applied unless one is given.
    pub fn new(request_timeout: Option<Duration>) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = request_timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, peer: &Peer, path: &[&str]) -> Result<T> {
        let url = peer_url(peer, path)?;
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.json().await?)
    }
}

/// Build `{base}/{path...}`, percent-encoding each segment
fn peer_url(peer: &Peer, path: &[&str]) -> Result<reqwest::Url> {
    let base = peer.base_url();
    let mut url = reqwest::Url::parse(&base)
        .map_err(|e| Error::Network(format!("invalid peer address {}: {}", base, e)))?;

    url.path_segments_mut()
        .map_err(|_| Error::Network(format!("invalid peer address {}", base)))?
        .pop_if_empty()
        .extend(path);

    Ok(url)
}

#[async_trait::async_trait]
impl RemoteLogs for HttpPeerClient {
    async fn fetch_index(&self, peer: &Peer) -> Result<Vec<LogSummary>> {
        self.get_json(peer, &["api", "logs"]).await.map_err(|e| Error::PeerUnreachable {
            peer: peer.address(),
            reason: e.to_string(),
        })
    }

    async fn fetch_entry(&self, peer: &Peer, key: &str, seq_num: SeqNum) -> Result<Entry> {
        let seq_num_segment = seq_num.to_string();

        self.get_json(peer, &["api", "logs", key, &seq_num_segment]).await.map_err(|e| Error::EntryFetchFailed {
            key: key.to_string(),
            seq_num,
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer(host: &str, port: u16) -> Peer {
        Peer {
            id: 1,
            host: host.to_string(),
            port,
            discovered_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_peer_url_encodes_log_keys() {
        let url = peer_url(&peer("10.0.0.2", 8080), &["api", "logs", "a/b c", "3"]).unwrap();
        assert_eq!(url.as_str(), "http://10.0.0.2:8080/api/logs/a%2Fb%20c/3");
    }

    #[test]
    fn test_peer_url_ipv6_host() {
        let url = peer_url(&peer("::1", 8080), &["api", "logs", "alice", "0"]).unwrap();
        assert_eq!(url.as_str(), "http://[::1]:8080/api/logs/alice/0");
    }

    #[test]
    fn test_peer_url_directory() {
        let url = peer_url(&peer("localhost", 9000), &["api", "logs"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:9000/api/logs");
    }
}
