//! beepnode Error Types

use thiserror::Error;

/// Result type alias for beepnode operations
pub type Result<T> = std::result::Result<T, Error>;

/// beepnode error types
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Configuration serialization error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    // Lookup errors
    #[error("Log not found: {0}")]
    LogNotFound(String),

    #[error("Entry {seq_num} not found in log {key}")]
    EntryNotFound { key: String, seq_num: u64 },

    #[error("Resource not found: {resource_type}/{id}")]
    ResourceNotFound { resource_type: String, id: String },

    // Log errors
    #[error("Out of order append to log {key}: expected seqNum {expected}, got {got}")]
    OutOfOrder { key: String, expected: u64, got: u64 },

    // Replication errors
    #[error("Peer {peer} unreachable: {reason}")]
    PeerUnreachable { peer: String, reason: String },

    #[error("Could not fetch entry {seq_num} of log {key}: {reason}")]
    EntryFetchFailed {
        key: String,
        seq_num: u64,
        reason: String,
    },

    // Network errors
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Check if this error means the requested log, entry or record is absent
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Error::LogNotFound(_) | Error::EntryNotFound { .. } | Error::ResourceNotFound { .. }
        )
    }

    /// Check if this error is transient and the operation may succeed on a later sweep
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::PeerUnreachable { .. }
                | Error::EntryFetchFailed { .. }
                | Error::Network(_)
                | Error::Http(_)
        )
    }

    /// Stable error code used in API error bodies
    pub fn code(&self) -> &'static str {
        match self {
            Error::LogNotFound(_) => "LOG_NOT_FOUND",
            Error::EntryNotFound { .. } => "ENTRY_NOT_FOUND",
            Error::ResourceNotFound { .. } => "RESOURCE_NOT_FOUND",
            Error::OutOfOrder { .. } => "OUT_OF_ORDER",
            _ => "INTERNAL_ERROR",
        }
    }
}
