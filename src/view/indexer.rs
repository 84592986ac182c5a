//! View Indexer
//!
//! Scans only the unseen tail of each log and keeps the latest entry per
//! resource. The view keeps no history.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::log::{LogStore, Message};

/// Latest known state of one resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewRecord {
    /// Key of the log the entry was read from
    pub key: String,
    pub message: Message,
    pub timestamp: i64,
}

/// Incremental indexer over a [`LogStore`]
#[derive(Debug, Default)]
pub struct ViewIndexer {
    /// Last seqNum incorporated per log, -1 before the first scan
    checkpoints: HashMap<String, i64>,
    /// type -> id -> record
    views: HashMap<String, HashMap<String, ViewRecord>>,
}

impl ViewIndexer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rescan the unseen suffix of one log. Returns the number of entries scanned.
    ///
    /// The scan restarts at the checkpoint position itself, so the last entry
    /// of the previous pass is visited again. Writes are overwrites of the
    /// same slot, which makes the overlap harmless.
    pub fn update(&mut self, store: &LogStore, key: &str) -> Result<usize> {
        let log = store.get(key)?;
        let checkpoint = *self.checkpoints.entry(key.to_string()).or_insert(-1);

        let dirty = log.size() as i64 - 1 > checkpoint;
        if !dirty {
            return Ok(0);
        }

        let start = checkpoint.max(0) as usize;
        let mut scanned = 0;

        for entry in &log.get_all()[start..] {
            let message = &entry.message;

            self.views
                .entry(message.resource_type.clone())
                .or_default()
                .insert(
                    message.id.clone(),
                    ViewRecord {
                        key: key.to_string(),
                        message: message.clone(),
                        timestamp: entry.timestamp,
                    },
                );

            self.checkpoints.insert(key.to_string(), message.seq_num as i64);
            scanned += 1;
        }

        tracing::trace!("View scanned {} entries of %{}", scanned, key);
        Ok(scanned)
    }

    /// Update the view for every log in the store
    pub fn update_all(&mut self, store: &LogStore) -> usize {
        let mut scanned = 0;

        for key in store.keys() {
            match self.update(store, &key) {
                Ok(n) => scanned += n,
                Err(e) => tracing::warn!("View update failed for %{}: {}", key, e),
            }
        }

        scanned
    }

    /// All current records of a type, in no particular order
    pub fn find_all(&self, resource_type: &str) -> Vec<ViewRecord> {
        self.views
            .get(resource_type)
            .map(|records| records.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Current record for one resource
    pub fn find(&self, resource_type: &str, id: &str) -> Result<&ViewRecord> {
        self.views
            .get(resource_type)
            .and_then(|records| records.get(id))
            .ok_or_else(|| Error::ResourceNotFound {
                resource_type: resource_type.to_string(),
                id: id.to_string(),
            })
    }

    /// Last seqNum incorporated for a log, if it was ever scanned
    pub fn checkpoint(&self, key: &str) -> Option<i64> {
        self.checkpoints.get(key).copied()
    }
}
