//! Log Store
//!
//! Exclusive owner of every log this node knows about.

use std::collections::HashMap;

use super::append_only::AppendOnlyLog;
use super::entry::LogSummary;
use crate::error::{Error, Result};

/// Mapping from author key to its log. Logs are never evicted.
#[derive(Debug, Default)]
pub struct LogStore {
    logs: HashMap<String, AppendOnlyLog>,
}

impl LogStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exists(&self, key: &str) -> bool {
        self.logs.contains_key(key)
    }

    /// Insert or replace the log for a key
    pub fn set(&mut self, key: impl Into<String>, log: AppendOnlyLog) {
        self.logs.insert(key.into(), log);
    }

    pub fn get(&self, key: &str) -> Result<&AppendOnlyLog> {
        self.logs
            .get(key)
            .ok_or_else(|| Error::LogNotFound(key.to_string()))
    }

    pub fn get_mut(&mut self, key: &str) -> Result<&mut AppendOnlyLog> {
        self.logs
            .get_mut(key)
            .ok_or_else(|| Error::LogNotFound(key.to_string()))
    }

    /// Get the log for a key, creating an empty one if absent
    pub fn get_or_create(&mut self, key: &str) -> &mut AppendOnlyLog {
        self.logs
            .entry(key.to_string())
            .or_insert_with(|| AppendOnlyLog::new(key))
    }

    /// All known author keys, in no particular order
    pub fn keys(&self) -> Vec<String> {
        self.logs.keys().cloned().collect()
    }

    /// Directory listing of every log with its size
    pub fn summaries(&self) -> Vec<LogSummary> {
        let mut summaries: Vec<LogSummary> = self
            .logs
            .values()
            .map(|log| LogSummary {
                key: log.key().to_string(),
                size: log.size(),
            })
            .collect();
        summaries.sort_by(|a, b| a.key.cmp(&b.key));
        summaries
    }

    pub fn len(&self) -> usize {
        self.logs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.logs.is_empty()
    }
}
