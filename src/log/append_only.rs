//! Append-only log of a single author

use serde::{Deserialize, Serialize};

use super::entry::{now_millis, Entry, MessageDraft, SeqNum};
use crate::error::{Error, Result};

/// Ordered, immutable sequence of entries for one identity key.
///
/// `size()` is always the next sequence number to assign, and the entry at
/// index `i` always carries `seq_num == i`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppendOnlyLog {
    key: String,
    messages: Vec<Entry>,
}

impl AppendOnlyLog {
    /// Create an empty log
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            messages: Vec::new(),
        }
    }

    /// Author key of this log
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Append an entry.
    ///
    /// Without `seq_num` the entry takes the next local position. A supplied
    /// `seq_num` (replication path) must equal `size()`; anything else is
    /// rejected and the log is left untouched. `timestamp` defaults to now.
    pub fn append(
        &mut self,
        draft: MessageDraft,
        seq_num: Option<SeqNum>,
        timestamp: Option<i64>,
    ) -> Result<&Entry> {
        let expected = self.size();
        let seq_num = seq_num.unwrap_or(expected);

        if seq_num != expected {
            return Err(Error::OutOfOrder {
                key: self.key.clone(),
                expected,
                got: seq_num,
            });
        }

        let entry = Entry::new(draft, seq_num, timestamp.unwrap_or_else(now_millis));
        self.messages.push(entry);
        Ok(&self.messages[self.messages.len() - 1])
    }

    /// Entry at a position
    pub fn get(&self, seq_num: SeqNum) -> Result<&Entry> {
        if seq_num >= self.size() {
            return Err(Error::EntryNotFound {
                key: self.key.clone(),
                seq_num,
            });
        }

        Ok(&self.messages[seq_num as usize])
    }

    /// All entries in order
    pub fn get_all(&self) -> &[Entry] {
        &self.messages
    }

    /// Number of entries
    pub fn size(&self) -> u64 {
        self.messages.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(id: &str) -> MessageDraft {
        MessageDraft {
            id: id.to_string(),
            resource_type: "post".to_string(),
            text: format!("text of {}", id),
        }
    }

    #[test]
    fn test_local_append_assigns_next_seq_num() {
        let mut log = AppendOnlyLog::new("alice");

        for i in 0..5u64 {
            let previous = log.size();
            let entry = log.append(draft(&format!("p{}", i)), None, None).unwrap().clone();
            assert_eq!(entry.seq_num(), previous);
            assert_eq!(log.get(log.size() - 1).unwrap(), &entry);
            assert_eq!(log.get_all().len() as u64, log.size());
        }

        assert_eq!(log.size(), 5);
    }

    #[test]
    fn test_replicated_append_preserves_timestamp() {
        let mut log = AppendOnlyLog::new("alice");
        log.append(draft("a"), Some(0), Some(42)).unwrap();
        log.append(draft("b"), Some(1), Some(43)).unwrap();

        assert_eq!(log.get(0).unwrap().timestamp, 42);
        assert_eq!(log.get(1).unwrap().timestamp, 43);
        assert_eq!(log.get(1).unwrap().message.id, "b");
    }

    #[test]
    fn test_replicated_append_rejects_wrong_position() {
        let mut log = AppendOnlyLog::new("alice");
        log.append(draft("a"), None, None).unwrap();

        // Duplicate of an existing position
        let err = log.append(draft("a"), Some(0), None).unwrap_err();
        assert!(matches!(err, Error::OutOfOrder { expected: 1, got: 0, .. }));

        // Gap
        let err = log.append(draft("c"), Some(2), None).unwrap_err();
        assert!(matches!(err, Error::OutOfOrder { expected: 1, got: 2, .. }));

        assert_eq!(log.size(), 1);
    }

    #[test]
    fn test_get_out_of_range() {
        let mut log = AppendOnlyLog::new("bob");
        assert!(log.get(0).unwrap_err().is_not_found());

        log.append(draft("a"), None, None).unwrap();
        assert!(log.get(0).is_ok());
        // size() itself is past the end
        assert!(log.get(1).unwrap_err().is_not_found());
    }

    #[test]
    fn test_serializes_as_key_and_messages() {
        let mut log = AppendOnlyLog::new("carol");
        log.append(draft("a"), None, Some(1)).unwrap();

        let json = serde_json::to_value(&log).unwrap();
        assert_eq!(json["key"], "carol");
        assert_eq!(json["messages"].as_array().unwrap().len(), 1);
        assert_eq!(json["messages"][0]["message"]["seqNum"], 0);
    }
}
