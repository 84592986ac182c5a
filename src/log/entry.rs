//! Log Entry Types
//!
//! Field names follow the JSON shape peers exchange over HTTP,
//! so these types double as the replication wire format.

use serde::{Deserialize, Serialize};

/// Position of an entry within its log
pub type SeqNum = u64;

/// Message body as authored by a client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageDraft {
    /// Resource id this message addresses
    pub id: String,
    /// Resource type this message addresses
    #[serde(rename = "type")]
    pub resource_type: String,
    /// Free-form payload
    #[serde(default)]
    pub text: String,
}

/// Message stored in a log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    #[serde(rename = "seqNum")]
    pub seq_num: SeqNum,
    pub text: String,
    #[serde(rename = "type")]
    pub resource_type: String,
}

/// Entry of an append-only log: the message plus its authoring time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub message: Message,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
}

impl Entry {
    /// Build an entry at a given position
    pub fn new(draft: MessageDraft, seq_num: SeqNum, timestamp: i64) -> Self {
        Self {
            message: Message {
                id: draft.id,
                seq_num,
                text: draft.text,
                resource_type: draft.resource_type,
            },
            timestamp,
        }
    }

    pub fn seq_num(&self) -> SeqNum {
        self.message.seq_num
    }

    /// Strip the position, keeping what the author wrote
    pub fn draft(&self) -> MessageDraft {
        MessageDraft {
            id: self.message.id.clone(),
            resource_type: self.message.resource_type.clone(),
            text: self.message.text.clone(),
        }
    }
}

/// Directory listing item: a log key and its size
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogSummary {
    pub key: String,
    pub size: u64,
}

/// Current time in epoch milliseconds
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_wire_shape() {
        let entry = Entry::new(
            MessageDraft {
                id: "post-1".into(),
                resource_type: "post".into(),
                text: "hello".into(),
            },
            4,
            1_700_000_000_000,
        );

        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["timestamp"], 1_700_000_000_000i64);
        assert_eq!(json["message"]["seqNum"], 4);
        assert_eq!(json["message"]["type"], "post");
        assert_eq!(json["message"]["id"], "post-1");
    }

    #[test]
    fn test_draft_without_text() {
        let draft: MessageDraft = serde_json::from_str(r#"{"id":"a","type":"like"}"#).unwrap();
        assert_eq!(draft.resource_type, "like");
        assert!(draft.text.is_empty());
    }
}
