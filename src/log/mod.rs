//! Append-Only Log Module
//!
//! In-memory, per-author append-only logs and the store that owns them.

pub mod entry;
mod append_only;
mod store;

pub use entry::{Entry, LogSummary, Message, MessageDraft, SeqNum};
pub use append_only::AppendOnlyLog;
pub use store::LogStore;
