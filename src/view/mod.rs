//! Materialized View Module
//!
//! Derives a `(resource type, resource id) -> latest entry` index from the logs.

mod indexer;

pub use indexer::{ViewIndexer, ViewRecord};
