//! HTTP API Module
//!
//! Provides the REST API clients and peers use to read and append logs and
//! to query the materialized view.

mod http;

pub use http::{AppState, ErrorResponse, HealthResponse, HttpServer};
