//! HTTP API Server
//!
//! REST API for clients and peers: log listing and reads, local appends and
//! view queries. Peers replicate through the same `/api/logs` routes.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::ApiConfig;
use crate::error::{Error, Result};
use crate::log::{MessageDraft, SeqNum};
use crate::node::Node;

/// Shared application state
pub struct AppState {
    /// The node this API exposes
    pub node: Arc<Node>,
    /// Server start time
    pub started_at: Instant,
}

/// HTTP API server
pub struct HttpServer {
    config: ApiConfig,
    state: Arc<AppState>,
}

impl HttpServer {
    /// Create a new HTTP server
    pub fn new(config: ApiConfig, node: Arc<Node>) -> Self {
        let state = Arc::new(AppState {
            node,
            started_at: Instant::now(),
        });

        Self { config, state }
    }

    /// Create the router
    pub fn router(&self) -> Router {
        let api = Router::new()
            .route("/logs", get(handle_logs))
            .route("/logs/:key", get(handle_log).post(handle_append))
            .route("/logs/:key/:seq_num", get(handle_log_message))
            .route("/query/:resource_type", get(handle_find_all))
            .route("/query/:resource_type/:id", get(handle_find))
            .route("/peers", get(handle_peers));

        let router = Router::new()
            .nest("/api", api)
            .route("/health", get(handle_health))
            .with_state(Arc::clone(&self.state))
            .layer(TraceLayer::new_for_http());

        if self.config.cors_enabled {
            router.layer(CorsLayer::permissive())
        } else {
            router
        }
    }

    /// Bind the configured address. Port 0 picks a free port.
    pub async fn bind(&self) -> Result<TcpListener> {
        let listener = TcpListener::bind(&self.config.bind_address).await?;
        tracing::info!("HTTP API listening on {}", listener.local_addr()?);
        Ok(listener)
    }

    /// Serve on an already bound listener until `shutdown` resolves
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| Error::Network(format!("HTTP server error: {}", e)))?;

        Ok(())
    }
}

// ============ Response Types ============

/// Health response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub healthy: bool,
    pub node_id: String,
    pub logs: usize,
    pub peers: usize,
    pub uptime_seconds: u64,
}

/// Error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

fn error_response(error: Error) -> Response {
    let status = if error.is_not_found() {
        StatusCode::NOT_FOUND
    } else {
        tracing::warn!("API request failed: {}", error);
        StatusCode::INTERNAL_SERVER_ERROR
    };

    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
            code: error.code().to_string(),
        }),
    )
        .into_response()
}

fn json_or_error<T: Serialize>(result: Result<T>) -> Response {
    match result {
        Ok(value) => Json(value).into_response(),
        Err(e) => error_response(e),
    }
}

// ============ Handlers ============

async fn handle_logs(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.node.get_all_logs().await)
}

async fn handle_log(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Response {
    json_or_error(state.node.get_log(&key).await)
}

async fn handle_log_message(
    State(state): State<Arc<AppState>>,
    Path((key, seq_num)): Path<(String, SeqNum)>,
) -> Response {
    json_or_error(state.node.get_log_message(&key, seq_num).await)
}

// No signature checks: any client may append to any log
async fn handle_append(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    Json(draft): Json<MessageDraft>,
) -> Response {
    match state.node.append_to_log(&key, draft).await {
        Ok(entry) => (StatusCode::CREATED, Json(entry)).into_response(),
        Err(e) => error_response(e),
    }
}

async fn handle_find_all(
    State(state): State<Arc<AppState>>,
    Path(resource_type): Path<String>,
) -> impl IntoResponse {
    Json(state.node.find_all(&resource_type).await)
}

async fn handle_find(
    State(state): State<Arc<AppState>>,
    Path((resource_type, id)): Path<(String, String)>,
) -> Response {
    json_or_error(state.node.find(&resource_type, &id).await)
}

async fn handle_peers(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.node.peers().await)
}

async fn handle_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        healthy: true,
        node_id: state.node.config().node.id.clone(),
        logs: state.node.get_all_logs().await.len(),
        peers: state.node.peer_directory().len().await,
        uptime_seconds: state.started_at.elapsed().as_secs(),
    })
}
