//! Long-poll notification server over the sync engine.
//!
//! Architecture:
//! ```text
//! Client A ──get──────► snapshot + version            (never blocks)
//! Client B ──update───► resolve placeholders ─► apply ─► wake waiters
//! Client C ──watch────► wait_for(since + 1) ─► snapshot + id_map
//!                       ▲ the only suspension point
//! ```
//!
//! Routes (mounted under `/apiv1`):
//! - `GET  /newSession`
//! - `GET  /{graph_id}/get`
//! - `POST /{graph_id}/update`   (session header required)
//! - `GET  /{graph_id}/watch/{since}` (session header required)
//!
//! A watch dropped by a disconnecting client drops its wait future and
//! with it the waiter registration — nothing leaks.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::engine::SyncEngine;
use crate::graph::GraphState;
use crate::protocol::{
    validate_update, ChangedNodes, GraphResponse, NodeDto, ProtocolError, SessionResponse,
    UpdateRequest, UpdateResponse, WatchResponse, GRAPH_ID, SESSION_HEADER,
};
use crate::session::SessionRegistry;
use crate::storage::StoreError;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: String,
    /// Autosave flush period in milliseconds
    pub autosave_period_ms: u64,
    /// Optional server-side cap on how long a watch may stay pending.
    /// `None` (the default) keeps the base contract: a watch waits
    /// until the version advances. When set, a timed-out watch returns
    /// the current state with an unchanged version and the client
    /// simply re-polls.
    pub watch_timeout_secs: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            autosave_period_ms: 1_000,
            watch_timeout_secs: None,
        }
    }
}

impl ServerConfig {
    /// Config for tests: fast autosave, no watch cap.
    pub fn for_testing() -> Self {
        Self {
            bind_addr: "127.0.0.1:0".to_string(),
            autosave_period_ms: 20,
            watch_timeout_secs: None,
        }
    }

    pub fn autosave_period(&self) -> Duration {
        Duration::from_millis(self.autosave_period_ms)
    }
}

/// Server statistics snapshot.
#[derive(Debug, Clone, Default)]
pub struct ServerStats {
    pub sessions_created: u64,
    pub updates_applied: u64,
    pub watches_served: u64,
}

/// Lock-free counters behind the stats snapshot.
#[derive(Default)]
struct AtomicServerStats {
    sessions_created: AtomicU64,
    updates_applied: AtomicU64,
    watches_served: AtomicU64,
}

impl AtomicServerStats {
    fn snapshot(&self) -> ServerStats {
        ServerStats {
            sessions_created: self.sessions_created.load(Ordering::Relaxed),
            updates_applied: self.updates_applied.load(Ordering::Relaxed),
            watches_served: self.watches_served.load(Ordering::Relaxed),
        }
    }
}

/// The long-poll sync server.
pub struct SyncServer {
    engine: Arc<SyncEngine>,
    config: ServerConfig,
    stats: Arc<AtomicServerStats>,
}

impl SyncServer {
    pub fn new(engine: Arc<SyncEngine>, config: ServerConfig) -> Self {
        Self {
            engine,
            config,
            stats: Arc::new(AtomicServerStats::default()),
        }
    }

    /// Build the axum router for this server.
    pub fn router(&self) -> Router {
        let state = AppState {
            graph: self.engine.graph().clone(),
            sessions: self.engine.sessions().clone(),
            stats: self.stats.clone(),
            watch_timeout: self.config.watch_timeout_secs.map(Duration::from_secs),
        };
        Router::new()
            .route("/apiv1/newSession", get(new_session))
            .route("/apiv1/{graph_id}/get", get(get_graph))
            .route("/apiv1/{graph_id}/update", post(update_graph))
            .route("/apiv1/{graph_id}/watch/{since}", get(watch_graph))
            .with_state(state)
    }

    /// Current request counters.
    pub fn stats(&self) -> ServerStats {
        self.stats.snapshot()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// Shared handler state.
#[derive(Clone)]
struct AppState {
    graph: Arc<GraphState>,
    sessions: Arc<SessionRegistry>,
    stats: Arc<AtomicServerStats>,
    watch_timeout: Option<Duration>,
}

/// Request failures, mapped onto the HTTP surface.
#[derive(Debug)]
enum ApiError {
    /// Malformed payload or missing session — client error, nothing mutated
    Validation(ProtocolError),
    /// The engine serves exactly one graph; anything else is unknown
    UnknownGraph(String),
    /// Durable store failure while resolving a placeholder
    Store(StoreError),
}

impl From<ProtocolError> for ApiError {
    fn from(err: ProtocolError) -> Self {
        Self::Validation(err)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::Validation(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            Self::UnknownGraph(id) => (StatusCode::NOT_FOUND, format!("unknown graph '{id}'")),
            Self::Store(err) => {
                log::error!("store failure on the update path: {err}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "persistence failure".to_string(),
                )
            }
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

/// The engine serves exactly one graph; any other path segment is 404.
fn check_graph(segment: &str) -> Result<(), ApiError> {
    match segment.parse::<u64>() {
        Ok(id) if id == GRAPH_ID => Ok(()),
        _ => Err(ApiError::UnknownGraph(segment.to_string())),
    }
}

/// Extract the session token from the request headers.
fn require_session(headers: &HeaderMap) -> Result<String, ApiError> {
    headers
        .get(SESSION_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .ok_or(ApiError::Validation(ProtocolError::MissingSession))
}

async fn new_session(State(state): State<AppState>) -> Json<SessionResponse> {
    let session = state.sessions.new_session();
    state.stats.sessions_created.fetch_add(1, Ordering::Relaxed);
    log::debug!("new session {session}");
    Json(SessionResponse { session })
}

/// Full snapshot plus current version. Never blocks.
async fn get_graph(
    State(state): State<AppState>,
    Path(graph_id): Path<String>,
) -> Result<Json<GraphResponse>, ApiError> {
    check_graph(&graph_id)?;

    let (change_id, nodes) = state.graph.snapshot_with_version().await;
    Ok(Json(GraphResponse {
        graph_id: GRAPH_ID,
        change_id,
        nodes: nodes.iter().map(NodeDto::from_node).collect(),
    }))
}

/// Resolve placeholders, apply the batch, wake waiters.
///
/// All-or-nothing: the payload is validated completely before any
/// resolution, and a store failure while resolving rejects the whole
/// batch with graph state untouched.
async fn update_graph(
    State(state): State<AppState>,
    Path(graph_id): Path<String>,
    headers: HeaderMap,
    body: Result<Json<UpdateRequest>, JsonRejection>,
) -> Result<Json<UpdateResponse>, ApiError> {
    check_graph(&graph_id)?;
    let session = require_session(&headers)?;
    let Json(request) =
        body.map_err(|rejection| ProtocolError::MalformedBody(rejection.body_text()))?;
    validate_update(&request)?;

    let mut batch = Vec::with_capacity(request.changed.nodes.len());
    for dto in request.changed.nodes {
        batch.push(state.sessions.resolve(&session, dto.into_node()).await?);
    }

    let change_id = state.graph.apply(batch).await;
    state.stats.updates_applied.fetch_add(1, Ordering::Relaxed);
    log::debug!("update applied, version {change_id}");

    Ok(Json(UpdateResponse {
        change_id,
        id_map: state.sessions.id_map(&session).await,
    }))
}

/// Long-poll: suspend until the version passes `since`, then return
/// the new snapshot and the session's id map.
///
/// A stale `since` (already below the current version) is satisfied
/// immediately rather than treated as an error.
async fn watch_graph(
    State(state): State<AppState>,
    Path((graph_id, since)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Json<WatchResponse>, ApiError> {
    check_graph(&graph_id)?;
    let session = require_session(&headers)?;
    let since: u64 = since.parse().map_err(|_| {
        ProtocolError::MalformedBody("sinceVersion must be a non-negative integer".to_string())
    })?;

    let threshold = since.saturating_add(1);
    match state.watch_timeout {
        Some(limit) => {
            // Timed-out watches report the unchanged current version;
            // the client re-polls.
            let _ = tokio::time::timeout(limit, state.graph.wait_for(threshold)).await;
        }
        None => state.graph.wait_for(threshold).await,
    }

    let (change_id, nodes) = state.graph.snapshot_with_version().await;
    state.stats.watches_served.fetch_add(1, Ordering::Relaxed);
    log::debug!("watch {since} -> {change_id}");

    Ok(Json(WatchResponse {
        graph_id: GRAPH_ID,
        change_id,
        changed: ChangedNodes {
            nodes: nodes.iter().map(NodeDto::from_node).collect(),
        },
        id_map: state.sessions.id_map(&session).await,
    }))
}
