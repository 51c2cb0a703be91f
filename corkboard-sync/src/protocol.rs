//! JSON wire shapes for the long-poll sync API.
//!
//! Node shape on the wire:
//! ```text
//! { "id": 7, "pos": [x, y], "dims": [w, h], "text": "...", "type": "Fact" }
//! ```
//!
//! `type` defaults to `"source"` in responses when the node carries no
//! tag. Update batches may use negative placeholder ids; everything
//! else about the shape is fixed. Body validation is explicit schema
//! checking producing a tagged error, never a panic.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::node::Node;

/// The engine serves exactly one graph.
pub const GRAPH_ID: u64 = 1;

/// Request header carrying the session token for update/watch.
pub const SESSION_HEADER: &str = "Realtime-Graph-Session";

/// A node as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDto {
    pub id: i64,
    pub pos: [f64; 2],
    pub dims: [f64; 2],
    pub text: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

impl NodeDto {
    /// Wire form of a node; absent tags are reported as `"source"`.
    pub fn from_node(node: &Node) -> Self {
        Self {
            id: node.id,
            pos: [node.x, node.y],
            dims: [node.width, node.height],
            text: node.text.clone(),
            kind: Some(node.kind_or_default().to_string()),
        }
    }

    /// Domain form; the tag is kept exactly as submitted (absent stays
    /// absent — the `"source"` default is response-side only).
    pub fn into_node(self) -> Node {
        Node {
            id: self.id,
            x: self.pos[0],
            y: self.pos[1],
            width: self.dims[0],
            height: self.dims[1],
            text: self.text,
            kind: self.kind,
        }
    }
}

/// `{ "nodes": [...] }` — the changed-node envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangedNodes {
    pub nodes: Vec<NodeDto>,
}

/// Response of `newSession`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResponse {
    pub session: String,
}

/// Response of `get`: current version plus the full snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphResponse {
    #[serde(rename = "graphId")]
    pub graph_id: u64,
    #[serde(rename = "changeId")]
    pub change_id: u64,
    pub nodes: Vec<NodeDto>,
}

/// Body of `update`.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateRequest {
    #[serde(rename = "graphId")]
    pub graph_id: u64,
    /// Client's last-seen version. Accepted for compatibility, unused.
    #[serde(rename = "changeId", default)]
    pub change_id: Option<u64>,
    pub changed: ChangedNodes,
}

/// Response of `update`: the new version and the session's current
/// placeholder map (JSON stringifies the negative keys).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateResponse {
    #[serde(rename = "changeId")]
    pub change_id: u64,
    pub id_map: HashMap<i64, i64>,
}

/// Response of `watch`: new version, full snapshot, session map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchResponse {
    #[serde(rename = "graphId")]
    pub graph_id: u64,
    #[serde(rename = "changeId")]
    pub change_id: u64,
    pub changed: ChangedNodes,
    pub id_map: HashMap<i64, i64>,
}

/// Validation failures for incoming requests.
#[derive(Debug, Clone, PartialEq)]
pub enum ProtocolError {
    /// Body did not match the expected shape (missing nodes list,
    /// non-integer id, wrong types).
    MalformedBody(String),
    /// Node id 0 is neither a committed id nor a placeholder.
    ZeroNodeId,
    /// Body named a graph other than the one this engine serves.
    GraphIdMismatch(u64),
    /// Session header absent or empty.
    MissingSession,
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MalformedBody(detail) => write!(f, "malformed update payload: {detail}"),
            Self::ZeroNodeId => write!(f, "node id 0 is not a valid identifier"),
            Self::GraphIdMismatch(id) => write!(f, "payload addresses graph {id}, not {GRAPH_ID}"),
            Self::MissingSession => write!(f, "missing {SESSION_HEADER} header"),
        }
    }
}

impl std::error::Error for ProtocolError {}

/// Semantic checks on a structurally valid update body.
pub fn validate_update(req: &UpdateRequest) -> Result<(), ProtocolError> {
    if req.graph_id != GRAPH_ID {
        return Err(ProtocolError::GraphIdMismatch(req.graph_id));
    }
    if req.changed.nodes.iter().any(|n| n.id == 0) {
        return Err(ProtocolError::ZeroNodeId);
    }
    Ok(())
}
