//! Per-session reconciliation of client placeholder ids.
//!
//! Clients create nodes optimistically while offline, tagging them
//! with negative placeholder ids. On first submission the registry
//! asks the store for a permanent id, records the mapping, and from
//! then on resolves that placeholder to the same permanent id for the
//! lifetime of the session.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::node::Node;
use crate::storage::{NodeStore, StoreError};

/// Placeholder→permanent id maps, partitioned by session token.
///
/// Maps are created lazily on the first placeholder seen for a
/// session and live for the process lifetime.
pub struct SessionRegistry {
    store: Arc<NodeStore>,
    sessions: RwLock<HashMap<String, HashMap<i64, i64>>>,
}

impl SessionRegistry {
    pub fn new(store: Arc<NodeStore>) -> Self {
        Self {
            store,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Mint a fresh opaque session token. Uniqueness within the
    /// process is the requirement, not unguessability.
    pub fn new_session(&self) -> String {
        Uuid::new_v4().to_string()
    }

    /// Rewrite a placeholder id to its permanent id.
    ///
    /// Non-negative ids pass through unchanged. A negative id is
    /// looked up in the session's map; on a miss the store assigns
    /// (and persists) a permanent id which is then recorded, so
    /// resolving the same placeholder twice in one session always
    /// yields the same id. The lookup-and-assign runs under the write
    /// lock, which serializes concurrent resolutions of the same
    /// placeholder — one logical placeholder never gets two rows.
    pub async fn resolve(&self, session: &str, mut node: Node) -> Result<Node, StoreError> {
        if node.id >= 0 {
            return Ok(node);
        }

        let mut sessions = self.sessions.write().await;
        let map = sessions.entry(session.to_string()).or_default();

        if let Some(&assigned) = map.get(&node.id) {
            node.id = assigned;
            return Ok(node);
        }

        let placeholder = node.id;
        let assigned = self.store.assign_id(&node)?;
        map.insert(placeholder, assigned);
        log::debug!("session {session}: placeholder {placeholder} -> {assigned}");
        node.id = assigned;
        Ok(node)
    }

    /// The session's full placeholder→permanent map; empty for
    /// unknown sessions.
    pub async fn id_map(&self, session: &str) -> HashMap<i64, i64> {
        self.sessions
            .read()
            .await
            .get(session)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of sessions that have resolved at least one placeholder.
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}
