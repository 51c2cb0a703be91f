//! Authoritative in-memory graph state with change versioning.
//!
//! Architecture:
//! ```text
//! Update ──► apply(batch) ──► nodes map (insert-or-replace)
//!                 │
//!                 ├── version += 1 (once per batch)
//!                 │
//!                 ▼
//!           watch channel ──► wakes every waiter whose
//!                             threshold is now satisfied
//! ```
//!
//! The version is published through a `tokio::sync::watch` channel
//! rather than a single reused event: each waiter waits for its own
//! threshold, so a wake-up cannot be lost between two rapid applies.

use std::collections::HashMap;
use tokio::sync::{watch, RwLock};

use crate::node::Node;

/// Guarded together so a snapshot is always consistent with the
/// version it reports.
struct GraphInner {
    nodes: HashMap<i64, Node>,
    version: u64,
}

/// Single source of truth for live node data.
///
/// All mutation goes through [`GraphState::apply`], which serializes
/// against concurrent applies and snapshots via the write lock.
pub struct GraphState {
    inner: RwLock<GraphInner>,
    version_tx: watch::Sender<u64>,
}

impl GraphState {
    /// Create graph state seeded with the given nodes, at version 0.
    pub fn new(seed: Vec<Node>) -> Self {
        let nodes = seed.into_iter().map(|n| (n.id, n)).collect();
        let (version_tx, _) = watch::channel(0);
        Self {
            inner: RwLock::new(GraphInner { nodes, version: 0 }),
            version_tx,
        }
    }

    /// Current version counter.
    pub async fn version(&self) -> u64 {
        self.inner.read().await.version
    }

    /// Copy of every current node. Order is not significant.
    pub async fn snapshot(&self) -> Vec<Node> {
        self.inner.read().await.nodes.values().cloned().collect()
    }

    /// Version and snapshot read under one lock — a watcher reporting
    /// version `v` always returns the state that produced exactly `v`.
    pub async fn snapshot_with_version(&self) -> (u64, Vec<Node>) {
        let inner = self.inner.read().await;
        (inner.version, inner.nodes.values().cloned().collect())
    }

    /// Number of live nodes.
    pub async fn node_count(&self) -> usize {
        self.inner.read().await.nodes.len()
    }

    /// Insert-or-replace every node in the batch, bump the version
    /// exactly once (empty batches included), wake satisfied waiters,
    /// and return the new version.
    ///
    /// Within one batch the last write wins on duplicate ids. Callers
    /// must have resolved placeholder ids first; committed ids are
    /// strictly positive.
    pub async fn apply(&self, batch: Vec<Node>) -> u64 {
        let mut inner = self.inner.write().await;
        for node in batch {
            debug_assert!(node.is_committed(), "apply called with unresolved id {}", node.id);
            inner.nodes.insert(node.id, node);
        }
        inner.version += 1;
        let version = inner.version;
        // Published while the write lock is held, so no waiter can
        // observe the version before the nodes that produced it.
        self.version_tx.send_replace(version);
        version
    }

    /// Suspend until `version() >= min_version`; returns immediately
    /// when already satisfied.
    ///
    /// Dropping the returned future (client disconnect) releases the
    /// waiter registration.
    pub async fn wait_for(&self, min_version: u64) {
        let mut rx = self.version_tx.subscribe();
        // wait_for checks the current value before suspending.
        let _ = rx.wait_for(|v| *v >= min_version).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::time::{timeout, Duration};

    fn node(id: i64, text: &str) -> Node {
        Node {
            id,
            x: 0.0,
            y: 0.0,
            width: 1.0,
            height: 1.0,
            text: text.to_string(),
            kind: None,
        }
    }

    #[tokio::test]
    async fn test_starts_at_version_zero() {
        let graph = GraphState::new(vec![node(1, "a")]);
        assert_eq!(graph.version().await, 0);
        assert_eq!(graph.node_count().await, 1);
    }

    #[tokio::test]
    async fn test_version_counts_batches_not_nodes() {
        let graph = GraphState::new(Vec::new());
        assert_eq!(graph.apply(vec![node(1, "a"), node(2, "b")]).await, 1);
        assert_eq!(graph.apply(vec![node(3, "c")]).await, 2);
        // Degenerate empty batch still bumps the version.
        assert_eq!(graph.apply(Vec::new()).await, 3);
        assert_eq!(graph.version().await, 3);
        assert_eq!(graph.node_count().await, 3);
    }

    #[tokio::test]
    async fn test_apply_overwrites_whole_node() {
        let graph = GraphState::new(vec![node(1, "old")]);
        graph.apply(vec![node(1, "new")]).await;

        let nodes = graph.snapshot().await;
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].text, "new");
    }

    #[tokio::test]
    async fn test_last_write_wins_within_batch() {
        let graph = GraphState::new(Vec::new());
        graph.apply(vec![node(1, "first"), node(1, "second")]).await;

        let nodes = graph.snapshot().await;
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].text, "second");
    }

    #[tokio::test]
    async fn test_wait_for_satisfied_returns_immediately() {
        let graph = GraphState::new(Vec::new());
        graph.apply(Vec::new()).await;

        // Threshold already crossed — must not suspend.
        timeout(Duration::from_millis(100), graph.wait_for(1))
            .await
            .expect("wait_for should return immediately");
    }

    #[tokio::test]
    async fn test_wait_for_blocks_until_apply() {
        let graph = Arc::new(GraphState::new(Vec::new()));

        let waiter = {
            let graph = graph.clone();
            tokio::spawn(async move {
                graph.wait_for(1).await;
                graph.version().await
            })
        };

        // Give the waiter a chance to register before the update.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        graph.apply(vec![node(1, "a")]).await;
        let seen = timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should wake")
            .unwrap();
        assert_eq!(seen, 1);
    }

    #[tokio::test]
    async fn test_single_apply_wakes_all_waiters() {
        let graph = Arc::new(GraphState::new(Vec::new()));

        let waiters: Vec<_> = (0..8)
            .map(|_| {
                let graph = graph.clone();
                tokio::spawn(async move {
                    graph.wait_for(1).await;
                    graph.snapshot_with_version().await
                })
            })
            .collect();

        tokio::time::sleep(Duration::from_millis(20)).await;
        graph.apply(vec![node(1, "a")]).await;

        for waiter in waiters {
            let (version, nodes) = timeout(Duration::from_secs(1), waiter)
                .await
                .expect("every pending waiter must wake")
                .unwrap();
            assert_eq!(version, 1);
            assert_eq!(nodes.len(), 1);
            assert_eq!(nodes[0].text, "a");
        }
    }

    #[tokio::test]
    async fn test_no_spurious_wake_below_threshold() {
        let graph = Arc::new(GraphState::new(Vec::new()));

        let waiter = {
            let graph = graph.clone();
            tokio::spawn(async move { graph.wait_for(3).await })
        };

        graph.apply(Vec::new()).await; // version 1
        graph.apply(Vec::new()).await; // version 2
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished(), "woken before threshold");

        graph.apply(Vec::new()).await; // version 3
        timeout(Duration::from_secs(1), waiter)
            .await
            .expect("threshold crossed")
            .unwrap();
    }

    #[tokio::test]
    async fn test_waiter_registered_between_rapid_applies() {
        // A waiter subscribing after version v but waiting for v+1
        // must still catch an apply that lands immediately after.
        let graph = Arc::new(GraphState::new(Vec::new()));
        graph.apply(Vec::new()).await; // version 1

        let waiter = {
            let graph = graph.clone();
            tokio::spawn(async move { graph.wait_for(2).await })
        };
        graph.apply(Vec::new()).await; // version 2, possibly before the waiter polls

        timeout(Duration::from_secs(1), waiter)
            .await
            .expect("wake-up must not be lost")
            .unwrap();
    }
}
