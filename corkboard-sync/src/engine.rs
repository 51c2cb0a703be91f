//! Engine lifecycle: startup seeding, the autosave loop, shutdown.
//!
//! ```text
//! start ──► load_all() ──► GraphState (version 0)
//!                │
//!                └──► autosave task: every period,
//!                     save_all(snapshot()) — failures are logged
//!                     and retried next cycle
//!
//! shutdown ──► stop autosave ──► one final save_all
//! ```
//!
//! Updates accepted after the last successful save are lost on abnormal
//! termination; in-memory state stays authoritative either way.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::graph::GraphState;
use crate::session::SessionRegistry;
use crate::storage::{NodeStore, StoreError};

/// The assembled sync engine: authoritative graph state, session
/// registry, durable store, and the running autosave task.
///
/// Constructed once at process startup and handed to the server by
/// reference — there is no global instance.
pub struct SyncEngine {
    graph: Arc<GraphState>,
    sessions: Arc<SessionRegistry>,
    store: Arc<NodeStore>,
    autosave: Mutex<Option<JoinHandle<()>>>,
    shutdown_tx: watch::Sender<bool>,
}

impl SyncEngine {
    /// Seed graph state from the store and start the autosave loop.
    pub fn start(store: Arc<NodeStore>, autosave_period: Duration) -> Result<Arc<Self>, StoreError> {
        let nodes = store.load_all()?;
        log::info!("engine start: {} nodes loaded", nodes.len());

        let graph = Arc::new(GraphState::new(nodes));
        let sessions = Arc::new(SessionRegistry::new(store.clone()));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let autosave = spawn_autosave(graph.clone(), store.clone(), autosave_period, shutdown_rx);

        Ok(Arc::new(Self {
            graph,
            sessions,
            store,
            autosave: Mutex::new(Some(autosave)),
            shutdown_tx,
        }))
    }

    pub fn graph(&self) -> &Arc<GraphState> {
        &self.graph
    }

    pub fn sessions(&self) -> &Arc<SessionRegistry> {
        &self.sessions
    }

    pub fn store(&self) -> &Arc<NodeStore> {
        &self.store
    }

    /// Stop the autosave task and perform one final save, so the last
    /// accepted update is durable before a clean exit.
    pub async fn shutdown(&self) -> Result<(), StoreError> {
        let _ = self.shutdown_tx.send(true);
        let handle = self.autosave.lock().map_err(|_| StoreError::Poisoned)?.take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }

        let nodes = self.graph.snapshot().await;
        self.store.save_all(&nodes)?;
        log::info!("engine shutdown: {} nodes persisted", nodes.len());
        Ok(())
    }
}

/// Flush the graph to the store on a fixed period until shutdown.
fn spawn_autosave(
    graph: Arc<GraphState>,
    store: Arc<NodeStore>,
    period: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; skip it so the loop
        // waits a full period before the first flush.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let nodes = graph.snapshot().await;
                    match store.save_all(&nodes) {
                        Ok(()) => log::trace!("autosave: {} nodes", nodes.len()),
                        Err(err) => {
                            // In-memory state stays authoritative; the
                            // next cycle retries.
                            log::error!("autosave failed (will retry): {err}");
                        }
                    }
                }
                _ = shutdown_rx.changed() => break,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Node;

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
    async fn test_start_seeds_graph_from_store() {
        let store = Arc::new(NodeStore::open_in_memory().unwrap());
        store.save_all(&[node(1, "a"), node(2, "b")]).unwrap();

        let engine = SyncEngine::start(store, Duration::from_secs(3600)).unwrap();
        assert_eq!(engine.graph().node_count().await, 2);
        assert_eq!(engine.graph().version().await, 0);
        engine.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_autosave_flushes_periodically() {
        let store = Arc::new(NodeStore::open_in_memory().unwrap());
        let engine = SyncEngine::start(store.clone(), Duration::from_millis(20)).unwrap();

        engine.graph().apply(vec![node(1, "live")]).await;
        tokio::time::sleep(Duration::from_millis(80)).await;

        let persisted = store.load_all().unwrap();
        assert_eq!(persisted.len(), 1);
        assert_eq!(persisted[0].text, "live");
        engine.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_autosave_survives_failing_save() {
        let store = Arc::new(NodeStore::open_in_memory().unwrap());
        let engine = SyncEngine::start(store.clone(), Duration::from_millis(20)).unwrap();

        // Over-long text violates the store's CHECK, so every save of
        // this snapshot fails.
        engine.graph().apply(vec![node(1, &"x".repeat(2000))]).await;
        tokio::time::sleep(Duration::from_millis(60)).await;

        // The task is still alive and recovers once the state is valid.
        engine.graph().apply(vec![node(1, "short again")]).await;
        tokio::time::sleep(Duration::from_millis(60)).await;

        let persisted = store.load_all().unwrap();
        assert_eq!(persisted.len(), 1);
        assert_eq!(persisted[0].text, "short again");
        engine.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_persists_final_state() {
        let store = Arc::new(NodeStore::open_in_memory().unwrap());
        // Period far in the future: only the shutdown save can flush.
        let engine = SyncEngine::start(store.clone(), Duration::from_secs(3600)).unwrap();

        engine.graph().apply(vec![node(3, "last words")]).await;
        engine.shutdown().await.unwrap();

        let persisted = store.load_all().unwrap();
        assert_eq!(persisted.len(), 1);
        assert_eq!(persisted[0].text, "last words");
    }
}
