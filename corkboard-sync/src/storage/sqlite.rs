//! SQLite-backed node store.
//!
//! One row per node, keyed by the `AUTOINCREMENT` rowid so permanent
//! identifiers are strictly positive and never reused. The text column
//! carries the 1024-character bound as a schema CHECK — length
//! enforcement is the store's concern, not the engine's.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection};

use crate::node::Node;

/// Storage errors.
#[derive(Debug)]
pub enum StoreError {
    /// SQLite internal error
    Sql(rusqlite::Error),
    /// Connection mutex poisoned by a panicking thread
    Poisoned,
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sql(err) => write!(f, "sqlite: {err}"),
            Self::Poisoned => write!(f, "store connection poisoned"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sql(value)
    }
}

/// SQLite-backed durable store for board nodes.
///
/// The connection sits behind a mutex (`rusqlite::Connection` is not
/// `Sync`); every operation is a short synchronous critical section.
pub struct NodeStore {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl NodeStore {
    /// Open (or create) the store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(&path)?;
        Self::migrate(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: Some(path),
        })
    }

    /// Open a private in-memory store (tests).
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::migrate(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: None,
        })
    }

    /// The database path, if file-backed.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn migrate(conn: &Connection) -> Result<(), StoreError> {
        conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;

            CREATE TABLE IF NOT EXISTS nodes (
              id     INTEGER PRIMARY KEY AUTOINCREMENT,
              x      REAL NOT NULL,
              y      REAL NOT NULL,
              width  REAL NOT NULL,
              height REAL NOT NULL,
              text   TEXT NOT NULL CHECK (length(text) <= 1024),
              kind   TEXT
            );
            "#,
        )?;
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Load every persisted node. Called once at startup to seed the
    /// graph state.
    pub fn load_all(&self) -> Result<Vec<Node>, StoreError> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT id, x, y, width, height, text, kind FROM nodes ORDER BY id")?;
        let rows = stmt.query_map([], |row| {
            Ok(Node {
                id: row.get(0)?,
                x: row.get(1)?,
                y: row.get(2)?,
                width: row.get(3)?,
                height: row.get(4)?,
                text: row.get(5)?,
                kind: row.get(6)?,
            })
        })?;

        let mut nodes = Vec::new();
        for row in rows {
            nodes.push(row?);
        }
        Ok(nodes)
    }

    /// Persist a brand-new node row and return the assigned permanent
    /// identifier. The node's own (placeholder) id is ignored.
    pub fn assign_id(&self, node: &Node) -> Result<i64, StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO nodes (x, y, width, height, text, kind) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![node.x, node.y, node.width, node.height, node.text, node.kind],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Upsert every given node by identifier in one transaction.
    /// Idempotent: repeated saves of unchanged nodes are harmless.
    pub fn save_all(&self, nodes: &[Node]) -> Result<(), StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO nodes (id, x, y, width, height, text, kind)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(id) DO UPDATE SET
                   x = excluded.x,
                   y = excluded.y,
                   width = excluded.width,
                   height = excluded.height,
                   text = excluded.text,
                   kind = excluded.kind",
            )?;
            for node in nodes {
                stmt.execute(params![
                    node.id,
                    node.x,
                    node.y,
                    node.width,
                    node.height,
                    node.text,
                    node.kind
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Number of persisted nodes.
    pub fn count(&self) -> Result<u64, StoreError> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM nodes", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}
