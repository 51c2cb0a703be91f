//! The node entity — one positioned, sized, text-bearing board element.

use serde::{Deserialize, Serialize};

/// Tag reported on the wire when a node carries no explicit kind.
pub const DEFAULT_KIND: &str = "source";

/// A single board node.
///
/// `id` is assigned by the durable store at first persistence and is
/// strictly positive once committed. Clients creating nodes offline
/// use negative placeholder ids until the server hands out a real one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: i64,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// Display text, at most 1024 characters (enforced by the store schema).
    pub text: String,
    /// Optional classification tag ("Fact", "Deduction", "Opinion", ...).
    pub kind: Option<String>,
}

impl Node {
    /// The kind tag as reported on the wire (`"source"` when untagged).
    pub fn kind_or_default(&self) -> &str {
        self.kind.as_deref().unwrap_or(DEFAULT_KIND)
    }

    /// True once the node has a server-assigned identifier.
    pub fn is_committed(&self) -> bool {
        self.id > 0
    }
}
