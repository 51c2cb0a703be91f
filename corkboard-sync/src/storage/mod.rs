//! Durable persistence for board nodes.
//!
//! The store is the write-behind backup of the in-memory graph state
//! and the sole authority for permanent node identifiers: rowids are
//! assigned here at first persistence and never reused.

pub mod sqlite;

pub use sqlite::{NodeStore, StoreError};
