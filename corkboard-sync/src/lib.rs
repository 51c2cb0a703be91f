//! # corkboard-sync — Realtime board synchronization engine
//!
//! Synchronizes a shared, mutable graph of visual nodes across many
//! concurrently connected clients using HTTP long-polling.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   get / update      ┌──────────────┐
//! │   Client    │ ◄─────────────────► │  SyncServer  │
//! │ (per user)  │   watch (long-poll) │  (axum)      │
//! └─────────────┘                     └──────┬───────┘
//!                                            │
//!                          ┌─────────────────┼─────────────────┐
//!                          ▼                 ▼                 ▼
//!                   ┌────────────┐   ┌───────────────┐  ┌───────────┐
//!                   │ GraphState │   │SessionRegistry│  │ NodeStore │
//!                   │ (authority,│   │ (placeholder →│  │ (sqlite)  │
//!                   │  version)  │   │  permanent id)│  └─────▲─────┘
//!                   └─────┬──────┘   └───────────────┘        │
//!                         │                                   │
//!                         └──────── autosave task ────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`node`] — the board node entity
//! - [`graph`] — authoritative state, version counter, waiter wake-up
//! - [`session`] — per-session placeholder id reconciliation
//! - [`storage`] — sqlite durable store (id assignment authority)
//! - [`protocol`] — JSON wire shapes and validation
//! - [`server`] — the long-poll HTTP surface
//! - [`engine`] — lifecycle: startup seeding, autosave, shutdown
//!
//! Updates are whole-node last-write-wins overwrites; there is no
//! field-level merging. Updates accepted after the last successful
//! save are lost on abnormal termination (no write-ahead log) — the
//! autosave period bounds that window.

pub mod engine;
pub mod graph;
pub mod node;
pub mod protocol;
pub mod server;
pub mod session;
pub mod storage;

// Re-exports for convenience
pub use engine::SyncEngine;
pub use graph::GraphState;
pub use node::{Node, DEFAULT_KIND};
pub use protocol::{ProtocolError, GRAPH_ID, SESSION_HEADER};
pub use server::{ServerConfig, ServerStats, SyncServer};
pub use session::SessionRegistry;
pub use storage::{NodeStore, StoreError};
