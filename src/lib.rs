//! # memdb
//!
//! An embedded, single-process, in-memory hierarchical database with:
//! - A tree of typed nodes, each owning named attributes
//! - An append-only operation log plus periodic snapshots for recovery
//! - An advisory lock that serializes multi-step client transactions
//! - Change notifications for subscribed clients
//! - Two independent databases ("primary" and "pod") behind one engine
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      UDP Server                              │
//! │               (one request per datagram)                     │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │              Scheduler (lock + pending queue)                │
//! │                  → Command Dispatcher                        │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │  "primary"  │          │    "pod"    │
//!   │  Database   │          │  Database   │
//!   └──────┬──────┘          └──────┬──────┘
//!          │  tree · log · snapshot · subscriptions
//!          ▼
//!   ┌─────────────┐   ┌─────────────┐   ┌─────────────┐
//!   │  Node Tree  │   │ Operation   │   │  Snapshot   │
//!   │  (arena)    │   │ Log (append)│   │  (flat)     │
//!   └─────────────┘   └─────────────┘   └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;

pub mod database;
pub mod engine;
pub mod event;
pub mod network;
pub mod protocol;
pub mod scheduler;
pub mod storage;
pub mod store;
pub mod wal;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use config::{Config, RecoveryMode};
pub use database::{DatabaseInstance, DbName};
pub use engine::{Engine, Reply};
pub use error::{MemdbError, Result};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of memdb
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
