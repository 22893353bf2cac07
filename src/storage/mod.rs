//! Storage Module
//!
//! Snapshot files and the per-database persistence manager.
//!
//! ## Responsibilities
//! - Write a flat dump of every must-persist node (parents first)
//! - Load a snapshot back into an empty tree
//! - Replay the operation log on top of the snapshot
//! - Rotate the log once a snapshot has captured its contents

mod manager;
mod replay;
pub mod snapshot;

pub use manager::{Persistence, RecoveryReport};
pub use replay::{apply_operation, load_snapshot, replay_log, ReplayStats, Replayable};
pub use snapshot::{Snapshot, SnapshotBuilder, SnapshotReader, SnapshotRecord};
