//! Replay
//!
//! Rebuilds a tree from snapshot records and log records. Replay never
//! writes to the log and never produces notifications.

use crate::config::RecoveryMode;
use crate::error::{MemdbError, Result};
use crate::store::{NodeTree, ROOT_NODE_ID};
use crate::wal::{LogOperation, LogRecord};

use super::SnapshotRecord;

/// Counters collected while replaying one log
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReplayStats {
    /// Records applied on first attempt
    pub applied: u64,

    /// Records dropped because they referenced a missing node
    pub skipped: u64,

    /// Deferred records that applied on a later pass (Retry mode)
    pub deferred_resolved: u64,

    /// Deferred records that never applied (Retry mode)
    pub abandoned: u64,

    /// Replay stopped at the first unresolvable record (Truncate mode)
    pub halted: bool,
}

impl ReplayStats {
    /// Records that changed the tree
    pub fn total_applied(&self) -> u64 {
        self.applied + self.deferred_resolved
    }
}

/// Something that can be re-applied to a tree during start-up
pub trait Replayable {
    /// Position used in warnings (log sequence number or snapshot index)
    fn position(&self) -> u64;

    /// Apply to the tree; `NodeNotFound` means a dependency is not loaded yet
    fn apply(&self, tree: &mut NodeTree) -> Result<()>;
}

impl Replayable for LogRecord {
    fn position(&self) -> u64 {
        self.seq
    }

    fn apply(&self, tree: &mut NodeTree) -> Result<()> {
        apply_operation(tree, &self.operation)
    }
}

impl Replayable for (u64, SnapshotRecord) {
    fn position(&self) -> u64 {
        self.0
    }

    fn apply(&self, tree: &mut NodeTree) -> Result<()> {
        let record = &self.1;
        let parent = if record.node_id == ROOT_NODE_ID {
            ROOT_NODE_ID
        } else {
            record.parent_id
        };

        tree.create_node_with_id(parent, record.node_id, record.node_type, record.snapshot_flag)?;
        for attr in &record.attrs {
            tree.set_attribute(
                record.node_id,
                &attr.name,
                attr.cookie,
                &attr.data,
                attr.attr_type,
                attr.snapshot_flag,
            )?;
        }
        Ok(())
    }
}

/// Load snapshot records into a tree under the given recovery mode
pub fn load_snapshot(
    tree: &mut NodeTree,
    records: Vec<SnapshotRecord>,
    mode: RecoveryMode,
) -> Result<ReplayStats> {
    let indexed = records
        .into_iter()
        .enumerate()
        .map(|(i, r)| (i as u64, r))
        .collect();
    replay(tree, indexed, mode)
}

/// Re-apply log records in order under the given recovery mode
pub fn replay_log(
    tree: &mut NodeTree,
    records: Vec<LogRecord>,
    mode: RecoveryMode,
) -> Result<ReplayStats> {
    replay(tree, records, mode)
}

/// Apply items in order
///
/// `Fatal` turns the first unresolvable item into an error; the other
/// modes keep whatever was loaded.
pub fn replay<R: Replayable>(
    tree: &mut NodeTree,
    items: Vec<R>,
    mode: RecoveryMode,
) -> Result<ReplayStats> {
    let mut stats = ReplayStats::default();
    let mut deferred = Vec::new();

    for item in items {
        match item.apply(tree) {
            Ok(()) => stats.applied += 1,
            Err(MemdbError::NodeNotFound(missing)) => match mode {
                RecoveryMode::Truncate => {
                    tracing::warn!(
                        position = item.position(),
                        node_id = missing,
                        "Stopping replay at record referencing a missing node"
                    );
                    stats.halted = true;
                    break;
                }
                RecoveryMode::Skip => {
                    tracing::warn!(
                        position = item.position(),
                        node_id = missing,
                        "Skipping record referencing a missing node"
                    );
                    stats.skipped += 1;
                }
                RecoveryMode::Retry => deferred.push(item),
                RecoveryMode::Fatal => {
                    return Err(MemdbError::Recovery(format!(
                        "record {} references missing node {}",
                        item.position(),
                        missing
                    )));
                }
            },
            Err(e) => return Err(e),
        }
    }

    // Retry deferred items until a pass makes no progress
    while !deferred.is_empty() {
        let before = deferred.len();
        let mut still_pending = Vec::new();

        for item in deferred {
            match item.apply(tree) {
                Ok(()) => stats.deferred_resolved += 1,
                Err(MemdbError::NodeNotFound(_)) => still_pending.push(item),
                Err(e) => return Err(e),
            }
        }

        if still_pending.len() == before {
            for item in &still_pending {
                tracing::warn!(position = item.position(), "Abandoning unresolvable record");
            }
            stats.abandoned = still_pending.len() as u64;
            break;
        }
        deferred = still_pending;
    }

    Ok(stats)
}

/// Apply one logged mutation
///
/// Destroying or un-setting something already gone is not an error.
pub fn apply_operation(tree: &mut NodeTree, operation: &LogOperation) -> Result<()> {
    match operation {
        LogOperation::CreateNode {
            parent,
            node_id,
            node_type,
            snapshot_flag,
        } => {
            tree.create_node_with_id(*parent, *node_id, *node_type, *snapshot_flag)?;
        }

        LogOperation::DestroyNode { node_id } => match tree.destroy_node(*node_id) {
            Ok(_) | Err(MemdbError::NodeNotFound(_)) => {}
            Err(e) => return Err(e),
        },

        LogOperation::SetAttribute {
            node_id,
            cookie,
            attr_type,
            snapshot_flag,
            name,
            data,
        } => {
            tree.set_attribute(*node_id, name, *cookie, data, *attr_type, *snapshot_flag)?;
        }

        LogOperation::RemoveAttribute { node_id, name } => {
            match tree.remove_attribute(*node_id, name) {
                Ok(_) | Err(MemdbError::NodeNotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }
    }

    Ok(())
}
