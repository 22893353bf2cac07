//! Snapshot Module
//!
//! Flat dump of every must-persist node, used to bound log replay time.
//!
//! ## File Format
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ Header (14 bytes)                                            │
//! │   Magic: "MDBS" (4) | Version: u16 (2) | RecordCount: u64 (8)│
//! ├──────────────────────────────────────────────────────────────┤
//! │ Record Block (variable), parents before children             │
//! │   [ParentId: u64][NodeId: u64][Type: u32][Flag: u8]          │
//! │   [AttrCount: u32]                                           │
//! │   per attribute:                                             │
//! │     [Cookie: u64][Flag: u8][NameLen: u16][DataLen: u32]      │
//! │     [Type: u8][Name][Data]                                   │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Footer (4 bytes)                                             │
//! │   CRC: u32 over header and record block                      │
//! └──────────────────────────────────────────────────────────────┘
//! ```

mod builder;
mod reader;

pub use builder::SnapshotBuilder;
pub use reader::SnapshotReader;

use std::path::PathBuf;

use crate::store::{AttrType, NodeId, NodeTree, NodeType, SnapshotFlag};

// =============================================================================
// Shared Constants (used by builder and reader)
// =============================================================================

/// Magic bytes identifying a memdb snapshot file
pub(crate) const MAGIC: &[u8; 4] = b"MDBS";

/// Current snapshot format version
pub(crate) const VERSION: u16 = 1;

/// Header size: Magic (4) + Version (2) + RecordCount (8) = 14 bytes
pub(crate) const HEADER_SIZE: u64 = 14;

/// Footer size: CRC (4)
pub(crate) const FOOTER_SIZE: u64 = 4;

/// Smallest encoded node record: ids, type, flag and attr count
pub(crate) const MIN_RECORD_SIZE: u64 = 8 + 8 + 4 + 1 + 4;

/// One node and its persisted attributes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotRecord {
    pub parent_id: NodeId,
    pub node_id: NodeId,
    pub node_type: NodeType,
    pub snapshot_flag: SnapshotFlag,
    pub attrs: Vec<SnapshotAttr>,
}

/// A persisted attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotAttr {
    pub cookie: u64,
    pub snapshot_flag: SnapshotFlag,
    pub attr_type: AttrType,
    pub name: String,
    pub data: Vec<u8>,
}

/// Metadata about a written snapshot
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub path: PathBuf,
    pub record_count: u64,
    pub attr_count: u64,
    pub file_size: u64,
}

/// Collect the must-persist subset of a tree, parents first
pub fn collect_records(tree: &NodeTree) -> Vec<SnapshotRecord> {
    tree.preorder()
        .into_iter()
        .filter(|(_, node)| node.snapshot_flag.is_persistent())
        .map(|(_, node)| SnapshotRecord {
            parent_id: node.parent.unwrap_or(node.id),
            node_id: node.id,
            node_type: node.node_type,
            snapshot_flag: node.snapshot_flag,
            attrs: node
                .attrs
                .iter()
                .filter(|a| node.persists_attribute(a))
                .map(|a| SnapshotAttr {
                    cookie: a.cookie,
                    snapshot_flag: a.snapshot_flag,
                    attr_type: a.attr_type,
                    name: a.name.clone(),
                    data: a.data.clone(),
                })
                .collect(),
        })
        .collect()
}
