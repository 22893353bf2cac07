//! Store Module
//!
//! The in-memory node/attribute tree of one database.
//!
//! ## Data Structure Choice
//! Nodes live in an arena keyed by `NodeId`; each node stores its parent
//! id and the ids of its children rather than references. Destroying a
//! node removes every id reachable through child edges.
//!
//! ```text
//!   0 (root) ──┬── 10000000 (RACK) ──── 10000002 (DRAWER)
//!              └── 10000001 (BMC)
//! ```
//!
//! ## Persistence Flags
//! A node is must-persist whenever any descendant node or attribute is.
//! Marking propagates from the changed entity up to the root.

mod node_type;
mod tree;

pub use node_type::NodeType;
pub use tree::{
    AttrChange, Attribute, CreateOutcome, DestroyedNode, Node, NodeTree, RemovedAttribute,
};

use serde::{Deserialize, Serialize};

use crate::error::{MemdbError, Result};

/// Unique node handle within one database
pub type NodeId = u64;

/// The reserved root id
pub const ROOT_NODE_ID: NodeId = 0;

/// First id handed out by the allocator (ids below are reserved)
pub const NODE_ID_SEED: NodeId = 10_000_000;

/// Per-node / per-attribute persistence marker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum SnapshotFlag {
    /// Lives only in memory
    NotNeeded = 0,

    /// Must survive a restart
    Needed = 1,

    /// Must survive a restart together with every attribute it owns
    ForceAll = 2,
}

impl SnapshotFlag {
    /// True for `Needed` and `ForceAll`
    pub fn is_persistent(self) -> bool {
        !matches!(self, SnapshotFlag::NotNeeded)
    }

    /// Flags only ever get stronger
    pub fn merge(self, other: SnapshotFlag) -> SnapshotFlag {
        if (other as u8) > (self as u8) {
            other
        } else {
            self
        }
    }

    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            0 => Ok(SnapshotFlag::NotNeeded),
            1 => Ok(SnapshotFlag::Needed),
            2 => Ok(SnapshotFlag::ForceAll),
            other => Err(MemdbError::InvalidParams(format!(
                "invalid snapshot flag {}",
                other
            ))),
        }
    }
}

/// Formatting hint for attribute payloads (advisory only)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum AttrType {
    Char = 0,
    Short = 1,
    Int = 2,
    String = 3,
    Raw = 4,
}

impl AttrType {
    pub fn as_str(self) -> &'static str {
        match self {
            AttrType::Char => "char",
            AttrType::Short => "short",
            AttrType::Int => "int",
            AttrType::String => "string",
            AttrType::Raw => "raw",
        }
    }

    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            0 => Ok(AttrType::Char),
            1 => Ok(AttrType::Short),
            2 => Ok(AttrType::Int),
            3 => Ok(AttrType::String),
            4 => Ok(AttrType::Raw),
            other => Err(MemdbError::InvalidParams(format!(
                "invalid attribute type {}",
                other
            ))),
        }
    }
}

impl std::str::FromStr for AttrType {
    type Err = MemdbError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "char" => Ok(AttrType::Char),
            "short" => Ok(AttrType::Short),
            "int" => Ok(AttrType::Int),
            "string" => Ok(AttrType::String),
            "raw" => Ok(AttrType::Raw),
            other => Err(MemdbError::InvalidParams(format!(
                "unknown attribute type '{}'",
                other
            ))),
        }
    }
}

/// Summary of a node returned by listing operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeInfo {
    pub parent: NodeId,
    pub node_id: NodeId,
    pub node_type: NodeType,
}

/// Summary of an attribute returned by listing operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttrInfo {
    pub node_id: NodeId,
    pub cookie: u64,
    pub name: String,
    pub data: Vec<u8>,
    pub attr_type: AttrType,
}
