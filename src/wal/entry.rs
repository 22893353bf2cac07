//! Log record definitions
//!
//! Defines the structure of individual operation-log records and their
//! one-line text encoding.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{MemdbError, Result};
use crate::store::{AttrType, NodeId, NodeType, SnapshotFlag};

/// Action code written in clear text on every log line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LogAction {
    CreateNode = 1,
    DestroyNode = 2,
    SetAttribute = 3,
    RemoveAttribute = 4,
}

impl LogAction {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(LogAction::CreateNode),
            2 => Some(LogAction::DestroyNode),
            3 => Some(LogAction::SetAttribute),
            4 => Some(LogAction::RemoveAttribute),
            _ => None,
        }
    }
}

/// Mutations that can be logged
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogOperation {
    CreateNode {
        parent: NodeId,
        node_id: NodeId,
        node_type: NodeType,
        snapshot_flag: SnapshotFlag,
    },

    DestroyNode {
        node_id: NodeId,
    },

    SetAttribute {
        node_id: NodeId,
        cookie: u64,
        attr_type: AttrType,
        snapshot_flag: SnapshotFlag,
        name: String,
        data: Vec<u8>,
    },

    RemoveAttribute {
        node_id: NodeId,
        name: String,
    },
}

impl LogOperation {
    pub fn action(&self) -> LogAction {
        match self {
            LogOperation::CreateNode { .. } => LogAction::CreateNode,
            LogOperation::DestroyNode { .. } => LogAction::DestroyNode,
            LogOperation::SetAttribute { .. } => LogAction::SetAttribute,
            LogOperation::RemoveAttribute { .. } => LogAction::RemoveAttribute,
        }
    }

    /// The node the operation is about
    pub fn node_id(&self) -> NodeId {
        match self {
            LogOperation::CreateNode { node_id, .. }
            | LogOperation::DestroyNode { node_id }
            | LogOperation::SetAttribute { node_id, .. }
            | LogOperation::RemoveAttribute { node_id, .. } => *node_id,
        }
    }
}

/// A single record in the operation log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Monotonically increasing within one log file
    pub seq: u64,

    /// The mutation to re-apply
    pub operation: LogOperation,
}

impl LogRecord {
    pub fn new(seq: u64, operation: LogOperation) -> Self {
        Self { seq, operation }
    }

    /// Encode as one text line (newline included)
    ///
    /// Format: `<rfc3339 timestamp> <action> <crc32 hex> <hex(bincode(record))>`
    pub fn encode_line(&self, timestamp: DateTime<Utc>) -> Result<String> {
        let body = bincode::serialize(self)?;
        let crc = crc32fast::hash(&body);

        Ok(format!(
            "{} {} {:08x} {}\n",
            timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            self.operation.action() as u8,
            crc,
            hex::encode(body)
        ))
    }

    /// Decode one line (without its trailing newline)
    pub fn decode_line(line: &str) -> Result<Self> {
        let mut fields = line.splitn(4, ' ');
        let (Some(ts), Some(action), Some(crc), Some(body)) =
            (fields.next(), fields.next(), fields.next(), fields.next())
        else {
            return Err(MemdbError::LogCorruption(format!(
                "expected 4 fields in log line: {:?}",
                line
            )));
        };

        DateTime::parse_from_rfc3339(ts)
            .map_err(|e| MemdbError::LogCorruption(format!("bad timestamp {:?}: {}", ts, e)))?;

        let action = action
            .parse::<u8>()
            .ok()
            .and_then(LogAction::from_code)
            .ok_or_else(|| MemdbError::LogCorruption(format!("bad action code {:?}", action)))?;

        let expected_crc = u32::from_str_radix(crc, 16)
            .map_err(|_| MemdbError::LogCorruption(format!("bad checksum field {:?}", crc)))?;

        let body = hex::decode(body.trim_end())
            .map_err(|e| MemdbError::LogCorruption(format!("bad record body: {}", e)))?;

        let actual_crc = crc32fast::hash(&body);
        if actual_crc != expected_crc {
            return Err(MemdbError::LogCorruption(format!(
                "checksum mismatch: expected {:08x}, got {:08x}",
                expected_crc, actual_crc
            )));
        }

        let record: LogRecord = bincode::deserialize(&body)?;
        if record.operation.action() != action {
            return Err(MemdbError::LogCorruption(format!(
                "action code {:?} does not match record {:?}",
                action,
                record.operation.action()
            )));
        }

        Ok(record)
    }
}
