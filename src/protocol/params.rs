//! Named parameter access
//!
//! Every missing or mistyped parameter becomes `InvalidParams` naming it.

use serde_json::{Map, Value};

use crate::error::{MemdbError, Result};
use crate::store::{AttrType, NodeType, SnapshotFlag};

/// Read-only view of a request's `params` object
pub struct Params<'a>(pub &'a Map<String, Value>);

impl<'a> Params<'a> {
    pub fn has(&self, name: &str) -> bool {
        self.0.get(name).map_or(false, |v| !v.is_null())
    }

    /// Required unsigned integer
    pub fn u64(&self, name: &str) -> Result<u64> {
        self.opt_u64(name)?.ok_or_else(|| missing(name))
    }

    /// Optional unsigned integer
    pub fn opt_u64(&self, name: &str) -> Result<Option<u64>> {
        match self.0.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(v) => v.as_u64().map(Some).ok_or_else(|| mistyped(name, "an unsigned integer")),
        }
    }

    /// Required string
    pub fn str(&self, name: &str) -> Result<&'a str> {
        self.opt_str(name)?.ok_or_else(|| missing(name))
    }

    pub fn opt_str(&self, name: &str) -> Result<Option<&'a str>> {
        match self.0.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(v) => v.as_str().map(Some).ok_or_else(|| mistyped(name, "a string")),
        }
    }

    /// Node type given by catalog name (`"BMC"`, `"DRAWER"`, ...)
    pub fn node_type(&self, name: &str) -> Result<NodeType> {
        self.str(name)?
            .parse()
            .map_err(|e: MemdbError| MemdbError::InvalidParams(format!("{}: {}", name, e)))
    }

    /// Snapshot flag as 0/1/2, absent means "not needed"
    pub fn snapshot_flag(&self, name: &str) -> Result<SnapshotFlag> {
        match self.opt_u64(name)? {
            None => Ok(SnapshotFlag::NotNeeded),
            Some(v) => u8::try_from(v)
                .map_err(|_| mistyped(name, "0, 1 or 2"))
                .and_then(SnapshotFlag::from_u8),
        }
    }

    /// Attribute type hint, absent means string
    pub fn attr_type(&self, name: &str) -> Result<AttrType> {
        match self.opt_str(name)? {
            None => Ok(AttrType::String),
            Some(s) => s.parse(),
        }
    }

    /// Payload given as a string or as an array of bytes
    pub fn data(&self, name: &str) -> Result<Vec<u8>> {
        match self.0.get(name) {
            None | Some(Value::Null) => Err(missing(name)),
            Some(Value::String(s)) => Ok(s.as_bytes().to_vec()),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_u64()
                        .and_then(|b| u8::try_from(b).ok())
                        .ok_or_else(|| mistyped(name, "a string or an array of bytes"))
                })
                .collect(),
            Some(_) => Err(mistyped(name, "a string or an array of bytes")),
        }
    }
}

/// Render a payload: UTF-8 text as a string, anything else as a byte array
pub fn data_to_value(data: &[u8]) -> Value {
    match std::str::from_utf8(data) {
        Ok(s) => Value::String(s.to_string()),
        Err(_) => Value::Array(data.iter().map(|b| Value::from(*b)).collect()),
    }
}

fn missing(name: &str) -> MemdbError {
    MemdbError::InvalidParams(format!("missing parameter '{}'", name))
}

fn mistyped(name: &str, expected: &str) -> MemdbError {
    MemdbError::InvalidParams(format!("parameter '{}' must be {}", name, expected))
}
