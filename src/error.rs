//! Error types for memdb
//!
//! Provides a unified error type for all operations, plus the stable
//! numeric codes carried by error responses on the wire.

use thiserror::Error;

use crate::store::NodeId;

/// Result type alias using MemdbError
pub type Result<T> = std::result::Result<T, MemdbError>;

// =============================================================================
// Wire Error Codes
// =============================================================================

/// Request is not valid JSON
pub const CODE_PARSE_ERROR: i64 = -32700;
/// Envelope (id/method/params) is malformed
pub const CODE_INVALID_REQUEST: i64 = -32600;
/// Unknown method
pub const CODE_METHOD_NOT_FOUND: i64 = -32601;
/// Missing or mistyped named parameter
pub const CODE_INVALID_PARAMS: i64 = -32602;
/// Anything that is not the caller's fault
pub const CODE_INTERNAL_ERROR: i64 = -32603;
/// Lock reservation expired or unknown
pub const CODE_LOCK_TIMEOUT: i64 = -32000;
/// Node does not exist
pub const CODE_NODE_NOT_FOUND: i64 = -32001;
/// Attribute does not exist on the node
pub const CODE_ATTR_NOT_FOUND: i64 = -32002;
/// Allocation failure
pub const CODE_MALLOC_FAILURE: i64 = -32003;
/// Handler refused the operation
pub const CODE_HANDLE_ERROR: i64 = -32004;

/// Unified error type for memdb operations
#[derive(Debug, Error)]
pub enum MemdbError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Persistence Errors
    // -------------------------------------------------------------------------
    #[error("Log corruption detected: {0}")]
    LogCorruption(String),

    #[error("Snapshot corruption detected: {0}")]
    SnapshotCorruption(String),

    #[error("Recovery failed: {0}")]
    Recovery(String),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Protocol Errors
    // -------------------------------------------------------------------------
    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Method not found: {0}")]
    MethodNotFound(String),

    #[error("Invalid params: {0}")]
    InvalidParams(String),

    // -------------------------------------------------------------------------
    // Domain Errors
    // -------------------------------------------------------------------------
    #[error("Node {0} not found")]
    NodeNotFound(NodeId),

    #[error("Attribute '{name}' not found on node {node_id}")]
    AttributeNotFound { node_id: NodeId, name: String },

    #[error("Lock timeout: {0}")]
    LockTimeout(String),

    #[error("Lock id {given} does not hold the lock")]
    LockMismatch { given: u64 },

    #[error("Allocation failure: {0}")]
    MallocFailure(String),

    #[error("Handle error: {0}")]
    HandleError(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl MemdbError {
    /// Stable numeric code for the error response envelope
    pub fn code(&self) -> i64 {
        match self {
            MemdbError::ParseError(_) => CODE_PARSE_ERROR,
            MemdbError::InvalidRequest(_) => CODE_INVALID_REQUEST,
            MemdbError::MethodNotFound(_) => CODE_METHOD_NOT_FOUND,
            MemdbError::InvalidParams(_) => CODE_INVALID_PARAMS,
            MemdbError::LockTimeout(_) => CODE_LOCK_TIMEOUT,
            MemdbError::NodeNotFound(_) => CODE_NODE_NOT_FOUND,
            MemdbError::AttributeNotFound { .. } => CODE_ATTR_NOT_FOUND,
            MemdbError::MallocFailure(_) => CODE_MALLOC_FAILURE,
            MemdbError::HandleError(_) | MemdbError::LockMismatch { .. } => CODE_HANDLE_ERROR,
            MemdbError::Io(_)
            | MemdbError::LogCorruption(_)
            | MemdbError::SnapshotCorruption(_)
            | MemdbError::Recovery(_)
            | MemdbError::Serialization(_)
            | MemdbError::Config(_) => CODE_INTERNAL_ERROR,
        }
    }

    /// True for errors a client caused by sending a bad request
    pub fn is_protocol_error(&self) -> bool {
        matches!(
            self,
            MemdbError::ParseError(_)
                | MemdbError::InvalidRequest(_)
                | MemdbError::MethodNotFound(_)
                | MemdbError::InvalidParams(_)
        )
    }
}

impl From<bincode::Error> for MemdbError {
    fn from(e: bincode::Error) -> Self {
        MemdbError::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for MemdbError {
    fn from(e: serde_json::Error) -> Self {
        MemdbError::Serialization(e.to_string())
    }
}
