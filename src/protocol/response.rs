//! Response definitions
//!
//! Represents responses to clients.

use serde_json::Value;

use crate::error::MemdbError;

/// Error member of a failed response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorObject {
    pub code: i64,
    pub message: String,
}

/// A response to send to a client
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// Echo of the request id; `None` when the request had no usable id
    pub id: Option<u64>,

    /// `Ok(result)` or `Err(error)`
    pub outcome: Result<Value, ErrorObject>,
}

impl Response {
    /// Create a successful response
    pub fn ok(id: Option<u64>, result: Value) -> Self {
        Self {
            id,
            outcome: Ok(result),
        }
    }

    /// Create an error response carrying the error's stable code
    pub fn error(id: Option<u64>, error: &MemdbError) -> Self {
        Self {
            id,
            outcome: Err(ErrorObject {
                code: error.code(),
                message: error.to_string(),
            }),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }

    /// The result object, if successful
    pub fn result(&self) -> Option<&Value> {
        self.outcome.as_ref().ok()
    }

    /// The error code, if failed
    pub fn error_code(&self) -> Option<i64> {
        self.outcome.as_ref().err().map(|e| e.code)
    }
}
