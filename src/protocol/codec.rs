//! Protocol codec
//!
//! Encoding and decoding functions for the wire protocol. One JSON object
//! per datagram in each direction.

use serde_json::{json, Value};

use crate::error::{MemdbError, Result};

use super::{Envelope, ErrorObject, Request, Response};

/// A request that could not be decoded, with whatever id was readable
#[derive(Debug)]
pub struct DecodeError {
    pub id: Option<u64>,
    pub error: MemdbError,
}

impl DecodeError {
    /// The error response to send back
    pub fn into_response(self) -> Response {
        Response::error(self.id, &self.error)
    }
}

// =============================================================================
// Request Encoding/Decoding
// =============================================================================

/// Decode a request datagram
///
/// Not JSON is `ParseError`; not a `{id, method, params}` object is
/// `InvalidRequest`; then method and parameters are resolved.
pub fn decode_request(bytes: &[u8]) -> std::result::Result<Request, DecodeError> {
    let envelope = decode_envelope(bytes)?;
    Request::from_envelope(&envelope).map_err(|error| DecodeError {
        id: Some(envelope.id),
        error,
    })
}

/// Decode just the envelope
pub fn decode_envelope(bytes: &[u8]) -> std::result::Result<Envelope, DecodeError> {
    // Senders may NUL-terminate the datagram
    let bytes = bytes.strip_suffix(b"\0").unwrap_or(bytes);

    let value: Value = serde_json::from_slice(bytes).map_err(|e| DecodeError {
        id: None,
        error: MemdbError::ParseError(e.to_string()),
    })?;

    let id = value.get("id").and_then(Value::as_u64);
    serde_json::from_value(value).map_err(|e| DecodeError {
        id,
        error: MemdbError::InvalidRequest(e.to_string()),
    })
}

/// Encode a request datagram (client side)
pub fn encode_request(request: &Request) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(&request.to_envelope())?)
}

// =============================================================================
// Response Encoding/Decoding
// =============================================================================

/// Encode a response as `{id, result}` or `{id, error: {code, message}}`
pub fn encode_response(response: &Response) -> Result<Vec<u8>> {
    let value = match &response.outcome {
        Ok(result) => json!({ "id": response.id, "result": result }),
        Err(error) => json!({
            "id": response.id,
            "error": { "code": error.code, "message": error.message },
        }),
    };
    Ok(serde_json::to_vec(&value)?)
}

/// Decode a response datagram (client side)
pub fn decode_response(bytes: &[u8]) -> Result<Response> {
    let value: Value =
        serde_json::from_slice(bytes).map_err(|e| MemdbError::ParseError(e.to_string()))?;

    let id = value.get("id").and_then(Value::as_u64);

    if let Some(error) = value.get("error") {
        let code = error
            .get("code")
            .and_then(Value::as_i64)
            .ok_or_else(|| MemdbError::InvalidRequest("error without code".to_string()))?;
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        return Ok(Response {
            id,
            outcome: Err(ErrorObject { code, message }),
        });
    }

    match value.get("result") {
        Some(result) => Ok(Response::ok(id, result.clone())),
        None => Err(MemdbError::InvalidRequest(
            "response has neither result nor error".to_string(),
        )),
    }
}
