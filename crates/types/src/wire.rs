//! Wire notation used by the platform bridge.
//!
//! The backend represents every typed value as a two-element JSON array:
//! the first element is the value's class tag, the second the serialized
//! payload. Plain JSON values (strings, numbers, maps without a tag) pass
//! through untouched.

use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WireError {
    #[error("expected a [tag, payload] pair, got: {0}")]
    NotTagged(Value),

    #[error("unknown value tag: {0}")]
    UnknownTag(String),

    #[error("malformed payload for {tag}: {reason}")]
    BadPayload { tag: String, reason: String },
}

/// Wrap a payload in the `[tag, payload]` notation.
pub fn tagged(tag: &str, payload: Value) -> Value {
    Value::Array(vec![Value::String(tag.to_string()), payload])
}

/// Split a `[tag, payload]` pair. Fails on anything that is not a
/// two-element array with a string head.
pub fn untag(value: &Value) -> Result<(&str, &Value), WireError> {
    let pair = value
        .as_array()
        .filter(|items| items.len() == 2)
        .ok_or_else(|| WireError::NotTagged(value.clone()))?;
    let tag = pair[0]
        .as_str()
        .ok_or_else(|| WireError::NotTagged(value.clone()))?;
    Ok((tag, &pair[1]))
}

pub(crate) fn payload_str(tag: &str, payload: &Value, field: &str) -> Result<String, WireError> {
    payload
        .get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| WireError::BadPayload {
            tag: tag.to_string(),
            reason: format!("missing string field {field:?}"),
        })
}

pub(crate) fn payload_opt_str(payload: &Value, field: &str) -> Option<String> {
    payload
        .get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
}

pub(crate) fn payload_i64(tag: &str, payload: &Value, field: &str) -> Result<i64, WireError> {
    payload
        .get(field)
        .and_then(Value::as_i64)
        .ok_or_else(|| WireError::BadPayload {
            tag: tag.to_string(),
            reason: format!("missing integer field {field:?}"),
        })
}
