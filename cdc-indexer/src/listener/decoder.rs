//! Change message decoding.
//!
//! Turns the raw text of a transport message into a `Payload`.

use serde_json::Value;
use thiserror::Error;

use crate::listener::event::{Payload, PayloadValue};

/// Errors that make a message undecodable. None of them are retried.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The message bytes are not valid UTF-8.
    #[error("Message is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    /// The message text is not valid JSON.
    #[error("Malformed JSON: {0}")]
    MalformedJson(#[from] serde_json::Error),

    /// The message is valid JSON but not an object.
    #[error("Expected a JSON object, found {0}")]
    NotAnObject(&'static str),
}

/// Decode a message body into a payload map.
///
/// An empty object decodes successfully to an empty map; classifying it as
/// `empty_payload` is the listener's job.
pub fn decode_payload(message: &str) -> Result<Payload, DecodeError> {
    match serde_json::from_str::<Value>(message)? {
        Value::Object(fields) => Ok(fields
            .into_iter()
            .map(|(key, value)| (key, PayloadValue::from(value)))
            .collect()),
        Value::Null => Err(DecodeError::NotAnObject("null")),
        Value::Bool(_) => Err(DecodeError::NotAnObject("boolean")),
        Value::Number(_) => Err(DecodeError::NotAnObject("number")),
        Value::String(_) => Err(DecodeError::NotAnObject("string")),
        Value::Array(_) => Err(DecodeError::NotAnObject("array")),
    }
}

/// Decode raw message bytes, checking UTF-8 first.
pub fn decode_bytes(message: &[u8]) -> Result<Payload, DecodeError> {
    decode_payload(std::str::from_utf8(message)?)
}
