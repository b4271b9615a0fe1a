//! Decoded change events.
//!
//! A change message is decoded into a map from column name to a small tagged
//! union, so every extraction site has to handle the "wrong shape" case.

use serde_json::{Number, Value};
use std::collections::BTreeMap;

/// Payload key carrying the delete marker added by the CDC producer.
pub const DELETED_FIELD: &str = "__deleted";

/// The only marker value that flags a delete. Booleans do not count.
const DELETED_MARKER: &str = "true";

/// A single column value from a change message.
#[derive(Debug, Clone, PartialEq)]
pub enum PayloadValue {
    /// JSON `null`.
    Null,
    /// A JSON string.
    String(String),
    /// A JSON number (integer or floating point).
    Number(Number),
    /// A JSON boolean.
    Bool(bool),
    /// A nested object or array. No projection reads these.
    Composite(Value),
}

/// Column name to value mapping for one change message.
pub type Payload = BTreeMap<String, PayloadValue>;

impl From<Value> for PayloadValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::String(s) => Self::String(s),
            Value::Number(n) => Self::Number(n),
            Value::Bool(b) => Self::Bool(b),
            composite @ (Value::Array(_) | Value::Object(_)) => Self::Composite(composite),
        }
    }
}

impl PayloadValue {
    /// The string content, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// The value as a whole number.
    ///
    /// Accepts any JSON integer that fits in `i64`, and floating point values
    /// without a fractional part (`42.0`). Everything else is `None`.
    pub fn as_integer(&self) -> Option<i64> {
        let Self::Number(n) = self else {
            return None;
        };

        if let Some(i) = n.as_i64() {
            return Some(i);
        }
        if n.is_u64() {
            // Above i64::MAX.
            return None;
        }

        n.as_f64()
            .filter(|f| f.is_finite() && f.fract() == 0.0)
            .filter(|f| *f >= i64::MIN as f64 && *f < i64::MAX as f64)
            .map(|f| f as i64)
    }

    /// Whether this is JSON `null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Short name of the JSON type, used in drop reasons and logs.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::String(_) => "string",
            Self::Number(_) => "number",
            Self::Bool(_) => "boolean",
            Self::Composite(Value::Array(_)) => "array",
            Self::Composite(_) => "object",
        }
    }
}

impl std::fmt::Display for PayloadValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::String(s) => write!(f, "{:?}", s),
            Self::Number(n) => write!(f, "{}", n),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Composite(v) => write!(f, "{}", v),
        }
    }
}

/// One change event, built per inbound message and discarded after handling.
#[derive(Debug, Clone, PartialEq)]
pub struct CdcEvent {
    topic: String,
    payload: Payload,
    deleted: bool,
}

impl CdcEvent {
    /// Build an event from a decoded payload.
    ///
    /// The event is a delete only when `__deleted` is exactly the string `"true"`.
    pub fn new(topic: impl Into<String>, payload: Payload) -> Self {
        let deleted = matches!(
            payload.get(DELETED_FIELD),
            Some(PayloadValue::String(marker)) if marker == DELETED_MARKER
        );

        Self {
            topic: topic.into(),
            payload,
            deleted,
        }
    }

    /// The topic the event arrived on.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// The decoded payload.
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Whether the event deletes its record.
    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    /// Look up a payload field. JSON `null` is returned as `Some(PayloadValue::Null)`.
    pub fn get(&self, field: &str) -> Option<&PayloadValue> {
        self.payload.get(field)
    }
}
