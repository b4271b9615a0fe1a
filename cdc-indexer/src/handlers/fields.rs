//! Typed field extraction from change event payloads.

use chrono::{DateTime, TimeZone, Utc};

use crate::handlers::DropReason;
use crate::listener::{CdcEvent, PayloadValue};

/// Read a required whole-number field.
pub fn required_integer(event: &CdcEvent, field: &'static str) -> Result<i64, DropReason> {
    match event.get(field) {
        None | Some(PayloadValue::Null) => Err(DropReason::MissingField { field }),
        Some(value) => value.as_integer().ok_or(DropReason::InvalidType {
            field,
            found: value.type_name(),
        }),
    }
}

/// Read a required string field that must contain non-whitespace text.
pub fn required_text(event: &CdcEvent, field: &'static str) -> Result<String, DropReason> {
    match event.get(field) {
        None | Some(PayloadValue::Null) => Err(DropReason::MissingField { field }),
        Some(PayloadValue::String(text)) if text.trim().is_empty() => {
            Err(DropReason::BlankField { field })
        }
        Some(PayloadValue::String(text)) => Ok(text.clone()),
        Some(value) => Err(DropReason::InvalidType {
            field,
            found: value.type_name(),
        }),
    }
}

/// Read a timestamp field.
///
/// Accepts an RFC 3339 / ISO-8601 string or a whole number of epoch
/// milliseconds. An absent or null field resolves to `now`; a present value
/// that does not parse is an error.
pub fn optional_timestamp(
    event: &CdcEvent,
    field: &'static str,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>, DropReason> {
    let value = match event.get(field) {
        None | Some(PayloadValue::Null) => return Ok(now),
        Some(value) => value,
    };

    let parsed = match value {
        PayloadValue::String(text) => DateTime::parse_from_rfc3339(text.trim())
            .ok()
            .map(|at| at.with_timezone(&Utc)),
        PayloadValue::Number(_) => value
            .as_integer()
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single()),
        _ => None,
    };

    parsed.ok_or_else(|| DropReason::InvalidTimestamp {
        field,
        value: value.to_string(),
    })
}
