//! Structural validation of decoded change events.
//!
//! Only guards routing. Whether a payload holds a complete document is
//! checked by each projection handler.

use crate::listener::event::{CdcEvent, PayloadValue};

/// Why an event failed validation.
///
/// The string forms are used as the `reason` metric label, so this list must
/// stay small and its labels must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvalidReason {
    /// The payload has no `id` (or `id` is null).
    MissingId,
    /// `id` is a string holding only whitespace.
    BlankId,
    /// The message decoded to an object with no keys.
    EmptyPayload,
}

impl InvalidReason {
    /// The metric label for this reason.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingId => "missing_id",
            Self::BlankId => "blank_id",
            Self::EmptyPayload => "empty_payload",
        }
    }
}

impl std::fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of validating one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationResult {
    valid: bool,
    reason: Option<InvalidReason>,
}

impl ValidationResult {
    /// A passing result.
    pub fn valid() -> Self {
        Self {
            valid: true,
            reason: None,
        }
    }

    /// A failing result with its reason.
    pub fn invalid(reason: InvalidReason) -> Self {
        Self {
            valid: false,
            reason: Some(reason),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// The failure reason. Always `None` for a valid result.
    pub fn reason(&self) -> Option<InvalidReason> {
        self.reason
    }
}

/// Stateless structural validator for change events.
#[derive(Debug, Clone, Copy, Default)]
pub struct CdcEventValidator;

impl CdcEventValidator {
    pub fn new() -> Self {
        Self
    }

    /// Validate an event.
    pub fn validate(&self, event: &CdcEvent) -> ValidationResult {
        if event.payload().is_empty() {
            return ValidationResult::invalid(InvalidReason::EmptyPayload);
        }

        match event.get("id") {
            None | Some(PayloadValue::Null) => ValidationResult::invalid(InvalidReason::MissingId),
            Some(PayloadValue::String(id)) if id.trim().is_empty() => {
                ValidationResult::invalid(InvalidReason::BlankId)
            }
            Some(_) => ValidationResult::valid(),
        }
    }
}
