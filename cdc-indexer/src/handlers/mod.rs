//! Projection handlers.
//!
//! A handler turns a validated change event into one document store mutation.
//! Handlers never log drops themselves: they return the reason and the
//! listener records it.

mod fields;
mod post_document;

pub use fields::{optional_timestamp, required_integer, required_text};
pub use post_document::{PostDocumentHandler, POST_DOCUMENT_HANDLER_KEY};

use async_trait::async_trait;
use cdc_indexer_repository::DocumentStoreError;
use thiserror::Error;

use crate::listener::CdcEvent;

/// The store mutation a handler applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    /// The document was inserted or replaced.
    Upserted { index: String, id: String },
    /// The document was deleted (or was already absent).
    Deleted { index: String, id: String },
}

/// Why a handler refused to write an event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DropReason {
    #[error("required field `{field}` is missing")]
    MissingField { field: &'static str },

    #[error("required field `{field}` is blank")]
    BlankField { field: &'static str },

    #[error("field `{field}` has unexpected type {found}")]
    InvalidType {
        field: &'static str,
        found: &'static str,
    },

    #[error("field `{field}` is not a valid timestamp: {value}")]
    InvalidTimestamp { field: &'static str, value: String },
}

impl DropReason {
    /// Metric label for this reason.
    pub fn metric_label(&self) -> &'static str {
        match self {
            Self::MissingField { .. } => "missing_field",
            Self::BlankField { .. } => "blank_field",
            Self::InvalidType { .. } => "invalid_type",
            Self::InvalidTimestamp { .. } => "invalid_timestamp",
        }
    }

    /// The payload field the reason refers to.
    pub fn field(&self) -> &'static str {
        match self {
            Self::MissingField { field }
            | Self::BlankField { field }
            | Self::InvalidType { field, .. }
            | Self::InvalidTimestamp { field, .. } => field,
        }
    }
}

/// Errors returned by a handler.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The event was dropped without touching the store.
    #[error("Event dropped: {0}")]
    Dropped(DropReason),

    /// The store call failed; the event may be redelivered.
    #[error(transparent)]
    Store(#[from] DocumentStoreError),
}

impl From<DropReason> for HandlerError {
    fn from(reason: DropReason) -> Self {
        Self::Dropped(reason)
    }
}

/// A projection of change events for one document type.
#[async_trait]
pub trait CdcEventHandler: Send + Sync {
    /// The handler key topics are mapped to in configuration.
    fn key(&self) -> &str;

    /// Apply one validated event to the document store.
    async fn handle(&self, event: &CdcEvent) -> Result<Projection, HandlerError>;
}
