//! Request and response types for document store operations.

use serde_json::Value;

/// A document as the store sees it: an id and an opaque JSON source.
///
/// Typed documents are converted to and from this shape by `DocumentService`,
/// so store implementations never need to know the concrete document type.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    /// The document's identifier inside its index.
    pub id: String,
    /// The JSON source written to the index.
    pub source: Value,
}

impl StoredDocument {
    /// Create a new stored document.
    pub fn new(id: impl Into<String>, source: Value) -> Self {
        Self {
            id: id.into(),
            source,
        }
    }
}
