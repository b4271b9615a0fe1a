//! Common behaviour of documents written to the search index.

use serde::de::DeserializeOwned;
use serde::Serialize;

/// A document that can be stored in and read back from the search index.
///
/// Implementors serialize to the JSON source stored by the index and expose
/// the identifier the store addresses them by.
pub trait SearchDocument: Serialize + DeserializeOwned + Send + Sync {
    /// The identifier of the document inside its index.
    fn document_id(&self) -> String;
}
