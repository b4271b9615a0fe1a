//! Document store trait definition.
//!
//! This module defines the abstract interface for document store operations,
//! allowing for different backend implementations (OpenSearch, in-memory, etc.).

use async_trait::async_trait;

use crate::errors::DocumentStoreError;
use crate::types::StoredDocument;

/// Abstracts the underlying search index implementation.
///
/// Implementations are injected into `DocumentService` and the projection
/// handlers, which makes it easy to swap OpenSearch for the in-memory store
/// in tests.
///
/// Every mutation must be idempotent: saving the same document twice, or
/// deleting an id that is already gone, leaves the index in the same state as
/// doing it once. The ingest pipeline relies on this to redeliver messages
/// after a failure.
///
/// # Index Initialization
///
/// Creating indices with their settings and mappings is not part of this
/// interface. Implementations assume the target index already exists or
/// that the backend creates it on first write.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert or fully replace a document in the given index.
    ///
    /// # Arguments
    ///
    /// * `document` - The document id and its JSON source
    /// * `index_name` - The target index
    ///
    /// # Returns
    ///
    /// * `Ok(())` - If the document was written
    /// * `Err(DocumentStoreError)` - If the write fails
    async fn save(
        &self,
        document: &StoredDocument,
        index_name: &str,
    ) -> Result<(), DocumentStoreError>;

    /// Delete a document from the given index.
    ///
    /// If the document doesn't exist, the operation is considered successful.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - If the document was deleted (or didn't exist)
    /// * `Err(DocumentStoreError)` - If the deletion fails
    async fn delete(&self, id: &str, index_name: &str) -> Result<(), DocumentStoreError>;

    /// Fetch a document by id.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(StoredDocument))` - If the document exists
    /// * `Ok(None)` - If the document is absent
    /// * `Err(DocumentStoreError)` - If the lookup fails
    async fn get(
        &self,
        id: &str,
        index_name: &str,
    ) -> Result<Option<StoredDocument>, DocumentStoreError>;
}
