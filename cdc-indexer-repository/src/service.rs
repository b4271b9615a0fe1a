//! Typed document service.
//!
//! This module provides the service projection handlers use to write to the
//! search index. It converts `SearchDocument` values to the store's JSON shape
//! and back, and delegates to a `DocumentStore` for the actual backend call.

use std::marker::PhantomData;
use std::sync::Arc;

use cdc_indexer_shared::SearchDocument;

use crate::errors::DocumentStoreError;
use crate::interfaces::DocumentStore;
use crate::types::StoredDocument;

/// Typed access to one index of the document store.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use cdc_indexer_repository::{DocumentService, InMemoryDocumentStore};
/// use cdc_indexer_shared::PostDocument;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = Arc::new(InMemoryDocumentStore::new());
/// let posts: DocumentService<PostDocument> = DocumentService::new(store, "posts");
///
/// let now = chrono::Utc::now();
/// posts.save(&PostDocument::new(1, "Title", "Body", 100, now, now)).await?;
/// assert!(posts.get("1").await?.is_some());
/// # Ok(())
/// # }
/// ```
pub struct DocumentService<D> {
    store: Arc<dyn DocumentStore>,
    index_name: String,
    _document: PhantomData<fn() -> D>,
}

impl<D: SearchDocument> DocumentService<D> {
    /// Create a service writing documents of type `D` to `index_name`.
    pub fn new(store: Arc<dyn DocumentStore>, index_name: impl Into<String>) -> Self {
        Self {
            store,
            index_name: index_name.into(),
            _document: PhantomData,
        }
    }

    /// The index this service writes to.
    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    /// Insert or replace a document.
    pub async fn save(&self, document: &D) -> Result<(), DocumentStoreError> {
        let source = serde_json::to_value(document)?;
        let stored = StoredDocument::new(document.document_id(), source);
        self.store.save(&stored, &self.index_name).await
    }

    /// Delete a document by id. Deleting an absent id succeeds.
    pub async fn delete(&self, id: &str) -> Result<(), DocumentStoreError> {
        self.store.delete(id, &self.index_name).await
    }

    /// Fetch and deserialize a document by id.
    pub async fn get(&self, id: &str) -> Result<Option<D>, DocumentStoreError> {
        match self.store.get(id, &self.index_name).await? {
            Some(stored) => {
                let document = serde_json::from_value(stored.source).map_err(|e| {
                    DocumentStoreError::serialization(format!(
                        "Failed to read document {} from {}: {}",
                        id, self.index_name, e
                    ))
                })?;
                Ok(Some(document))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryDocumentStore;
    use cdc_indexer_shared::PostDocument;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn post(id: i64, title: &str) -> PostDocument {
        let at = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        PostDocument::new(id, title, "content", 100, at, at)
    }

    #[tokio::test]
    async fn test_save_and_get_roundtrip() {
        let store = Arc::new(InMemoryDocumentStore::new());
        let service: DocumentService<PostDocument> = DocumentService::new(store.clone(), "posts");

        service.save(&post(1, "Hello")).await.unwrap();

        let stored = service.get("1").await.unwrap().unwrap();
        assert_eq!(stored, post(1, "Hello"));

        let raw = store.get("1", "posts").await.unwrap().unwrap();
        assert_eq!(raw.source["authorId"], 100);
    }

    #[tokio::test]
    async fn test_delete() {
        let store = Arc::new(InMemoryDocumentStore::new());
        let service: DocumentService<PostDocument> = DocumentService::new(store, "posts");

        service.save(&post(3, "Doomed")).await.unwrap();
        service.delete("3").await.unwrap();

        assert!(service.get("3").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_rejects_foreign_source() {
        let store = Arc::new(InMemoryDocumentStore::new());
        store
            .save(&StoredDocument::new("5", json!({ "unexpected": true })), "posts")
            .await
            .unwrap();
        let service: DocumentService<PostDocument> = DocumentService::new(store, "posts");

        let result = service.get("5").await;
        assert!(matches!(
            result.unwrap_err(),
            DocumentStoreError::SerializationError(_)
        ));
    }

    #[test]
    fn test_index_name() {
        let service: DocumentService<PostDocument> =
            DocumentService::new(Arc::new(InMemoryDocumentStore::new()), "posts");
        assert_eq!(service.index_name(), "posts");
    }
}
