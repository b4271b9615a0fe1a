//! In-memory document store.
//!
//! Keeps documents in a process-local map. Used by the integration tests and
//! for running the pipeline without a search cluster.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use crate::errors::DocumentStoreError;
use crate::interfaces::DocumentStore;
use crate::types::StoredDocument;
use crate::utils;

/// Document store backed by a `HashMap` keyed by `(index, id)`.
///
/// Call counters record every `save` and `delete` that reached the store,
/// including deletes of absent ids.
#[derive(Default)]
pub struct InMemoryDocumentStore {
    documents: RwLock<HashMap<(String, String), Value>>,
    save_calls: AtomicUsize,
    delete_calls: AtomicUsize,
}

impl InMemoryDocumentStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `save` calls received.
    pub fn save_calls(&self) -> usize {
        self.save_calls.load(Ordering::SeqCst)
    }

    /// Number of `delete` calls received.
    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    /// Number of documents currently held in an index.
    pub fn len(&self, index_name: &str) -> usize {
        self.read_documents()
            .keys()
            .filter(|(index, _)| index == index_name)
            .count()
    }

    /// Whether an index holds no documents.
    pub fn is_empty(&self, index_name: &str) -> bool {
        self.len(index_name) == 0
    }

    fn read_documents(
        &self,
    ) -> std::sync::RwLockReadGuard<'_, HashMap<(String, String), Value>> {
        // A poisoned lock only means another writer panicked mid-insert; the map itself is intact.
        self.documents
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_documents(
        &self,
    ) -> std::sync::RwLockWriteGuard<'_, HashMap<(String, String), Value>> {
        self.documents
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn save(
        &self,
        document: &StoredDocument,
        index_name: &str,
    ) -> Result<(), DocumentStoreError> {
        utils::validate_address(&document.id, index_name)?;
        self.save_calls.fetch_add(1, Ordering::SeqCst);

        self.write_documents().insert(
            (index_name.to_string(), document.id.clone()),
            document.source.clone(),
        );
        Ok(())
    }

    async fn delete(&self, id: &str, index_name: &str) -> Result<(), DocumentStoreError> {
        utils::validate_address(id, index_name)?;
        self.delete_calls.fetch_add(1, Ordering::SeqCst);

        self.write_documents()
            .remove(&(index_name.to_string(), id.to_string()));
        Ok(())
    }

    async fn get(
        &self,
        id: &str,
        index_name: &str,
    ) -> Result<Option<StoredDocument>, DocumentStoreError> {
        utils::validate_address(id, index_name)?;

        Ok(self
            .read_documents()
            .get(&(index_name.to_string(), id.to_string()))
            .map(|source| StoredDocument::new(id, source.clone())))
    }
}
