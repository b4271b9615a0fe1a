//! OpenSearch document store implementation.
//!
//! This module provides the concrete implementation of `DocumentStore`
//! using the OpenSearch Rust crate.

use async_trait::async_trait;
use opensearch::{
    auth::Credentials,
    http::transport::{SingleNodeConnectionPool, TransportBuilder},
    indices::IndicesRefreshParts,
    DeleteParts, GetParts, IndexParts, OpenSearch,
};
use serde_json::Value;
use tracing::{debug, error, info};
use url::Url;

use crate::config::OpenSearchConfig;
use crate::errors::DocumentStoreError;
use crate::interfaces::DocumentStore;
use crate::types::StoredDocument;
use crate::utils;

/// OpenSearch document store.
///
/// Saves use the index API, so a save fully replaces the stored source and
/// replaying it converges to the same state.
///
/// # Example
///
/// ```ignore
/// use cdc_indexer_repository::{OpenSearchConfig, OpenSearchStore, StoredDocument};
///
/// let store = OpenSearchStore::new(&OpenSearchConfig::new("http://localhost:9200")).await?;
/// let doc = StoredDocument::new("1", serde_json::json!({ "id": 1, "title": "Hello" }));
/// store.save(&doc, "posts").await?;
/// ```
pub struct OpenSearchStore {
    client: OpenSearch,
}

impl OpenSearchStore {
    /// Create a new store connected to the configured cluster.
    ///
    /// Sends a ping so that an unreachable cluster is reported at startup
    /// instead of on the first write.
    ///
    /// # Returns
    ///
    /// * `Ok(OpenSearchStore)` - A connected store
    /// * `Err(DocumentStoreError)` - If the URL is invalid or the cluster is unreachable
    pub async fn new(config: &OpenSearchConfig) -> Result<Self, DocumentStoreError> {
        let parsed_url =
            Url::parse(&config.url).map_err(|e| DocumentStoreError::connection(e.to_string()))?;

        let conn_pool = SingleNodeConnectionPool::new(parsed_url);
        let mut builder = TransportBuilder::new(conn_pool).disable_proxy();
        if let Some((username, password)) = config.credentials() {
            builder = builder.auth(Credentials::Basic(
                username.to_string(),
                password.to_string(),
            ));
        }
        let transport = builder
            .build()
            .map_err(|e| DocumentStoreError::connection(e.to_string()))?;

        let client = OpenSearch::new(transport);

        let response = client
            .ping()
            .send()
            .await
            .map_err(|e| DocumentStoreError::connection(e.to_string()))?;
        if !response.status_code().is_success() {
            return Err(DocumentStoreError::connection(format!(
                "Ping failed with status {}",
                response.status_code()
            )));
        }

        info!(url = %config.url, "Created OpenSearch document store");

        Ok(Self { client })
    }

    /// Refresh an index so that recent writes become visible to reads and searches.
    pub async fn refresh(&self, index_name: &str) -> Result<(), DocumentStoreError> {
        let response = self
            .client
            .indices()
            .refresh(IndicesRefreshParts::Index(&[index_name]))
            .send()
            .await
            .map_err(|e| DocumentStoreError::refresh(e.to_string()))?;

        let status = response.status_code();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(DocumentStoreError::refresh(format!(
                "Refresh failed with status {}: {}",
                status, error_body
            )));
        }

        Ok(())
    }

    /// Extract the stored document from a get API response body.
    fn document_from_get_body(
        id: &str,
        body: Value,
    ) -> Result<Option<StoredDocument>, DocumentStoreError> {
        if body.get("found").and_then(Value::as_bool) == Some(false) {
            return Ok(None);
        }

        match body {
            Value::Object(mut fields) => match fields.remove("_source") {
                Some(source) => Ok(Some(StoredDocument::new(id, source))),
                None => Err(DocumentStoreError::parse(format!(
                    "Get response for document {} has no _source",
                    id
                ))),
            },
            _ => Err(DocumentStoreError::parse(format!(
                "Get response for document {} is not an object",
                id
            ))),
        }
    }
}

#[async_trait]
impl DocumentStore for OpenSearchStore {
    async fn save(
        &self,
        document: &StoredDocument,
        index_name: &str,
    ) -> Result<(), DocumentStoreError> {
        utils::validate_address(&document.id, index_name)?;

        let response = self
            .client
            .index(IndexParts::IndexId(index_name, &document.id))
            .body(&document.source)
            .send()
            .await
            .map_err(|e| DocumentStoreError::save(e.to_string()))?;

        let status = response.status_code();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %error_body, "Save request failed");
            return Err(DocumentStoreError::save(format!(
                "Save failed with status {}: {}",
                status, error_body
            )));
        }

        debug!(index = %index_name, doc_id = %document.id, "Document saved");
        Ok(())
    }

    async fn delete(&self, id: &str, index_name: &str) -> Result<(), DocumentStoreError> {
        utils::validate_address(id, index_name)?;

        let response = self
            .client
            .delete(DeleteParts::IndexId(index_name, id))
            .send()
            .await
            .map_err(|e| DocumentStoreError::delete(e.to_string()))?;

        let status = response.status_code();

        // 404 is acceptable - document may not exist
        if !status.is_success() && status.as_u16() != 404 {
            let error_body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %error_body, "Delete request failed");
            return Err(DocumentStoreError::delete(format!(
                "Delete failed with status {}: {}",
                status, error_body
            )));
        }

        debug!(index = %index_name, doc_id = %id, "Document deleted");
        Ok(())
    }

    async fn get(
        &self,
        id: &str,
        index_name: &str,
    ) -> Result<Option<StoredDocument>, DocumentStoreError> {
        utils::validate_address(id, index_name)?;

        let response = self
            .client
            .get(GetParts::IndexId(index_name, id))
            .send()
            .await
            .map_err(|e| DocumentStoreError::get(e.to_string()))?;

        let status = response.status_code();
        if status.as_u16() == 404 {
            return Ok(None);
        }
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(DocumentStoreError::get(format!(
                "Get failed with status {}: {}",
                status, error_body
            )));
        }

        let body = response
            .json::<Value>()
            .await
            .map_err(|e| DocumentStoreError::parse(e.to_string()))?;

        Self::document_from_get_body(id, body)
    }
}
