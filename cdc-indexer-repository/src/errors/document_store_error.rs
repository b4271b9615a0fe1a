//! Document store error types.
//!
//! This module defines the unified error type for all document store operations,
//! including both low-level backend errors and request validation errors.

use thiserror::Error;

/// Unified errors from document store operations.
///
/// Used by the `DocumentStore` trait and `DocumentService`. Retryable errors
/// reaching the ingest pipeline are handed back to the transport for
/// redelivery; the rest reject the request itself and are dropped.
#[derive(Debug, Clone, Error)]
pub enum DocumentStoreError {
    /// Validation error (e.g., blank document id or index name).
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Failed to establish connection to the search backend.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Failed to save a document.
    #[error("Save error: {0}")]
    SaveError(String),

    /// Failed to delete a document.
    #[error("Delete error: {0}")]
    DeleteError(String),

    /// Failed to fetch a document.
    #[error("Get error: {0}")]
    GetError(String),

    /// Failed to refresh an index.
    #[error("Refresh error: {0}")]
    RefreshError(String),

    /// Failed to parse a response from the search backend.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Failed to serialize or deserialize a document.
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl DocumentStoreError {
    /// Create a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }

    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::ConnectionError(msg.into())
    }

    /// Create a save error.
    pub fn save(msg: impl Into<String>) -> Self {
        Self::SaveError(msg.into())
    }

    /// Create a delete error.
    pub fn delete(msg: impl Into<String>) -> Self {
        Self::DeleteError(msg.into())
    }

    /// Create a get error.
    pub fn get(msg: impl Into<String>) -> Self {
        Self::GetError(msg.into())
    }

    /// Create a refresh error.
    pub fn refresh(msg: impl Into<String>) -> Self {
        Self::RefreshError(msg.into())
    }

    /// Create a parse error.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::ParseError(msg.into())
    }

    /// Whether the same call could succeed later.
    ///
    /// Validation and serialization errors depend only on the request.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Self::ValidationError(_) | Self::SerializationError(_)
        )
    }

    /// Create a serialization error.
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::SerializationError(msg.into())
    }
}

impl From<serde_json::Error> for DocumentStoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_errors_are_not_retryable() {
        assert!(!DocumentStoreError::validation("bad index").is_retryable());
        assert!(!DocumentStoreError::serialization("bad json").is_retryable());
    }

    #[test]
    fn test_backend_errors_are_retryable() {
        assert!(DocumentStoreError::connection("refused").is_retryable());
        assert!(DocumentStoreError::save("503").is_retryable());
        assert!(DocumentStoreError::delete("timeout").is_retryable());
        assert!(DocumentStoreError::parse("truncated body").is_retryable());
    }
}
