//! Error types for the CDC indexer ingest.

use cdc_indexer_repository::DocumentStoreError;
use thiserror::Error;

/// Errors that can occur in the CDC indexer ingest.
#[derive(Error, Debug)]
pub enum IngestError {
    /// Document store I/O error surfaced by the pipeline.
    #[error("Store error: {0}")]
    StoreError(#[from] DocumentStoreError),

    /// Kafka-related error.
    #[error("Kafka error: {0}")]
    KafkaError(String),

    /// Channel communication error.
    #[error("Channel error: {0}")]
    ChannelError(String),

    /// Metrics registration or encoding error.
    #[error("Metrics error: {0}")]
    MetricsError(String),

    /// Metrics HTTP server error.
    #[error("Server error: {0}")]
    ServerError(String),
}

impl IngestError {
    /// Create a Kafka error.
    pub fn kafka(msg: impl Into<String>) -> Self {
        Self::KafkaError(msg.into())
    }

    /// Create a channel error.
    pub fn channel(msg: impl Into<String>) -> Self {
        Self::ChannelError(msg.into())
    }

    /// Create a metrics error.
    pub fn metrics(msg: impl Into<String>) -> Self {
        Self::MetricsError(msg.into())
    }

    /// Create a server error.
    pub fn server(msg: impl Into<String>) -> Self {
        Self::ServerError(msg.into())
    }
}

impl From<rdkafka::error::KafkaError> for IngestError {
    fn from(err: rdkafka::error::KafkaError) -> Self {
        Self::KafkaError(err.to_string())
    }
}

impl From<prometheus::Error> for IngestError {
    fn from(err: prometheus::Error) -> Self {
        Self::MetricsError(err.to_string())
    }
}
