//! # CDC Indexer
//!
//! Keeps a search index eventually consistent with a transactional store by
//! consuming change-data-capture events from Kafka and projecting them into
//! OpenSearch documents.
//!
//! ## Architecture
//!
//! 1. **Consumer**: Receives change records from Kafka
//! 2. **Orchestrator**: Runs one lane per partition and acknowledges offsets
//! 3. **Listener**: Decodes, validates and records metrics for each record
//! 4. **Registry**: Routes a topic to its projection handler
//! 5. **Handlers**: Turn an event into one document store mutation
//!
//! ## Modules
//!
//! - [`config`]: Settings, topic routing table and dependency wiring
//! - [`consumer`]: Kafka consumer and the transport trait
//! - [`orchestrator`]: Partition lanes, redelivery and shutdown
//! - [`listener`]: Decoding, validation and outcome recording
//! - [`registry`]: Topic to handler resolution and the subscription list
//! - [`handlers`]: Projection handlers
//! - [`metrics`]: Prometheus counters and their HTTP endpoint
//! - [`errors`]: Error types for the indexer

pub mod config;
pub mod consumer;
pub mod errors;
pub mod handlers;
pub mod listener;
pub mod metrics;
pub mod orchestrator;
pub mod registry;

pub use config::Dependencies;
pub use errors::IngestError;

use thiserror::Error;

/// Errors that can occur during indexer initialization or execution.
#[derive(Error, Debug)]
pub enum IndexingError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Ingest error.
    #[error("Ingest error: {0}")]
    IngestError(#[from] IngestError),
}

impl IndexingError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }
}
