//! # CDC Indexer Repository
//!
//! This crate provides the document store abstraction the CDC indexer writes
//! through. It includes definitions for errors, the `DocumentStore` interface,
//! an OpenSearch implementation and an in-memory implementation, plus the
//! typed `DocumentService` the projection handlers use.

pub mod config;
pub mod errors;
pub mod interfaces;
pub mod memory;
pub mod opensearch;
pub mod service;
pub mod types;
pub mod utils;

pub use config::OpenSearchConfig;
pub use errors::DocumentStoreError;
pub use interfaces::DocumentStore;
pub use memory::InMemoryDocumentStore;
pub use opensearch::OpenSearchStore;
pub use service::DocumentService;
pub use types::StoredDocument;
pub use utils::{validate_address, validate_index_name};
