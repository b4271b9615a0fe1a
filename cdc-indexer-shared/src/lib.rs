//! # CDC Indexer Shared
//!
//! This crate defines the document types shared between the CDC indexer
//! pipeline and the document store implementations.

pub mod types;

pub use types::post_document::{PostDocument, POSTS_INDEX};
pub use types::search_document::SearchDocument;
