//! Document types stored in the search index.
//!
//! Re-exports `PostDocument` and the `SearchDocument` trait every indexed
//! document type implements.

pub mod post_document;
pub mod search_document;

pub use post_document::PostDocument;
pub use search_document::SearchDocument;
