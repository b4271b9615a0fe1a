//! Post document type for the search index.
//!
//! Source records arrive with snake_case columns; the indexed document uses
//! camelCase field names.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::search_document::SearchDocument;

/// Default name of the index holding post documents.
pub const POSTS_INDEX: &str = "posts";

/// Document representation of a post in the search index.
///
/// # Fields
///
/// - `id`: Primary key of the source post row
/// - `title`: Post title (full-text field)
/// - `content`: Post body (full-text field)
/// - `author_id`: Author of the post
/// - `created_at`: Creation time of the source row
/// - `updated_at`: Last modification time of the source row
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PostDocument {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub author_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PostDocument {
    /// Create a new post document.
    ///
    /// # Example
    ///
    /// ```
    /// use cdc_indexer_shared::PostDocument;
    /// use chrono::Utc;
    ///
    /// let now = Utc::now();
    /// let doc = PostDocument::new(1, "Title", "Body", 100, now, now);
    /// assert_eq!(doc.author_id, 100);
    /// ```
    pub fn new(
        id: i64,
        title: impl Into<String>,
        content: impl Into<String>,
        author_id: i64,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            title: title.into(),
            content: content.into(),
            author_id,
            created_at,
            updated_at,
        }
    }
}

impl SearchDocument for PostDocument {
    fn document_id(&self) -> String {
        self.id.to_string()
    }
}
