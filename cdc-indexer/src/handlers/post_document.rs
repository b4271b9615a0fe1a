//! Projection of post change events into `PostDocument`s.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, instrument};

use cdc_indexer_repository::{DocumentService, DocumentStore};
use cdc_indexer_shared::{PostDocument, SearchDocument};

use crate::handlers::fields::{optional_timestamp, required_integer, required_text};
use crate::handlers::{CdcEventHandler, HandlerError, Projection};
use crate::listener::CdcEvent;

/// Handler key of the post projection.
pub const POST_DOCUMENT_HANDLER_KEY: &str = "post-document";

/// Projects rows of the `posts` table into the posts index.
///
/// Upserts require `id`, `title`, `content` and `author_id`; anything missing
/// drops the whole event. Deletes only need a numeric `id`.
pub struct PostDocumentHandler {
    documents: DocumentService<PostDocument>,
}

impl PostDocumentHandler {
    /// Create a handler writing to `index_name`.
    pub fn new(store: Arc<dyn DocumentStore>, index_name: impl Into<String>) -> Self {
        Self {
            documents: DocumentService::new(store, index_name),
        }
    }

    /// Build the document an upsert event describes.
    fn project(event: &CdcEvent) -> Result<PostDocument, HandlerError> {
        let id = required_integer(event, "id")?;
        let title = required_text(event, "title")?;
        let content = required_text(event, "content")?;
        let author_id = required_integer(event, "author_id")?;

        let now = Utc::now();
        let created_at = optional_timestamp(event, "created_at", now)?;
        let updated_at = optional_timestamp(event, "updated_at", now)?;

        Ok(PostDocument::new(
            id, title, content, author_id, created_at, updated_at,
        ))
    }
}

#[async_trait]
impl CdcEventHandler for PostDocumentHandler {
    fn key(&self) -> &str {
        POST_DOCUMENT_HANDLER_KEY
    }

    #[instrument(skip(self, event), fields(topic = %event.topic(), deleted = event.is_deleted()))]
    async fn handle(&self, event: &CdcEvent) -> Result<Projection, HandlerError> {
        let index = self.documents.index_name().to_string();

        if event.is_deleted() {
            let id = required_integer(event, "id")?.to_string();
            self.documents.delete(&id).await?;
            debug!(index = %index, doc_id = %id, "Post document deleted");
            return Ok(Projection::Deleted { index, id });
        }

        let document = Self::project(event)?;
        self.documents.save(&document).await?;
        debug!(index = %index, doc_id = document.id, title = %document.title, "Post document saved");

        Ok(Projection::Upserted {
            index,
            id: document.document_id(),
        })
    }
}
