//! Pipeline entry point for change messages.
//!
//! The listener decodes a raw message, validates it, routes it through the
//! handler registry and records the outcome. All drop logging and counting
//! happens here: lower layers only return why they refused an event.

mod decoder;
mod event;
mod validator;

pub use decoder::{decode_bytes, decode_payload, DecodeError};
pub use event::{CdcEvent, Payload, PayloadValue, DELETED_FIELD};
pub use validator::{CdcEventValidator, InvalidReason, ValidationResult};

use std::sync::Arc;
use tracing::{debug, error, instrument, warn};

use cdc_indexer_repository::DocumentStoreError;

use crate::handlers::{DropReason, HandlerError, Projection};
use crate::metrics::CdcEventMetrics;
use crate::registry::{HandlerRegistry, RoutingError};

/// Where in the pipeline an event was dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropStage {
    /// The message could not be decoded into a payload.
    Decode,
    /// Structural validation failed.
    Invalid(InvalidReason),
    /// The topic has no handler mapping.
    UnsupportedTopic,
    /// The topic is mapped to an unregistered handler key.
    UnknownHandler,
    /// The handler refused the event.
    Handler(DropReason),
    /// The document store rejected the request itself.
    StoreRejected,
}

impl DropStage {
    /// The `reason` label recorded for this drop.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Decode => "decode_error",
            Self::Invalid(reason) => reason.as_str(),
            Self::UnsupportedTopic => "unsupported_topic",
            Self::UnknownHandler => "unknown_handler",
            Self::Handler(reason) => reason.metric_label(),
            Self::StoreRejected => "store_rejected",
        }
    }
}

/// The terminal state of one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    /// A store mutation was applied.
    Applied(Projection),
    /// The event was dropped and will not be retried.
    Dropped(DropStage),
}

/// Result of decoding and validating a message.
#[derive(Debug)]
pub enum Admission {
    /// A valid event, counted as received, ready to dispatch.
    Accepted(CdcEvent),
    /// The message was dropped before dispatch.
    Rejected(DropStage),
}

/// Decodes, validates and dispatches change messages.
pub struct CdcEventListener {
    registry: Arc<HandlerRegistry>,
    validator: CdcEventValidator,
    metrics: Arc<CdcEventMetrics>,
}

impl CdcEventListener {
    pub fn new(registry: Arc<HandlerRegistry>, metrics: Arc<CdcEventMetrics>) -> Self {
        Self {
            registry,
            validator: CdcEventValidator::new(),
            metrics,
        }
    }

    /// Process one message body received on `topic`.
    ///
    /// Drops are terminal and returned as `EventOutcome::Dropped`. Only
    /// retryable store failures are errors; the caller redelivers the message.
    pub async fn consume(
        &self,
        topic: &str,
        message: &str,
    ) -> Result<EventOutcome, DocumentStoreError> {
        match self.admit(topic, decode_payload(message)) {
            Admission::Accepted(event) => self.dispatch(&event).await,
            Admission::Rejected(stage) => Ok(EventOutcome::Dropped(stage)),
        }
    }

    /// Process raw message bytes. Non-UTF-8 input is a decode failure.
    pub async fn consume_bytes(
        &self,
        topic: &str,
        message: &[u8],
    ) -> Result<EventOutcome, DocumentStoreError> {
        match self.admit_bytes(topic, message) {
            Admission::Accepted(event) => self.dispatch(&event).await,
            Admission::Rejected(stage) => Ok(EventOutcome::Dropped(stage)),
        }
    }

    /// Decode and validate raw message bytes.
    ///
    /// Records `received` (or the drop) exactly once. An accepted event can
    /// then be passed to [`dispatch`](Self::dispatch) as many times as the
    /// store requires.
    pub fn admit_bytes(&self, topic: &str, message: &[u8]) -> Admission {
        self.admit(topic, decode_bytes(message))
    }

    /// The counters this listener records into.
    pub fn metrics(&self) -> &Arc<CdcEventMetrics> {
        &self.metrics
    }

    fn admit(&self, topic: &str, decoded: Result<Payload, DecodeError>) -> Admission {
        let payload = match decoded {
            Ok(payload) => payload,
            Err(e) => {
                error!(topic = %topic, error = %e, "Failed to decode change message");
                return self.rejected(topic, DropStage::Decode);
            }
        };

        if payload.is_empty() {
            warn!(topic = %topic, "Change message has an empty payload, ignoring");
            self.metrics
                .on_invalid(topic, InvalidReason::EmptyPayload.as_str());
            return Admission::Rejected(DropStage::Invalid(InvalidReason::EmptyPayload));
        }

        let event = CdcEvent::new(topic, payload);
        self.metrics.on_received(topic);

        let validation = self.validator.validate(&event);
        if let Some(reason) = validation.reason() {
            warn!(
                topic = %topic,
                reason = %reason,
                payload = ?event.payload(),
                "Change event failed validation"
            );
            self.metrics.on_invalid(topic, reason.as_str());
            return Admission::Rejected(DropStage::Invalid(reason));
        }

        Admission::Accepted(event)
    }

    /// Route an accepted event to its handler and record the outcome.
    ///
    /// Returns `Err` only for retryable store failures, which record nothing.
    #[instrument(skip(self, event), fields(topic = %event.topic()))]
    pub async fn dispatch(&self, event: &CdcEvent) -> Result<EventOutcome, DocumentStoreError> {
        let topic = event.topic();

        match self.registry.handle(topic, event).await {
            Ok(projection) => {
                debug!(topic = %topic, projection = ?projection, "Change event applied");
                self.metrics.on_dispatched(topic);
                Ok(EventOutcome::Applied(projection))
            }
            Err(RoutingError::UnsupportedTopic { .. }) => {
                warn!(topic = %topic, "Unsupported topic, no handler mapping configured");
                Ok(self.dropped(topic, DropStage::UnsupportedTopic))
            }
            Err(RoutingError::UnknownHandlerKey { key, .. }) => {
                error!(
                    topic = %topic,
                    handler_key = %key,
                    "Misconfiguration: topic mapped to unknown handler key"
                );
                Ok(self.dropped(topic, DropStage::UnknownHandler))
            }
            Err(RoutingError::Handler(HandlerError::Dropped(reason))) => {
                warn!(
                    topic = %topic,
                    field = reason.field(),
                    reason = %reason,
                    payload = ?event.payload(),
                    "Change event dropped by handler"
                );
                // The handler was reached and returned, so this still counts as dispatched.
                self.metrics.on_dispatched(topic);
                Ok(self.dropped(topic, DropStage::Handler(reason)))
            }
            Err(RoutingError::Handler(HandlerError::Store(e))) if !e.is_retryable() => {
                error!(
                    topic = %topic,
                    error = %e,
                    payload = ?event.payload(),
                    "Document store rejected change event"
                );
                Ok(self.dropped(topic, DropStage::StoreRejected))
            }
            Err(RoutingError::Handler(HandlerError::Store(e))) => Err(e),
        }
    }

    fn rejected(&self, topic: &str, stage: DropStage) -> Admission {
        self.metrics.on_dropped(topic, stage.reason());
        Admission::Rejected(stage)
    }

    fn dropped(&self, topic: &str, stage: DropStage) -> EventOutcome {
        self.metrics.on_dropped(topic, stage.reason());
        EventOutcome::Dropped(stage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TopicHandlerMap;
    use crate::handlers::{CdcEventHandler, PostDocumentHandler};
    use cdc_indexer_repository::{DocumentStore, InMemoryDocumentStore};

    const TOPIC: &str = "posts.posts.posts";

    fn listener(mapping: &str) -> (CdcEventListener, Arc<InMemoryDocumentStore>) {
        listener_for_index(mapping, "posts")
    }

    fn listener_for_index(
        mapping: &str,
        index_name: &str,
    ) -> (CdcEventListener, Arc<InMemoryDocumentStore>) {
        let store = Arc::new(InMemoryDocumentStore::new());
        let handler: Arc<dyn CdcEventHandler> =
            Arc::new(PostDocumentHandler::new(store.clone(), index_name));
        let registry = HandlerRegistry::new(
            Arc::new(TopicHandlerMap::parse(mapping).unwrap()),
            vec![handler],
        );
        let metrics = Arc::new(CdcEventMetrics::new().unwrap());

        (
            CdcEventListener::new(Arc::new(registry), metrics),
            store,
        )
    }

    #[tokio::test]
    async fn test_upsert_is_applied_and_counted() {
        let (listener, store) = listener("posts.posts.posts=post-document");

        let outcome = listener
            .consume(
                TOPIC,
                r#"{"id":1,"title":"T","content":"C","author_id":100,"created_at":"2025-01-01T00:00:00Z","updated_at":"2025-01-01T00:00:00Z"}"#,
            )
            .await
            .unwrap();

        assert!(matches!(outcome, EventOutcome::Applied(Projection::Upserted { .. })));
        assert_eq!(store.len("posts"), 1);
        assert_eq!(listener.metrics().received_count(TOPIC), 1);
        assert_eq!(listener.metrics().dispatched_count(TOPIC), 1);
    }

    #[tokio::test]
    async fn test_missing_id_is_invalid() {
        let (listener, store) = listener("posts.posts.posts=post-document");

        let outcome = listener
            .consume(TOPIC, r#"{"title":"x","content":"y"}"#)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            EventOutcome::Dropped(DropStage::Invalid(InvalidReason::MissingId))
        );
        assert_eq!(store.save_calls() + store.delete_calls(), 0);
        assert_eq!(listener.metrics().received_count(TOPIC), 1);
        assert_eq!(listener.metrics().invalid_count(TOPIC, "missing_id"), 1);
        assert_eq!(listener.metrics().dispatched_count(TOPIC), 0);
    }

    #[tokio::test]
    async fn test_empty_payload_is_not_received() {
        let (listener, _store) = listener("posts.posts.posts=post-document");

        let outcome = listener.consume(TOPIC, "{}").await.unwrap();

        assert_eq!(
            outcome,
            EventOutcome::Dropped(DropStage::Invalid(InvalidReason::EmptyPayload))
        );
        assert_eq!(listener.metrics().received_count(TOPIC), 0);
        assert_eq!(listener.metrics().invalid_count(TOPIC, "empty_payload"), 1);
    }

    #[tokio::test]
    async fn test_malformed_message_is_dropped() {
        let (listener, _store) = listener("posts.posts.posts=post-document");

        let text = listener.consume(TOPIC, "{not json").await.unwrap();
        let bytes = listener.consume_bytes(TOPIC, &[0xff, 0xfe]).await.unwrap();

        assert_eq!(text, EventOutcome::Dropped(DropStage::Decode));
        assert_eq!(bytes, EventOutcome::Dropped(DropStage::Decode));
        assert_eq!(listener.metrics().received_count(TOPIC), 0);
        assert_eq!(listener.metrics().dropped_count(TOPIC, "decode_error"), 2);
    }

    #[tokio::test]
    async fn test_unmapped_topic_is_never_dispatched() {
        let (listener, store) = listener("posts.posts.posts=post-document");

        let outcome = listener
            .consume("comments", r#"{"id":1,"title":"T","content":"C","author_id":1}"#)
            .await
            .unwrap();

        assert_eq!(outcome, EventOutcome::Dropped(DropStage::UnsupportedTopic));
        assert_eq!(listener.metrics().dispatched_count("comments"), 0);
        assert_eq!(
            listener
                .metrics()
                .dropped_count("comments", "unsupported_topic"),
            1
        );
        assert_eq!(store.save_calls(), 0);
    }

    #[tokio::test]
    async fn test_unknown_handler_key_is_dropped() {
        let (listener, store) = listener("posts.posts.posts=comment-document");

        let outcome = listener.consume(TOPIC, r#"{"id":1}"#).await.unwrap();

        assert_eq!(outcome, EventOutcome::Dropped(DropStage::UnknownHandler));
        assert_eq!(listener.metrics().dispatched_count(TOPIC), 0);
        assert_eq!(store.save_calls(), 0);
    }

    #[tokio::test]
    async fn test_handler_drop_is_dispatched_and_counted() {
        let (listener, store) = listener("posts.posts.posts=post-document");

        let outcome = listener
            .consume(TOPIC, r#"{"id":1,"title":"T","author_id":1}"#)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            EventOutcome::Dropped(DropStage::Handler(DropReason::MissingField {
                field: "content"
            }))
        );
        assert_eq!(listener.metrics().dispatched_count(TOPIC), 1);
        assert_eq!(listener.metrics().dropped_count(TOPIC, "missing_field"), 1);
        assert_eq!(store.save_calls(), 0);
    }

    #[tokio::test]
    async fn test_create_then_delete_leaves_document_absent() {
        let (listener, store) = listener("posts.posts.posts=post-document");

        listener
            .consume(TOPIC, r#"{"id":3,"title":"T","content":"C","author_id":1}"#)
            .await
            .unwrap();
        listener
            .consume(TOPIC, r#"{"id":3,"__deleted":"true"}"#)
            .await
            .unwrap();

        assert!(store.get("3", "posts").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_admitted_event_is_received_once_across_dispatches() {
        let (listener, store) = listener("posts.posts.posts=post-document");

        let admission =
            listener.admit_bytes(TOPIC, br#"{"id":4,"title":"T","content":"C","author_id":1}"#);
        let event = match admission {
            Admission::Accepted(event) => event,
            other => panic!("expected accepted event, got {:?}", other),
        };

        listener.dispatch(&event).await.unwrap();
        listener.dispatch(&event).await.unwrap();

        assert_eq!(listener.metrics().received_count(TOPIC), 1);
        assert_eq!(store.save_calls(), 2);
        assert_eq!(store.len("posts"), 1);
    }

    #[tokio::test]
    async fn test_rejected_admission_records_once() {
        let (listener, _store) = listener("posts.posts.posts=post-document");

        let admission = listener.admit_bytes(TOPIC, br#"{"id":"  "}"#);

        assert!(matches!(
            admission,
            Admission::Rejected(DropStage::Invalid(InvalidReason::BlankId))
        ));
        assert_eq!(listener.metrics().received_count(TOPIC), 1);
        assert_eq!(listener.metrics().invalid_count(TOPIC, "blank_id"), 1);
    }

    #[tokio::test]
    async fn test_store_rejection_is_dropped_not_redelivered() {
        let (listener, store) = listener_for_index("posts.posts.posts=post-document", "Posts");

        let outcome = listener
            .consume(TOPIC, r#"{"id":5,"title":"T","content":"C","author_id":1}"#)
            .await
            .unwrap();

        assert_eq!(outcome, EventOutcome::Dropped(DropStage::StoreRejected));
        assert_eq!(store.save_calls(), 0);
        assert_eq!(listener.metrics().dispatched_count(TOPIC), 0);
        assert_eq!(listener.metrics().dropped_count(TOPIC, "store_rejected"), 1);
    }
}
