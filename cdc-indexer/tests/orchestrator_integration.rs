//! Integration tests for the CDC indexer orchestrator.
//!
//! These tests use the real Orchestrator, listener and post handler with a
//! mock consumer and in-memory document stores.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::time::timeout;

use cdc_indexer::config::TopicHandlerMap;
use cdc_indexer::consumer::{ConsumedRecord, Consumer, StreamMessage};
use cdc_indexer::errors::IngestError;
use cdc_indexer::handlers::{CdcEventHandler, PostDocumentHandler};
use cdc_indexer::listener::CdcEventListener;
use cdc_indexer::metrics::CdcEventMetrics;
use cdc_indexer::orchestrator::{Orchestrator, OrchestratorConfig, RedeliveryPolicy};
use cdc_indexer::registry::HandlerRegistry;
use cdc_indexer_repository::{
    DocumentStore, DocumentStoreError, InMemoryDocumentStore, StoredDocument,
};

const TOPIC: &str = "posts.posts.posts";

// Mock Consumer for testing
struct MockConsumer {
    records: Vec<ConsumedRecord>,
    end_stream: bool,
    error_on_subscribe: bool,
    acknowledged: Mutex<Vec<(String, i32, i64)>>,
}

impl MockConsumer {
    /// Sends `records`, then ends the stream.
    fn new(records: Vec<ConsumedRecord>) -> Self {
        Self {
            records,
            end_stream: true,
            error_on_subscribe: false,
            acknowledged: Mutex::new(Vec::new()),
        }
    }

    /// Sends `records`, then stays open until shutdown.
    fn open(records: Vec<ConsumedRecord>) -> Self {
        Self {
            end_stream: false,
            ..Self::new(records)
        }
    }

    fn with_subscribe_error() -> Self {
        Self {
            error_on_subscribe: true,
            ..Self::new(Vec::new())
        }
    }

    fn acknowledged(&self) -> Vec<(String, i32, i64)> {
        self.acknowledged.lock().unwrap().clone()
    }

    fn record_ack(&self, msg: StreamMessage) {
        if let StreamMessage::Acknowledgment {
            topic,
            partition,
            offset,
        } = msg
        {
            self.acknowledged
                .lock()
                .unwrap()
                .push((topic, partition, offset));
        }
    }
}

#[async_trait]
impl Consumer for MockConsumer {
    fn subscribe(&self) -> Result<(), IngestError> {
        if self.error_on_subscribe {
            Err(IngestError::kafka("Mock subscribe error"))
        } else {
            Ok(())
        }
    }

    async fn run(
        &self,
        sender: mpsc::Sender<StreamMessage>,
        mut ack_receiver: mpsc::UnboundedReceiver<StreamMessage>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), IngestError> {
        for record in self.records.clone() {
            if sender.send(StreamMessage::Record(record)).await.is_err() {
                return Ok(());
            }
        }

        if self.end_stream {
            let _ = sender.send(StreamMessage::End).await;
        }

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    while let Ok(msg) = ack_receiver.try_recv() {
                        self.record_ack(msg);
                    }
                    break;
                }
                msg = ack_receiver.recv() => match msg {
                    Some(msg) => self.record_ack(msg),
                    None => break,
                },
            }
        }

        Ok(())
    }
}

// Store that fails a number of saves before delegating
struct FlakyStore {
    inner: InMemoryDocumentStore,
    failures_left: AtomicUsize,
    save_attempts: AtomicUsize,
}

impl FlakyStore {
    fn failing(times: usize) -> Self {
        Self {
            inner: InMemoryDocumentStore::new(),
            failures_left: AtomicUsize::new(times),
            save_attempts: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl DocumentStore for FlakyStore {
    async fn save(
        &self,
        document: &StoredDocument,
        index_name: &str,
    ) -> Result<(), DocumentStoreError> {
        self.save_attempts.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failing {
            return Err(DocumentStoreError::connection("connection refused"));
        }
        self.inner.save(document, index_name).await
    }

    async fn delete(&self, id: &str, index_name: &str) -> Result<(), DocumentStoreError> {
        self.inner.delete(id, index_name).await
    }

    async fn get(
        &self,
        id: &str,
        index_name: &str,
    ) -> Result<Option<StoredDocument>, DocumentStoreError> {
        self.inner.get(id, index_name).await
    }
}

fn listener(store: Arc<dyn DocumentStore>) -> Arc<CdcEventListener> {
    listener_for_index(store, "posts")
}

fn listener_for_index(store: Arc<dyn DocumentStore>, index_name: &str) -> Arc<CdcEventListener> {
    let topics = Arc::new(TopicHandlerMap::parse(&format!("{}=post-document", TOPIC)).unwrap());
    let handlers: Vec<Arc<dyn CdcEventHandler>> =
        vec![Arc::new(PostDocumentHandler::new(store, index_name))];
    let registry = Arc::new(HandlerRegistry::new(topics, handlers));
    Arc::new(CdcEventListener::new(
        registry,
        Arc::new(CdcEventMetrics::new().unwrap()),
    ))
}

fn fast_redelivery() -> OrchestratorConfig {
    OrchestratorConfig {
        redelivery: RedeliveryPolicy::new(Duration::from_millis(10), Duration::from_millis(40)),
        ..OrchestratorConfig::default()
    }
}

fn post(partition: i32, offset: i64, id: i64, title: &str) -> ConsumedRecord {
    let body = format!(
        r#"{{"id":{},"title":"{}","content":"Body","author_id":7,"created_at":"2025-01-01T00:00:00Z","updated_at":"2025-01-01T00:00:00Z"}}"#,
        id, title
    );
    ConsumedRecord::new(TOPIC, partition, offset, body.into_bytes())
}

fn delete(partition: i32, offset: i64, id: i64) -> ConsumedRecord {
    let body = format!(r#"{{"id":{},"__deleted":"true"}}"#, id);
    ConsumedRecord::new(TOPIC, partition, offset, body.into_bytes())
}

#[tokio::test]
async fn test_orchestrator_full_integration() {
    let store = Arc::new(InMemoryDocumentStore::new());
    let consumer = Arc::new(MockConsumer::new(vec![
        post(0, 0, 1, "First"),
        post(1, 0, 2, "Second"),
        post(0, 1, 3, "Third"),
    ]));
    let orchestrator = Orchestrator::new(consumer.clone(), listener(store.clone()));

    let result = timeout(Duration::from_secs(5), orchestrator.run()).await;

    assert!(result.is_ok());
    assert!(result.unwrap().is_ok());
    assert_eq!(store.len("posts"), 3);
    assert_eq!(orchestrator.records_completed(), 3);
    assert_eq!(consumer.acknowledged().len(), 3);
}

#[tokio::test]
async fn test_create_then_delete_in_one_partition() {
    let store = Arc::new(InMemoryDocumentStore::new());
    let consumer = Arc::new(MockConsumer::new(vec![
        post(0, 10, 5, "Short lived"),
        post(0, 11, 5, "Edited"),
        delete(0, 12, 5),
    ]));
    let orchestrator = Orchestrator::new(consumer.clone(), listener(store.clone()));

    timeout(Duration::from_secs(5), orchestrator.run())
        .await
        .unwrap()
        .unwrap();

    assert!(store.get("5", "posts").await.unwrap().is_none());
    let offsets: Vec<i64> = consumer
        .acknowledged()
        .into_iter()
        .map(|(_, _, offset)| offset)
        .collect();
    assert_eq!(offsets, vec![10, 11, 12]);
}

#[tokio::test]
async fn test_drops_and_tombstones_are_acknowledged() {
    let store = Arc::new(InMemoryDocumentStore::new());
    let consumer = Arc::new(MockConsumer::new(vec![
        ConsumedRecord::new(TOPIC, 0, 0, b"{not json".to_vec()),
        ConsumedRecord::new(TOPIC, 0, 1, br#"{"title":"x","content":"y"}"#.to_vec()),
        ConsumedRecord::tombstone(TOPIC, 0, 2),
        ConsumedRecord::new("comments", 0, 0, br#"{"id":1}"#.to_vec()),
    ]));
    let orchestrator = Orchestrator::new(consumer.clone(), listener(store.clone()));

    timeout(Duration::from_secs(5), orchestrator.run())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(store.save_calls() + store.delete_calls(), 0);
    assert_eq!(consumer.acknowledged().len(), 4);
}

#[tokio::test]
async fn test_store_failure_is_redelivered() {
    let store = Arc::new(FlakyStore::failing(2));
    let consumer = Arc::new(MockConsumer::new(vec![post(0, 0, 1, "Retried")]));
    let listener = listener(store.clone());
    let orchestrator =
        Orchestrator::with_config(consumer.clone(), listener.clone(), fast_redelivery());

    timeout(Duration::from_secs(5), orchestrator.run())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(store.save_attempts.load(Ordering::SeqCst), 3);
    assert!(store.get("1", "posts").await.unwrap().is_some());
    assert_eq!(consumer.acknowledged(), vec![(TOPIC.to_string(), 0, 0)]);
    // One event, however many attempts it took.
    assert_eq!(listener.metrics().received_count(TOPIC), 1);
    assert_eq!(listener.metrics().dispatched_count(TOPIC), 1);
}

#[tokio::test]
async fn test_store_rejection_is_acknowledged_without_redelivery() {
    let store = Arc::new(InMemoryDocumentStore::new());
    let consumer = Arc::new(MockConsumer::new(vec![
        post(0, 0, 1, "Rejected"),
        post(0, 1, 2, "Rejected too"),
    ]));
    let listener = listener_for_index(store.clone(), "Posts");
    let orchestrator =
        Orchestrator::with_config(consumer.clone(), listener.clone(), fast_redelivery());

    timeout(Duration::from_secs(5), orchestrator.run())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(
        consumer.acknowledged(),
        vec![(TOPIC.to_string(), 0, 0), (TOPIC.to_string(), 0, 1)]
    );
    assert_eq!(store.save_calls(), 0);
    assert_eq!(listener.metrics().dropped_count(TOPIC, "store_rejected"), 2);
}

#[tokio::test]
async fn test_failing_record_blocks_only_its_partition() {
    let store = Arc::new(FlakyStore::failing(usize::MAX));
    let healthy = Arc::new(InMemoryDocumentStore::new());

    // Partition 0 keeps failing; a record on another topic with its own store proceeds.
    let topics = Arc::new(
        TopicHandlerMap::parse(&format!("{}=post-document,other=other-document", TOPIC)).unwrap(),
    );
    struct OtherHandler(PostDocumentHandler);
    #[async_trait]
    impl CdcEventHandler for OtherHandler {
        fn key(&self) -> &str {
            "other-document"
        }
        async fn handle(
            &self,
            event: &cdc_indexer::listener::CdcEvent,
        ) -> Result<cdc_indexer::handlers::Projection, cdc_indexer::handlers::HandlerError> {
            self.0.handle(event).await
        }
    }
    let handlers: Vec<Arc<dyn CdcEventHandler>> = vec![
        Arc::new(PostDocumentHandler::new(store.clone(), "posts")),
        Arc::new(OtherHandler(PostDocumentHandler::new(healthy.clone(), "posts"))),
    ];
    let listener = Arc::new(CdcEventListener::new(
        Arc::new(HandlerRegistry::new(topics, handlers)),
        Arc::new(CdcEventMetrics::new().unwrap()),
    ));

    let mut other = post(0, 0, 9, "Other");
    other.topic = "other".to_string();
    let consumer = Arc::new(MockConsumer::open(vec![post(0, 0, 1, "Stuck"), other]));
    let orchestrator = Arc::new(Orchestrator::with_config(
        consumer.clone(),
        listener,
        fast_redelivery(),
    ));

    let running = Arc::clone(&orchestrator);
    let handle = tokio::spawn(async move { running.run().await });

    timeout(Duration::from_secs(5), async {
        while healthy.is_empty("posts") {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    orchestrator.shutdown();
    let result = timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();

    assert!(result.is_ok());
    assert!(store.save_attempts.load(Ordering::SeqCst) >= 1);
    assert!(store.get("1", "posts").await.unwrap().is_none());
    assert_eq!(consumer.acknowledged(), vec![("other".to_string(), 0, 0)]);
}

#[tokio::test]
async fn test_orchestrator_configuration() {
    let store = Arc::new(InMemoryDocumentStore::new());
    let consumer = Arc::new(MockConsumer::new(vec![post(0, 0, 1, "Configured")]));

    let config = OrchestratorConfig {
        channel_buffer_size: 1,
        lane_buffer_size: 1,
        redelivery: RedeliveryPolicy::default(),
    };
    let orchestrator = Orchestrator::with_config(consumer, listener(store.clone()), config);

    timeout(Duration::from_secs(5), orchestrator.run())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(store.len("posts"), 1);
}

#[tokio::test]
async fn test_empty_stream() {
    let store = Arc::new(InMemoryDocumentStore::new());
    let consumer = Arc::new(MockConsumer::new(Vec::new()));
    let orchestrator = Orchestrator::new(consumer.clone(), listener(store.clone()));

    let result = timeout(Duration::from_secs(5), orchestrator.run()).await;
    assert!(result.is_ok());
    assert!(result.unwrap().is_ok());

    assert_eq!(store.save_calls(), 0);
    assert!(consumer.acknowledged().is_empty());
}

#[tokio::test]
async fn test_orchestrator_shutdown() {
    let store = Arc::new(InMemoryDocumentStore::new());
    let consumer = Arc::new(MockConsumer::open(vec![post(0, 0, 1, "Before shutdown")]));
    let orchestrator = Arc::new(Orchestrator::new(consumer, listener(store)));

    let shutdown_orchestrator = Arc::clone(&orchestrator);
    let shutdown_handle = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown_orchestrator.shutdown();
    });

    let run_orchestrator = Arc::clone(&orchestrator);
    let orchestrator_handle = tokio::spawn(async move { run_orchestrator.run().await });

    let (shutdown_result, orchestrator_result) = tokio::join!(shutdown_handle, orchestrator_handle);

    assert!(shutdown_result.is_ok(), "Shutdown task should succeed");
    let run_result = orchestrator_result.expect("Orchestrator task should succeed");
    assert!(run_result.is_ok(), "Orchestrator should complete successfully");
}

#[tokio::test]
async fn test_orchestrator_error_handling() {
    let store = Arc::new(InMemoryDocumentStore::new());
    let consumer = Arc::new(MockConsumer::with_subscribe_error());
    let orchestrator = Orchestrator::new(consumer, listener(store));

    let result = timeout(Duration::from_secs(5), orchestrator.run()).await;

    assert!(result.is_ok());
    assert!(matches!(result.unwrap(), Err(IngestError::KafkaError(_))));
}
