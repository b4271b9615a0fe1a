//! Consumer module for the CDC indexer.
//!
//! Provides the transport abstraction and its Kafka implementation.

mod kafka_consumer;
mod messages;

pub use kafka_consumer::{ConsumerConfig, KafkaConsumer};
pub use messages::{ConsumedRecord, StreamMessage};

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc};

use crate::errors::IngestError;

/// A source of change records with offset acknowledgment.
#[async_trait]
pub trait Consumer: Send + Sync {
    /// Subscribe to the configured topics.
    fn subscribe(&self) -> Result<(), IngestError>;

    /// Forward records to `sender` until shutdown or end of stream.
    ///
    /// Acknowledgments arrive on `ack_receiver` in per-partition order; the
    /// consumer commits the offset after each one.
    async fn run(
        &self,
        sender: mpsc::Sender<StreamMessage>,
        ack_receiver: mpsc::UnboundedReceiver<StreamMessage>,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), IngestError>;
}
