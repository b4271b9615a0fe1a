//! Kafka consumer implementation for the CDC indexer.
//!
//! Reads change records from the subscribed topics and forwards them to the
//! orchestrator. Offsets are committed only after the orchestrator
//! acknowledges a record.

use async_trait::async_trait;
use futures::StreamExt;
use rdkafka::{
    config::ClientConfig,
    consumer::{CommitMode, Consumer as _, StreamConsumer},
    message::Message as KafkaMessage,
    Offset, TopicPartitionList,
};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, instrument};

use crate::consumer::messages::{ConsumedRecord, StreamMessage};
use crate::consumer::Consumer;
use crate::errors::IngestError;
use crate::registry::TopicSupplier;

/// Connection settings for the Kafka consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerConfig {
    /// Kafka broker address (e.g., "localhost:9092")
    pub broker: String,
    /// Consumer group ID
    pub group_id: String,
    /// SASL username (enables SASL/SSL if set)
    pub username: Option<String>,
    /// SASL password (required if username is set)
    pub password: Option<String>,
    /// Custom CA certificate in PEM format
    pub ssl_ca_pem: Option<String>,
}

impl ConsumerConfig {
    /// Create a plaintext config for `broker` and `group_id`.
    pub fn new(broker: impl Into<String>, group_id: impl Into<String>) -> Self {
        Self {
            broker: broker.into(),
            group_id: group_id.into(),
            username: None,
            password: None,
            ssl_ca_pem: None,
        }
    }

    /// Set SASL credentials.
    pub fn with_credentials(mut self, username: String, password: String) -> Self {
        self.username = Some(username);
        self.password = Some(password);
        self
    }

    /// Set custom CA certificate.
    pub fn with_ssl_ca(mut self, ca_pem: String) -> Self {
        self.ssl_ca_pem = Some(ca_pem);
        self
    }

    /// Build the librdkafka client configuration.
    ///
    /// Auto commit is disabled; offsets are committed on acknowledgment.
    pub fn client_config(&self) -> ClientConfig {
        let mut client_config = ClientConfig::new();

        client_config
            .set("bootstrap.servers", &self.broker)
            .set("group.id", &self.group_id)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest")
            .set("session.timeout.ms", "6000");

        // SASL/SSL for managed Kafka, plaintext otherwise
        if let (Some(username), Some(password)) = (&self.username, &self.password) {
            client_config
                .set("security.protocol", "SASL_SSL")
                .set("sasl.mechanisms", "PLAIN")
                .set("sasl.username", username)
                .set("sasl.password", password);

            if let Some(ca_pem) = &self.ssl_ca_pem {
                client_config.set("ssl.ca.pem", ca_pem);
            }
        }

        client_config
    }
}

/// Kafka consumer for change records.
pub struct KafkaConsumer {
    consumer: StreamConsumer,
    topics: Vec<String>,
}

impl KafkaConsumer {
    /// Create a consumer for the topics `supplier` lists.
    pub fn new(config: &ConsumerConfig, supplier: &TopicSupplier) -> Result<Self, IngestError> {
        let consumer: StreamConsumer = config.client_config().create()?;
        let topics = supplier.topics();

        info!(
            broker = %config.broker,
            group_id = %config.group_id,
            sasl = config.username.is_some(),
            topic_count = topics.len(),
            "Created Kafka consumer"
        );

        Ok(Self { consumer, topics })
    }

    /// Commit the position after `offset`.
    fn commit(&self, topic: &str, partition: i32, offset: i64) -> Result<(), IngestError> {
        let mut tpl = TopicPartitionList::new();
        tpl.add_partition_offset(topic, partition, Offset::Offset(offset + 1))?;
        self.consumer.commit(&tpl, CommitMode::Async)?;
        Ok(())
    }

    fn commit_acknowledged(&self, topic: &str, partition: i32, offset: i64) {
        match self.commit(topic, partition, offset) {
            Ok(()) => debug!(
                topic = %topic,
                partition = partition,
                offset = offset,
                "Committed offset after acknowledgment"
            ),
            Err(e) => error!(
                topic = %topic,
                partition = partition,
                offset = offset,
                error = %e,
                "Failed to commit offset after acknowledgment"
            ),
        }
    }
}

#[async_trait]
impl Consumer for KafkaConsumer {
    fn subscribe(&self) -> Result<(), IngestError> {
        let topics: Vec<&str> = self.topics.iter().map(|s| s.as_str()).collect();
        self.consumer.subscribe(&topics)?;

        info!(topics = ?self.topics, "Subscribed to Kafka topics");
        Ok(())
    }

    #[instrument(skip(self, sender, ack_receiver, shutdown))]
    async fn run(
        &self,
        sender: mpsc::Sender<StreamMessage>,
        mut ack_receiver: mpsc::UnboundedReceiver<StreamMessage>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), IngestError> {
        let mut message_stream = self.consumer.stream();

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("Consumer received shutdown signal");
                    while let Ok(StreamMessage::Acknowledgment { topic, partition, offset }) =
                        ack_receiver.try_recv()
                    {
                        self.commit_acknowledged(&topic, partition, offset);
                    }
                    // Unacknowledged records are re-read from the last committed offset on restart
                    let _ = sender.try_send(StreamMessage::End);
                    break;
                }
                ack_msg = ack_receiver.recv() => {
                    match ack_msg {
                        Some(StreamMessage::Acknowledgment { topic, partition, offset }) => {
                            self.commit_acknowledged(&topic, partition, offset);
                        }
                        Some(StreamMessage::End) | None => {
                            info!("Acknowledgment channel closed");
                            break;
                        }
                        _ => {
                            // Ignore other message types
                        }
                    }
                }
                message = message_stream.next() => {
                    match message {
                        Some(Ok(msg)) => {
                            debug!(
                                topic = %msg.topic(),
                                partition = msg.partition(),
                                offset = msg.offset(),
                                "Received message from Kafka"
                            );

                            // Tombstones still pass through the partition lane so that
                            // their commit cannot overtake an earlier in-flight record.
                            let record = match msg.payload() {
                                Some(payload) => ConsumedRecord::new(
                                    msg.topic(),
                                    msg.partition(),
                                    msg.offset(),
                                    payload.to_vec(),
                                ),
                                None => ConsumedRecord::tombstone(
                                    msg.topic(),
                                    msg.partition(),
                                    msg.offset(),
                                ),
                            };

                            sender
                                .send(StreamMessage::Record(record))
                                .await
                                .map_err(|e| IngestError::channel(e.to_string()))?;
                        }
                        Some(Err(e)) => {
                            error!(error = %e, "Kafka error");
                            let _ = sender.send(StreamMessage::Error(e.to_string())).await;
                        }
                        None => {
                            info!("Kafka stream ended");
                            let _ = sender.send(StreamMessage::End).await;
                            break;
                        }
                    }
                }
            }
        }

        Ok(())
    }
}
