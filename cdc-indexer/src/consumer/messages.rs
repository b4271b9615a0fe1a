//! Message types for the consumer.
//!
//! Defines what flows between the consumer and the orchestrator.

/// One record read from a topic partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumedRecord {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    /// Raw message body. `None` for tombstones.
    pub payload: Option<Vec<u8>>,
}

impl ConsumedRecord {
    /// A record carrying a message body.
    pub fn new(topic: impl Into<String>, partition: i32, offset: i64, payload: Vec<u8>) -> Self {
        Self {
            topic: topic.into(),
            partition,
            offset,
            payload: Some(payload),
        }
    }

    /// A record without a body.
    pub fn tombstone(topic: impl Into<String>, partition: i32, offset: i64) -> Self {
        Self {
            topic: topic.into(),
            partition,
            offset,
            payload: None,
        }
    }
}

/// Messages that flow through the ingest.
#[derive(Debug)]
pub enum StreamMessage {
    /// A record to process.
    Record(ConsumedRecord),
    /// A record has reached a terminal state and its offset may be committed.
    Acknowledgment {
        topic: String,
        partition: i32,
        offset: i64,
    },
    /// Stream has ended.
    End,
    /// An error occurred.
    Error(String),
}
