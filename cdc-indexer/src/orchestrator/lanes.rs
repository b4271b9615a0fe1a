//! Per-partition processing lanes.
//!
//! Each `(topic, partition)` gets its own task so partitions run in parallel
//! while records inside a partition keep their order.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::consumer::{ConsumedRecord, StreamMessage};
use crate::listener::{Admission, CdcEventListener};

/// Backoff applied when a record fails with a store error and is redelivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RedeliveryPolicy {
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RedeliveryPolicy {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
        }
    }
}

impl RedeliveryPolicy {
    /// Create a policy. `max_backoff` is raised to `initial_backoff` if lower.
    pub fn new(initial_backoff: Duration, max_backoff: Duration) -> Self {
        Self {
            initial_backoff,
            max_backoff: max_backoff.max(initial_backoff),
        }
    }

    /// The delay after `current`: doubled, capped at `max_backoff`.
    pub fn next_backoff(&self, current: Duration) -> Duration {
        current.saturating_mul(2).min(self.max_backoff)
    }
}

/// Shared state every lane needs.
#[derive(Clone)]
pub(crate) struct LaneContext {
    pub listener: Arc<CdcEventListener>,
    pub acks: mpsc::UnboundedSender<StreamMessage>,
    pub shutdown: broadcast::Sender<()>,
    pub redelivery: RedeliveryPolicy,
    pub records_completed: Arc<AtomicU64>,
}

/// Handle to a running lane.
pub(crate) struct Lane {
    sender: mpsc::Sender<ConsumedRecord>,
    handle: JoinHandle<()>,
}

impl Lane {
    /// Spawn a lane task for one partition.
    pub fn spawn(topic: &str, partition: i32, buffer: usize, context: LaneContext) -> Self {
        let (sender, receiver) = mpsc::channel(buffer);
        let shutdown = context.shutdown.subscribe();

        debug!(topic = %topic, partition = partition, "Starting partition lane");
        let handle = tokio::spawn(run_lane(receiver, shutdown, context));

        Self { sender, handle }
    }

    /// Queue a record. Waits while the lane's buffer is full.
    pub async fn push(&self, record: ConsumedRecord) -> bool {
        self.sender.send(record).await.is_ok()
    }

    /// Stop accepting records and wait for the lane to finish.
    pub async fn close(self) {
        drop(self.sender);
        if let Err(e) = self.handle.await {
            error!(error = %e, "Partition lane task failed");
        }
    }
}

async fn run_lane(
    mut receiver: mpsc::Receiver<ConsumedRecord>,
    mut shutdown: broadcast::Receiver<()>,
    context: LaneContext,
) {
    loop {
        let record = tokio::select! {
            biased;
            _ = shutdown.recv() => break,
            record = receiver.recv() => match record {
                Some(record) => record,
                None => break,
            },
        };

        if !deliver(&record, &mut shutdown, &context).await {
            info!(
                topic = %record.topic,
                partition = record.partition,
                offset = record.offset,
                "Lane stopped before record completed, it will be redelivered on restart"
            );
            break;
        }

        context.records_completed.fetch_add(1, Ordering::Relaxed);
        let _ = context.acks.send(StreamMessage::Acknowledgment {
            topic: record.topic,
            partition: record.partition,
            offset: record.offset,
        });
    }
}

/// Process one record until it reaches a terminal state.
///
/// The record is decoded and validated once; only dispatch is redelivered.
/// Returns `false` if shutdown arrived while waiting to redeliver.
async fn deliver(
    record: &ConsumedRecord,
    shutdown: &mut broadcast::Receiver<()>,
    context: &LaneContext,
) -> bool {
    let Some(payload) = record.payload.as_deref() else {
        debug!(
            topic = %record.topic,
            partition = record.partition,
            offset = record.offset,
            "Skipping tombstone"
        );
        return true;
    };

    let event = match context.listener.admit_bytes(&record.topic, payload) {
        Admission::Accepted(event) => event,
        Admission::Rejected(stage) => {
            debug!(
                topic = %record.topic,
                partition = record.partition,
                offset = record.offset,
                reason = stage.reason(),
                "Record dropped before dispatch"
            );
            return true;
        }
    };

    let mut backoff = context.redelivery.initial_backoff;
    let mut attempt: u32 = 1;

    loop {
        match context.listener.dispatch(&event).await {
            Ok(outcome) => {
                debug!(
                    topic = %record.topic,
                    partition = record.partition,
                    offset = record.offset,
                    outcome = ?outcome,
                    "Record completed"
                );
                return true;
            }
            Err(e) => {
                error!(
                    topic = %record.topic,
                    partition = record.partition,
                    offset = record.offset,
                    attempt = attempt,
                    retry_in_ms = backoff.as_millis() as u64,
                    error = %e,
                    "Document store call failed, redelivering record"
                );

                tokio::select! {
                    biased;
                    _ = shutdown.recv() => return false,
                    _ = tokio::time::sleep(backoff) => {}
                }

                backoff = context.redelivery.next_backoff(backoff);
                attempt = attempt.saturating_add(1);
            }
        }
    }
}
