//! Orchestrator module for the CDC indexer.
//!
//! Coordinates the consumer, the partition lanes and the listener.

mod lanes;

pub use lanes::RedeliveryPolicy;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{interval, Duration};
use tracing::{error, info, instrument, warn};

use crate::consumer::{Consumer, StreamMessage};
use crate::errors::IngestError;
use crate::listener::CdcEventListener;
use lanes::{Lane, LaneContext};

/// Configuration for the orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Size of the consumer to orchestrator channel buffer.
    pub channel_buffer_size: usize,
    /// Records buffered per partition lane.
    pub lane_buffer_size: usize,
    /// Backoff for records that failed with a store error.
    pub redelivery: RedeliveryPolicy,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            channel_buffer_size: 1000,
            lane_buffer_size: 100,
            redelivery: RedeliveryPolicy::default(),
        }
    }
}

/// Orchestrator that coordinates the ingest components.
///
/// The orchestrator:
/// - Subscribes the consumer and runs it in the background
/// - Routes each record to the lane of its partition
/// - Forwards lane acknowledgments back to the consumer for commit
/// - Handles shutdown signals
pub struct Orchestrator {
    consumer: Arc<dyn Consumer>,
    listener: Arc<CdcEventListener>,
    config: OrchestratorConfig,
    shutdown_tx: broadcast::Sender<()>,
    /// Records that reached a terminal state since startup.
    records_completed: Arc<AtomicU64>,
}

impl Orchestrator {
    /// Create a new orchestrator with the default configuration.
    pub fn new(consumer: Arc<dyn Consumer>, listener: Arc<CdcEventListener>) -> Self {
        Self::with_config(consumer, listener, OrchestratorConfig::default())
    }

    /// Create a new orchestrator with custom configuration.
    pub fn with_config(
        consumer: Arc<dyn Consumer>,
        listener: Arc<CdcEventListener>,
        config: OrchestratorConfig,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            consumer,
            listener,
            config,
            shutdown_tx,
            records_completed: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Run until the consumer's stream ends or a shutdown signal arrives.
    ///
    /// When the stream ends, queued records are finished before returning.
    /// On shutdown, lanes stop after their current record and anything not
    /// yet acknowledged is redelivered on restart.
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<(), IngestError> {
        info!("Starting CDC indexer orchestrator");

        self.consumer.subscribe()?;

        let (event_transmitter, mut event_receiver) =
            mpsc::channel::<StreamMessage>(self.config.channel_buffer_size);

        // Unbounded so a lane never blocks on the consumer while the consumer
        // is blocked sending to that lane.
        let (ack_transmitter, ack_receiver) = mpsc::unbounded_channel::<StreamMessage>();

        let consumer = Arc::clone(&self.consumer);
        let consumer_shutdown = self.shutdown_tx.subscribe();
        let consumer_handle = tokio::spawn(async move {
            if let Err(e) = consumer
                .run(event_transmitter, ack_receiver, consumer_shutdown)
                .await
            {
                error!(error = %e, "Consumer error");
            }
        });

        let context = LaneContext {
            listener: Arc::clone(&self.listener),
            acks: ack_transmitter,
            shutdown: self.shutdown_tx.clone(),
            redelivery: self.config.redelivery,
            records_completed: Arc::clone(&self.records_completed),
        };
        let mut lanes: HashMap<(String, i32), Lane> = HashMap::new();

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let signal_tx = self.shutdown_tx.clone();
        let signal_handle = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Received shutdown signal");
                let _ = signal_tx.send(());
            }
        });
        let mut progress_timer = interval(Duration::from_secs(10));
        progress_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        let metrics = Arc::clone(self.listener.metrics());
        let mut prev_received: u64 = 0;
        let mut prev_time = std::time::Instant::now();

        info!("Ready to process change events");

        loop {
            tokio::select! {
                msg = event_receiver.recv() => {
                    match msg {
                        Some(StreamMessage::Record(record)) => {
                            let key = (record.topic.clone(), record.partition);
                            let lane = lanes.entry(key).or_insert_with(|| {
                                Lane::spawn(
                                    &record.topic,
                                    record.partition,
                                    self.config.lane_buffer_size,
                                    context.clone(),
                                )
                            });

                            // A full lane applies backpressure, but must not hide a shutdown.
                            tokio::select! {
                                pushed = lane.push(record) => {
                                    if !pushed {
                                        warn!("Partition lane closed, record will be redelivered on restart");
                                    }
                                }
                                _ = shutdown_rx.recv() => {
                                    info!("Shutdown requested");
                                    break;
                                }
                            }
                        }
                        Some(StreamMessage::Error(e)) => {
                            error!(error = %e, "Received error from consumer");
                        }
                        Some(StreamMessage::End) | None => {
                            info!("Consumer stream ended");
                            break;
                        }
                        Some(StreamMessage::Acknowledgment { .. }) => {
                            warn!("Received acknowledgment on event channel (should be on ack channel)");
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown requested");
                    break;
                }
                _ = progress_timer.tick() => {
                    let received = metrics.total_received();
                    let now = std::time::Instant::now();
                    let elapsed_secs = now.duration_since(prev_time).as_secs_f64();

                    let events_per_sec = if elapsed_secs > 0.0 {
                        (received.saturating_sub(prev_received) as f64) / elapsed_secs
                    } else {
                        0.0
                    };

                    info!(
                        records_completed = self.records_completed.load(Ordering::Relaxed),
                        events_received = received,
                        events_dispatched = metrics.total_dispatched(),
                        events_per_sec = format!("{:.2}", events_per_sec),
                        active_lanes = lanes.len(),
                        "Processing progress"
                    );

                    prev_received = received;
                    prev_time = now;
                }
            }
        }

        // Lanes drain what they hold unless shutdown was signalled.
        for (_, lane) in lanes.drain() {
            lane.close().await;
        }
        drop(context);

        // Lanes are done, so every acknowledgment is queued before the consumer stops.
        drop(event_receiver);
        let _ = self.shutdown_tx.send(());
        let _ = consumer_handle.await;
        signal_handle.abort();

        info!(
            records_completed = self.records_completed.load(Ordering::Relaxed),
            events_received = metrics.total_received(),
            events_dispatched = metrics.total_dispatched(),
            "Orchestrator shutdown complete"
        );
        Ok(())
    }

    /// Trigger a graceful shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Number of records that reached a terminal state and were acknowledged.
    pub fn records_completed(&self) -> u64 {
        self.records_completed.load(Ordering::Relaxed)
    }
}
