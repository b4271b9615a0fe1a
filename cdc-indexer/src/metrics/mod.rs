//! Counters for the CDC pipeline.
//!
//! Every counter is labelled by topic. Counter names are a stable contract for
//! dashboards and alerts.

mod server;

pub use server::{create_app, run_server};

use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

const RECEIVED: &str = "cdc_events_received_total";
const INVALID: &str = "cdc_events_invalid_total";
const DISPATCHED: &str = "cdc_events_dispatched_total";
const DROPPED: &str = "cdc_events_dropped_total";

/// Collects pipeline counters in its own registry.
///
/// All methods take `&self` and are safe to call from concurrent lanes.
#[derive(Clone)]
pub struct CdcEventMetrics {
    registry: Registry,
    received: IntCounterVec,
    invalid: IntCounterVec,
    dispatched: IntCounterVec,
    dropped: IntCounterVec,
}

impl CdcEventMetrics {
    /// Create the counters and register them in a fresh registry.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let received = IntCounterVec::new(
            Opts::new(
                RECEIVED,
                "Change events decoded with a non-empty payload",
            ),
            &["topic"],
        )?;
        let invalid = IntCounterVec::new(
            Opts::new(
                INVALID,
                "Change events rejected by structural validation",
            ),
            &["topic", "reason"],
        )?;
        let dispatched = IntCounterVec::new(
            Opts::new(
                DISPATCHED,
                "Change events that returned from a resolved handler",
            ),
            &["topic"],
        )?;
        let dropped = IntCounterVec::new(
            Opts::new(
                DROPPED,
                "Change events dropped outside validation",
            ),
            &["topic", "reason"],
        )?;

        registry.register(Box::new(received.clone()))?;
        registry.register(Box::new(invalid.clone()))?;
        registry.register(Box::new(dispatched.clone()))?;
        registry.register(Box::new(dropped.clone()))?;

        Ok(Self {
            registry,
            received,
            invalid,
            dispatched,
            dropped,
        })
    }

    pub fn on_received(&self, topic: &str) {
        self.received.with_label_values(&[topic]).inc();
    }

    pub fn on_invalid(&self, topic: &str, reason: &str) {
        self.invalid.with_label_values(&[topic, reason]).inc();
    }

    pub fn on_dispatched(&self, topic: &str) {
        self.dispatched.with_label_values(&[topic]).inc();
    }

    pub fn on_dropped(&self, topic: &str, reason: &str) {
        self.dropped.with_label_values(&[topic, reason]).inc();
    }

    pub fn received_count(&self, topic: &str) -> u64 {
        self.counter_value(RECEIVED, &[("topic", topic)])
    }

    pub fn invalid_count(&self, topic: &str, reason: &str) -> u64 {
        self.counter_value(INVALID, &[("topic", topic), ("reason", reason)])
    }

    pub fn dispatched_count(&self, topic: &str) -> u64 {
        self.counter_value(DISPATCHED, &[("topic", topic)])
    }

    pub fn dropped_count(&self, topic: &str, reason: &str) -> u64 {
        self.counter_value(DROPPED, &[("topic", topic), ("reason", reason)])
    }

    /// Sum of `dispatched` across every topic seen so far.
    pub fn total_dispatched(&self) -> u64 {
        self.counter_value(DISPATCHED, &[])
    }

    /// Sum of `received` across every topic seen so far.
    pub fn total_received(&self) -> u64 {
        self.counter_value(RECEIVED, &[])
    }

    /// Sum of the series in family `name` matching every `labels` pair.
    ///
    /// Reads a gathered snapshot, so asking about an unseen label set does
    /// not create a zero-valued series.
    fn counter_value(&self, name: &str, labels: &[(&str, &str)]) -> u64 {
        self.registry
            .gather()
            .iter()
            .filter(|family| family.get_name() == name)
            .flat_map(|family| family.get_metric())
            .filter(|metric| {
                labels.iter().all(|(key, value)| {
                    metric
                        .get_label()
                        .iter()
                        .any(|pair| pair.get_name() == *key && pair.get_value() == *value)
                })
            })
            .map(|metric| metric.get_counter().get_value() as u64)
            .sum()
    }

    /// The registry holding the pipeline counters.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Render all counters in the Prometheus text exposition format.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
