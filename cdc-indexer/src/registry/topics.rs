//! Subscription list derived from the routing table.

use std::sync::Arc;

use crate::config::TopicHandlerMap;

/// Supplies the topics the consumer subscribes to.
#[derive(Debug, Clone)]
pub struct TopicSupplier {
    topics: Arc<TopicHandlerMap>,
}

impl TopicSupplier {
    pub fn new(topics: Arc<TopicHandlerMap>) -> Self {
        Self { topics }
    }

    /// Every mapped topic. Never empty.
    pub fn topics(&self) -> Vec<String> {
        self.topics.topics().map(str::to_string).collect()
    }
}
