//! Topic to handler routing.
//!
//! The registry and its topic map are built once at startup and only read
//! afterwards, so lanes share them without locking.

mod topics;

pub use topics::TopicSupplier;

use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::TopicHandlerMap;
use crate::handlers::{CdcEventHandler, HandlerError, Projection};
use crate::listener::CdcEvent;

/// Why an event could not be applied by the registry.
#[derive(Debug, Error)]
pub enum RoutingError {
    /// No handler key is configured for the topic.
    #[error("Unsupported topic '{topic}'")]
    UnsupportedTopic { topic: String },

    /// The topic is mapped to a key no handler is registered under.
    #[error("Topic '{topic}' is mapped to unknown handler key '{key}'")]
    UnknownHandlerKey { topic: String, key: String },

    /// The resolved handler failed or dropped the event.
    #[error(transparent)]
    Handler(#[from] HandlerError),
}

/// Resolves topics to projection handlers.
pub struct HandlerRegistry {
    topics: Arc<TopicHandlerMap>,
    handlers: HashMap<String, Arc<dyn CdcEventHandler>>,
}

impl HandlerRegistry {
    /// Register `handlers` under their keys.
    ///
    /// A later handler with an already registered key replaces the earlier one.
    /// Mapped keys without a handler are reported here and again per event.
    pub fn new(topics: Arc<TopicHandlerMap>, handlers: Vec<Arc<dyn CdcEventHandler>>) -> Self {
        let mut by_key: HashMap<String, Arc<dyn CdcEventHandler>> = HashMap::new();
        for handler in handlers {
            let key = handler.key().to_string();
            if by_key.insert(key.clone(), handler).is_some() {
                warn!(handler_key = %key, "Duplicate handler key, keeping the last registration");
            }
        }

        for key in topics.handler_keys() {
            if !by_key.contains_key(key) {
                warn!(handler_key = %key, "Topic handler mapping references an unregistered handler");
            }
        }

        info!(
            topics = topics.len(),
            handlers = by_key.len(),
            "Handler registry initialized"
        );

        Self {
            topics,
            handlers: by_key,
        }
    }

    /// Find the handler for a topic.
    pub fn resolve(&self, topic: &str) -> Result<&Arc<dyn CdcEventHandler>, RoutingError> {
        let key = self
            .topics
            .handler_key(topic)
            .ok_or_else(|| RoutingError::UnsupportedTopic {
                topic: topic.to_string(),
            })?;

        self.handlers
            .get(key)
            .ok_or_else(|| RoutingError::UnknownHandlerKey {
                topic: topic.to_string(),
                key: key.to_string(),
            })
    }

    /// Route `event` from `topic` to its handler and apply it.
    pub async fn handle(&self, topic: &str, event: &CdcEvent) -> Result<Projection, RoutingError> {
        let handler = self.resolve(topic)?;
        Ok(handler.handle(event).await?)
    }

    /// The routing table this registry was built from.
    pub fn topic_map(&self) -> &Arc<TopicHandlerMap> {
        &self.topics
    }
}
