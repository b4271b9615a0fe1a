//! Environment-driven service settings.

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

use cdc_indexer_repository::config::DEFAULT_OPENSEARCH_URL;
use cdc_indexer_repository::{validate_index_name, OpenSearchConfig};
use cdc_indexer_shared::POSTS_INDEX;

use crate::config::TopicHandlerMap;
use crate::consumer::ConsumerConfig;
use crate::handlers::POST_DOCUMENT_HANDLER_KEY;
use crate::orchestrator::RedeliveryPolicy;
use crate::IndexingError;

/// Topic the CDC connector publishes `posts` rows to.
const DEFAULT_POSTS_TOPIC: &str = "posts.posts.posts";

/// Default Kafka broker address.
const DEFAULT_KAFKA_BROKER: &str = "localhost:9092";

/// Default Kafka consumer group ID.
const DEFAULT_KAFKA_GROUP_ID: &str = "search-service-group";

/// Default connection retry interval in seconds.
const DEFAULT_RETRY_INTERVAL_SECS: u64 = 15;

/// Default metrics listen address.
const DEFAULT_METRICS_ADDR: &str = "0.0.0.0:9464";

/// Connection mode for OpenSearch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionMode {
    /// Fail immediately if connection fails.
    FailFast,
    /// Retry the connection until it succeeds.
    Retry,
}

impl ConnectionMode {
    /// Parse a connection mode.
    ///
    /// Valid values: "fail-fast" or "retry" (case-insensitive).
    /// Defaults to "retry" if unset or invalid.
    fn parse(raw: Option<&str>) -> Self {
        match raw.unwrap_or("retry").to_lowercase().as_str() {
            "fail-fast" | "failfast" | "fail_fast" => Self::FailFast,
            "retry" => Self::Retry,
            other => {
                warn!(value = %other, "Invalid OPENSEARCH_CONNECTION_MODE, defaulting to 'retry'");
                Self::Retry
            }
        }
    }
}

/// Everything the service reads from its environment.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Topic routing table, also the subscription list.
    pub topic_handlers: TopicHandlerMap,
    /// Kafka consumer connection.
    pub kafka: ConsumerConfig,
    /// OpenSearch connection.
    pub opensearch: OpenSearchConfig,
    pub connection_mode: ConnectionMode,
    pub retry_interval: Duration,
    /// Index the post handler writes to.
    pub posts_index: String,
    /// Where to serve `/metrics`. `None` disables the endpoint.
    pub metrics_addr: Option<SocketAddr>,
    pub redelivery: RedeliveryPolicy,
}

impl Settings {
    /// Read settings from process environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `CDC_TOPIC_HANDLERS`: `topic=handler-key` pairs, comma separated
    ///   (default: posts.posts.posts=post-document)
    /// - `KAFKA_BROKER`: Kafka broker address (default: localhost:9092)
    /// - `KAFKA_GROUP_ID`: Consumer group ID (default: search-service-group)
    /// - `KAFKA_USERNAME` / `KAFKA_PASSWORD` / `KAFKA_SSL_CA_PEM`: SASL/SSL (optional)
    /// - `OPENSEARCH_URL`: OpenSearch server URL (default: http://localhost:9200)
    /// - `OPENSEARCH_USERNAME` / `OPENSEARCH_PASSWORD`: basic auth (optional)
    /// - `OPENSEARCH_CONNECTION_MODE`: "fail-fast" or "retry" (default: retry)
    /// - `OPENSEARCH_RETRY_INTERVAL_SECS`: Retry interval in seconds (default: 15)
    /// - `POSTS_INDEX`: Post index name (default: posts)
    /// - `METRICS_ADDR`: Metrics listen address, or "off" (default: 0.0.0.0:9464)
    /// - `REDELIVERY_INITIAL_BACKOFF_MS` / `REDELIVERY_MAX_BACKOFF_MS`: store
    ///   failure backoff (default: 500 / 30000)
    pub fn from_env() -> Result<Self, IndexingError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read settings through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, IndexingError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let topic_handlers = match var("CDC_TOPIC_HANDLERS") {
            Some(raw) => TopicHandlerMap::parse(&raw)?,
            None => TopicHandlerMap::new([(DEFAULT_POSTS_TOPIC, POST_DOCUMENT_HANDLER_KEY)])?,
        };

        let kafka = ConsumerConfig {
            broker: var("KAFKA_BROKER").unwrap_or_else(|| DEFAULT_KAFKA_BROKER.to_string()),
            group_id: var("KAFKA_GROUP_ID").unwrap_or_else(|| DEFAULT_KAFKA_GROUP_ID.to_string()),
            username: var("KAFKA_USERNAME"),
            password: var("KAFKA_PASSWORD"),
            ssl_ca_pem: var("KAFKA_SSL_CA_PEM"),
        };

        let mut opensearch = OpenSearchConfig::new(
            var("OPENSEARCH_URL").unwrap_or_else(|| DEFAULT_OPENSEARCH_URL.to_string()),
        );
        if let (Some(username), Some(password)) =
            (var("OPENSEARCH_USERNAME"), var("OPENSEARCH_PASSWORD"))
        {
            opensearch = opensearch.with_credentials(username, password);
        }

        let connection_mode = ConnectionMode::parse(var("OPENSEARCH_CONNECTION_MODE").as_deref());
        let retry_interval = Duration::from_secs(parse_or(
            var("OPENSEARCH_RETRY_INTERVAL_SECS"),
            "OPENSEARCH_RETRY_INTERVAL_SECS",
            DEFAULT_RETRY_INTERVAL_SECS,
        )?);

        let metrics_addr = match var("METRICS_ADDR").as_deref().map(str::trim) {
            Some(off) if off.eq_ignore_ascii_case("off") => None,
            Some(addr) => Some(parse_addr(addr)?),
            None => Some(parse_addr(DEFAULT_METRICS_ADDR)?),
        };

        let defaults = RedeliveryPolicy::default();
        let redelivery = RedeliveryPolicy::new(
            Duration::from_millis(parse_or(
                var("REDELIVERY_INITIAL_BACKOFF_MS"),
                "REDELIVERY_INITIAL_BACKOFF_MS",
                defaults.initial_backoff.as_millis() as u64,
            )?),
            Duration::from_millis(parse_or(
                var("REDELIVERY_MAX_BACKOFF_MS"),
                "REDELIVERY_MAX_BACKOFF_MS",
                defaults.max_backoff.as_millis() as u64,
            )?),
        );

        let posts_index = var("POSTS_INDEX").unwrap_or_else(|| POSTS_INDEX.to_string());
        validate_index_name(&posts_index)
            .map_err(|e| IndexingError::config(format!("Invalid POSTS_INDEX: {}", e)))?;

        Ok(Self {
            topic_handlers,
            kafka,
            opensearch,
            connection_mode,
            retry_interval,
            posts_index,
            metrics_addr,
            redelivery,
        })
    }
}

fn parse_or<T: FromStr>(raw: Option<String>, key: &str, default: T) -> Result<T, IndexingError> {
    match raw {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| IndexingError::config(format!("Invalid {}: '{}'", key, value))),
        None => Ok(default),
    }
}

fn parse_addr(raw: &str) -> Result<SocketAddr, IndexingError> {
    raw.parse()
        .map_err(|e| IndexingError::config(format!("Invalid METRICS_ADDR '{}': {}", raw, e)))
}
