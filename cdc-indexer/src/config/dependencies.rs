//! Dependency initialization and wiring for the CDC indexer.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

use cdc_indexer_repository::{DocumentStore, OpenSearchConfig, OpenSearchStore};

use crate::config::{ConnectionMode, Settings};
use crate::consumer::KafkaConsumer;
use crate::handlers::{CdcEventHandler, PostDocumentHandler};
use crate::listener::CdcEventListener;
use crate::metrics::CdcEventMetrics;
use crate::orchestrator::{Orchestrator, OrchestratorConfig};
use crate::registry::{HandlerRegistry, TopicSupplier};
use crate::IndexingError;

/// Container for all initialized dependencies.
pub struct Dependencies {
    /// The configured orchestrator ready to run.
    pub orchestrator: Orchestrator,
    /// Pipeline counters, shared with the metrics endpoint.
    pub metrics: Arc<CdcEventMetrics>,
    /// The settings the dependencies were built from.
    pub settings: Settings,
}

impl Dependencies {
    /// Initialize all dependencies from environment variables.
    ///
    /// See [`Settings::from_env`] for the variables read.
    ///
    /// # Returns
    ///
    /// * `Ok(Dependencies)` - Initialized dependencies
    /// * `Err(IndexingError)` - If initialization fails (OpenSearch only in fail-fast mode)
    pub async fn new() -> Result<Self, IndexingError> {
        Self::from_settings(Settings::from_env()?).await
    }

    /// Initialize all dependencies from explicit settings.
    pub async fn from_settings(settings: Settings) -> Result<Self, IndexingError> {
        info!(
            topics = ?settings.topic_handlers.topics().collect::<Vec<_>>(),
            opensearch_url = %settings.opensearch.url,
            kafka_broker = %settings.kafka.broker,
            kafka_group_id = %settings.kafka.group_id,
            connection_mode = ?settings.connection_mode,
            retry_interval_secs = settings.retry_interval.as_secs(),
            posts_index = %settings.posts_index,
            "Initializing dependencies"
        );

        let metrics = Arc::new(
            CdcEventMetrics::new()
                .map_err(|e| IndexingError::config(format!("Failed to register metrics: {}", e)))?,
        );

        let store: Arc<dyn DocumentStore> = Arc::new(
            Self::connect_to_opensearch(
                &settings.opensearch,
                settings.connection_mode,
                settings.retry_interval,
            )
            .await?,
        );

        info!("OpenSearch connection established");

        let topic_map = Arc::new(settings.topic_handlers.clone());
        let handlers: Vec<Arc<dyn CdcEventHandler>> = vec![Arc::new(PostDocumentHandler::new(
            store,
            settings.posts_index.clone(),
        ))];
        let registry = Arc::new(HandlerRegistry::new(Arc::clone(&topic_map), handlers));
        let listener = Arc::new(CdcEventListener::new(registry, Arc::clone(&metrics)));

        let consumer = KafkaConsumer::new(&settings.kafka, &TopicSupplier::new(topic_map))
            .map_err(|e| {
                IndexingError::config(format!("Failed to create Kafka consumer: {}", e))
            })?;

        info!("Kafka consumer created");

        let orchestrator = Orchestrator::with_config(
            Arc::new(consumer),
            listener,
            OrchestratorConfig {
                redelivery: settings.redelivery,
                ..OrchestratorConfig::default()
            },
        );

        Ok(Self {
            orchestrator,
            metrics,
            settings,
        })
    }

    /// Connect to OpenSearch with retry logic based on connection mode.
    async fn connect_to_opensearch(
        config: &OpenSearchConfig,
        mode: ConnectionMode,
        retry_interval: Duration,
    ) -> Result<OpenSearchStore, IndexingError> {
        loop {
            match OpenSearchStore::new(config).await {
                Ok(store) => return Ok(store),
                Err(e) => match mode {
                    ConnectionMode::FailFast => {
                        return Err(IndexingError::config(format!(
                            "Failed to connect to OpenSearch: {}",
                            e
                        )));
                    }
                    ConnectionMode::Retry => {
                        warn!(
                            opensearch_url = %config.url,
                            error = %e,
                            retry_interval_secs = retry_interval.as_secs(),
                            "Failed to connect to OpenSearch, retrying..."
                        );
                        sleep(retry_interval).await;
                    }
                },
            }
        }
    }
}
