//! CDC Indexer Main Entry Point
//!
//! Consumes change events from Kafka and keeps the OpenSearch indices in sync.

use cdc_indexer::metrics::{create_app, run_server};
use cdc_indexer::{Dependencies, IndexingError};
use dotenv::dotenv;
use std::env;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// `LOG_FORMAT=json` selects structured output; anything else is pretty.
fn is_json_format(log_format: Option<&str>) -> bool {
    log_format.is_some_and(|format| format.trim().eq_ignore_ascii_case("json"))
}

/// Initialize tracing/logging.
fn init_tracing() -> Result<(), IndexingError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("cdc_indexer=info,cdc_indexer_repository=info"));

    let json_output = is_json_format(env::var("LOG_FORMAT").ok().as_deref());

    if json_output {
        // Structured output for log shippers
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true),
            )
            .try_init()
            .map_err(|e| IndexingError::config(format!("Failed to initialize tracing: {}", e)))?;

        info!(
            service_name = "cdc-indexer",
            service_version = env!("CARGO_PKG_VERSION"),
            "Tracing initialized with JSON format"
        );
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_target(true).pretty())
            .try_init()
            .map_err(|e| IndexingError::config(format!("Failed to initialize tracing: {}", e)))?;

        info!(
            service_name = "cdc-indexer",
            service_version = env!("CARGO_PKG_VERSION"),
            "Tracing initialized with console output"
        );
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), IndexingError> {
    // Load environment variables from .env file
    dotenv().ok();

    init_tracing()?;

    info!("Starting CDC indexer");

    let deps = match Dependencies::new().await {
        Ok(deps) => {
            info!("Dependencies initialized successfully");
            deps
        }
        Err(e) => {
            error!(error = %e, "Failed to initialize dependencies");
            return Err(e);
        }
    };

    if let Some(addr) = deps.settings.metrics_addr {
        let app = create_app(deps.metrics.clone());
        tokio::spawn(async move {
            if let Err(e) = run_server(app, addr).await {
                error!(error = %e, "Metrics endpoint stopped");
            }
        });
    } else {
        info!("Metrics endpoint disabled");
    }

    match deps.orchestrator.run().await {
        Ok(()) => {
            info!("CDC indexer stopped");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "CDC indexer failed");
            Err(e.into())
        }
    }
}
