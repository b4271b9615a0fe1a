//! HTTP endpoint exposing the pipeline counters.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

use crate::errors::IngestError;
use crate::metrics::CdcEventMetrics;

/// Build the router serving `/metrics` and `/health`.
pub fn create_app(metrics: Arc<CdcEventMetrics>) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_check))
        .with_state(metrics)
}

/// Serve `app` on `addr` until the process exits.
pub async fn run_server(app: Router, addr: SocketAddr) -> Result<(), IngestError> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| IngestError::server(format!("Failed to bind {}: {}", addr, e)))?;

    info!(addr = %addr, "Metrics endpoint listening");

    axum::serve(listener, app)
        .await
        .map_err(|e| IngestError::server(e.to_string()))
}

async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

async fn metrics_handler(State(metrics): State<Arc<CdcEventMetrics>>) -> Response {
    match metrics.render() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}
