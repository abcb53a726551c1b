//! HTTP query endpoint serving aggregator snapshots
//!
//! One read-only route returning a fresh snapshot on every request, plus a
//! health probe for container orchestration. Safe to call concurrently and
//! arbitrarily often; the handler takes the aggregator lock only for the
//! duration of the snapshot.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::aggregator::{MetricsAggregator, Snapshot};

/// Shared state for the query routes.
#[derive(Clone)]
pub struct AppState {
    pub metrics: Arc<MetricsAggregator>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/metrics", get(metrics_endpoint))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn metrics_endpoint(State(state): State<AppState>) -> Json<Snapshot> {
    Json(state.metrics.snapshot())
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Bind and serve the query endpoint until the token is cancelled.
pub async fn serve(
    state: AppState,
    host: String,
    port: u16,
    cancel: CancellationToken,
) -> Result<(), anyhow::Error> {
    let listener = TcpListener::bind((host.as_str(), port)).await?;
    info!("query endpoint listening on {}", listener.local_addr()?);

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await?;

    info!("query endpoint stopped");
    Ok(())
}
