//! Prometheus metrics endpoint handler.
//!
//! Unauthenticated so Prometheus can scrape it. Labels carry no game or
//! user identifiers.

use axum::{extract::State, response::IntoResponse};
use metrics_exporter_prometheus::PrometheusHandle;

/// Handler for GET /metrics
///
/// Returns the Prometheus text exposition format:
/// ```text
/// # TYPE game_joins_total counter
/// game_joins_total{permission="READ_WRITE"} 12
/// ```
#[tracing::instrument(skip_all, name = "game.metrics.scrape")]
pub async fn metrics_handler(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    handle.render()
}
