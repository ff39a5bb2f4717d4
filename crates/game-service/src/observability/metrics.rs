//! Metrics definitions for the Game Service.
//!
//! All metrics follow Prometheus naming conventions:
//! - `game_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded:
//! - `method`: HTTP methods
//! - `endpoint`: the fixed route set plus `/other`
//! - `status`: success, error, timeout
//! - `permission`: READ, READ_WRITE
//! - `error_type`: bounded by `GameError` variants
//!
//! Game and user ids never appear in labels.

use metrics::counter;
use metrics::histogram;
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Histogram buckets for HTTP requests.
const HTTP_BUCKETS: &[f64] = &[
    0.005, 0.010, 0.025, 0.050, 0.100, 0.150, 0.200, 0.300, 0.500, 1.000, 2.000,
];

/// Histogram buckets for the join critical section plus publish.
const JOIN_BUCKETS: &[f64] = &[
    0.002, 0.005, 0.010, 0.020, 0.050, 0.100, 0.250, 0.500, 1.000, 5.000,
];

/// Builder with the service's histogram buckets applied.
///
/// # Errors
///
/// Returns error if a bucket configuration is rejected.
pub fn metrics_builder() -> Result<PrometheusBuilder, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("game_http_request".to_string()),
            HTTP_BUCKETS,
        )
        .map_err(|e| format!("Failed to set HTTP request buckets: {e}"))?
        .set_buckets_for_metric(Matcher::Prefix("game_join".to_string()), JOIN_BUCKETS)
        .map_err(|e| format!("Failed to set join buckets: {e}"))
}

/// Initialize the global Prometheus recorder and return the handle
/// for serving metrics via HTTP.
///
/// Must be called before any metrics are recorded.
///
/// # Errors
///
/// Returns error if the recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    metrics_builder()?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// HTTP Request Metrics
// ============================================================================

/// Record HTTP request completion.
///
/// Metric: `game_http_requests_total`, `game_http_request_duration_seconds`
/// Labels: `method`, `endpoint`, `status`
pub fn record_http_request(method: &str, endpoint: &str, status_code: u16, duration: Duration) {
    let normalized_endpoint = normalize_endpoint(endpoint);
    let status = categorize_status_code(status_code);

    histogram!("game_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status" => status
    )
    .record(duration.as_secs_f64());

    counter!("game_http_requests_total",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

fn categorize_status_code(status_code: u16) -> &'static str {
    match status_code {
        200..=299 => "success",
        408 | 504 => "timeout",
        _ => "error",
    }
}

/// Map a request path onto the fixed route set.
fn normalize_endpoint(path: &str) -> &'static str {
    match path.trim_end_matches('/') {
        "" => "/",
        "/health" => "/health",
        "/metrics" => "/metrics",
        "/games" => "/games",
        "/games/join" => "/games/join",
        _ => "/other",
    }
}

// ============================================================================
// Membership Metrics
// ============================================================================

/// Record a completed join.
///
/// Metric: `game_joins_total`, `game_join_duration_seconds`
/// Labels: `permission` (counter), `status` (histogram)
pub fn record_join_success(permission: &'static str, duration: Duration) {
    counter!("game_joins_total", "permission" => permission).increment(1);
    histogram!("game_join_duration_seconds", "status" => "success")
        .record(duration.as_secs_f64());
}

/// Record a failed join.
///
/// Metric: `game_join_failures_total`, `game_join_duration_seconds`
/// Labels: `error_type` (counter), `status` (histogram)
pub fn record_join_failure(error_type: &'static str, duration: Duration) {
    counter!("game_join_failures_total", "error_type" => error_type).increment(1);
    histogram!("game_join_duration_seconds", "status" => "error")
        .record(duration.as_secs_f64());
}

/// Record a cache miss that forced a snapshot rebuild from the store.
///
/// Metric: `game_cache_misses_total`
pub fn record_cache_miss() {
    counter!("game_cache_misses_total").increment(1);
}

/// Record a failed event publish.
///
/// Metric: `game_publish_failures_total`
pub fn record_publish_failure() {
    counter!("game_publish_failures_total").increment(1);
}

/// Record a join that asked for the opponent seat but found it taken by
/// the store's write-once guard.
///
/// Metric: `game_lost_opponent_races_total`
pub fn record_lost_opponent_race() {
    counter!("game_lost_opponent_races_total").increment(1);
}
