//! Health check handler.

use crate::models::HealthResponse;
use crate::routes::AppState;
use axum::extract::State;
use axum::Json;
use std::sync::Arc;
use tracing::instrument;

/// Liveness probe.
///
/// Pings the session store and reports the result. Always answers 200 so
/// the orchestrator sees the body.
///
/// ```json
/// {"status": "healthy", "database": "healthy"}
/// ```
#[instrument(skip_all, name = "game.health.check")]
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let (status, database) = match state.store.ping().await {
        Ok(()) => ("healthy", "healthy"),
        Err(e) => {
            tracing::warn!(target: "game.health", error = %e, "Session store ping failed");
            ("unhealthy", "unhealthy")
        }
    };

    Json(HealthResponse {
        status: status.to_string(),
        database: Some(database.to_string()),
    })
}
