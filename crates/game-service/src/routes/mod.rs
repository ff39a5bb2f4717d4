//! HTTP routes for the Game Service.
//!
//! Defines the Axum router and application state.

use crate::handlers;
use crate::middleware::http_metrics_middleware;
use crate::repositories::SessionStore;
use crate::services::MembershipCoordinator;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Membership coordinator (owns the cache and publisher).
    pub coordinator: Arc<MembershipCoordinator>,

    /// Session store, used directly by the health check.
    pub store: Arc<dyn SessionStore>,
}

/// Build the application routes.
///
/// - `/games` - create (POST) and list (GET)
/// - `/games/join` - join (POST)
/// - `/health` - liveness probe
/// - `/metrics` - Prometheus metrics
/// - TraceLayer for request logging
/// - HTTP metrics middleware
/// - 30 second request timeout
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let api_routes = Router::new()
        .route(
            "/games",
            post(handlers::create_game).get(handlers::list_games),
        )
        .route("/games/join", post(handlers::join_game))
        .route("/health", get(handlers::health_check))
        .with_state(state);

    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    // Layer order (bottom-to-top execution):
    // 1. TimeoutLayer (innermost)
    // 2. TraceLayer
    // 3. http_metrics_middleware (outermost, sees every response)
    api_routes
        .merge(metrics_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(middleware::from_fn(http_metrics_middleware))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::cache::mock::MockSessionCache;
    use crate::observability::metrics::metrics_builder;
    use crate::repositories::MockSessionStore;
    use crate::services::MockEventPublisher;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn test_router(store: MockSessionStore) -> Router {
        let store: Arc<dyn SessionStore> = Arc::new(store);
        let coordinator = Arc::new(MembershipCoordinator::new(
            store.clone(),
            Arc::new(MockSessionCache::new()),
            Arc::new(MockEventPublisher::accepting()),
            Duration::from_secs(1),
            Duration::from_secs(1),
        ));
        let state = Arc::new(AppState { coordinator, store });
        let handle = metrics_builder().unwrap().build_recorder().handle();
        build_routes(state, handle)
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[test]
    fn test_app_state_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<AppState>();
    }

    #[tokio::test]
    async fn test_create_game_returns_201_envelope() {
        let response = test_router(MockSessionStore::new())
            .oneshot(post_json(
                "/games",
                serde_json::json!({"owner_user_id": "u1"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        assert_eq!(body["message"], "Game created successfully");
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["owner_user_id"], "u1");
        assert_eq!(body["data"]["opponent_user_id"], serde_json::Value::Null);
    }

    #[tokio::test]
    async fn test_join_unknown_game_is_400_game_not_found() {
        let response = test_router(MockSessionStore::new())
            .oneshot(post_json(
                "/games/join",
                serde_json::json!({
                    "game_id": "00000000-0000-0000-0000-000000000001",
                    "user_id": "u2"
                }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(
            body,
            serde_json::json!({"message": "Game not found", "data": null, "success": false})
        );
    }

    #[tokio::test]
    async fn test_join_malformed_body_is_400() {
        let response = test_router(MockSessionStore::new())
            .oneshot(post_json("/games/join", serde_json::json!({"user_id": "u2"})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_store_failure_is_500() {
        let response = test_router(MockSessionStore::failing())
            .oneshot(
                Request::builder()
                    .uri("/games")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["message"], "An internal database error occurred");
    }

    #[tokio::test]
    async fn test_health_reports_store_status() {
        let response = test_router(MockSessionStore::failing())
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "unhealthy");
    }
}
