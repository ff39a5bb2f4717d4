//! Test server harness for E2E testing
//!
//! Provides `TestGameServer` for spawning real Game Service instances in
//! tests. Collaborators are the in-crate mocks, so no database, Redis or
//! Centrifugo is needed.

use crate::fixtures::{create_game_body, join_game_body};
use game_service::cache::mock::MockSessionCache;
use game_service::config::Config;
use game_service::models::{ApiResponse, GameSession};
use game_service::observability::metrics::metrics_builder;
use game_service::repositories::{MockSessionStore, SessionStore};
use game_service::routes::{self, AppState};
use game_service::services::{MembershipCoordinator, MockEventPublisher};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Test harness for spawning the Game Service in E2E tests.
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_health() -> Result<(), anyhow::Error> {
///     let server = TestGameServer::spawn().await?;
///     let response = reqwest::get(format!("{}/health", server.url())).await?;
///     assert_eq!(response.status(), 200);
///     Ok(())
/// }
/// ```
pub struct TestGameServer {
    addr: SocketAddr,
    store: Arc<MockSessionStore>,
    cache: Arc<MockSessionCache>,
    publisher: Arc<MockEventPublisher>,
    client: reqwest::Client,
    _handle: JoinHandle<()>,
}

impl TestGameServer {
    /// Spawn a server with an empty store and an accepting publisher.
    pub async fn spawn() -> Result<Self, anyhow::Error> {
        Self::spawn_with(MockSessionStore::new(), MockEventPublisher::accepting()).await
    }

    /// Spawn a server over the given store and publisher.
    ///
    /// The server binds to a random port (127.0.0.1:0) and runs in the
    /// background until the harness is dropped.
    pub async fn spawn_with(
        store: MockSessionStore,
        publisher: MockEventPublisher,
    ) -> Result<Self, anyhow::Error> {
        let vars = HashMap::from([
            (
                "DATABASE_URL".to_string(),
                "postgresql://test/test".to_string(),
            ),
            ("BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string()),
            ("STORE_TIMEOUT_MS".to_string(), "2000".to_string()),
            ("PUBLISH_TIMEOUT_MS".to_string(), "2000".to_string()),
        ]);

        let config = Config::from_vars(&vars)
            .map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))?;

        let store = Arc::new(store);
        let cache = Arc::new(MockSessionCache::new());
        let publisher = Arc::new(publisher);

        let coordinator = Arc::new(MembershipCoordinator::new(
            store.clone(),
            cache.clone(),
            publisher.clone(),
            config.store_timeout,
            config.publish_timeout,
        ));

        let state = Arc::new(AppState {
            coordinator,
            store: store.clone() as Arc<dyn SessionStore>,
        });

        // Local recorder handle; nothing is installed globally.
        let metrics_handle = metrics_builder()
            .map_err(|e| anyhow::anyhow!(e))?
            .build_recorder()
            .handle();

        let app = routes::build_routes(state, metrics_handle);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        let handle = tokio::spawn(async move {
            let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
            if let Err(e) = axum::serve(listener, make_service).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            store,
            cache,
            publisher,
            client: reqwest::Client::new(),
            _handle: handle,
        })
    }

    /// Get the base URL of the test server.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Get the socket address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// The session store behind the server.
    pub fn store(&self) -> &MockSessionStore {
        &self.store
    }

    /// The membership cache behind the server.
    pub fn cache(&self) -> &MockSessionCache {
        &self.cache
    }

    /// The publisher behind the server.
    pub fn publisher(&self) -> &MockEventPublisher {
        &self.publisher
    }

    /// `POST /games` and return the created session.
    pub async fn create_game(&self, owner: &str) -> Result<GameSession, anyhow::Error> {
        let response = self
            .client
            .post(format!("{}/games", self.url()))
            .json(&create_game_body(owner))
            .send()
            .await?;

        if response.status() != reqwest::StatusCode::CREATED {
            anyhow::bail!("create_game returned {}", response.status());
        }

        let body: ApiResponse<GameSession> = response.json().await?;
        body.data
            .ok_or_else(|| anyhow::anyhow!("create_game response had no data"))
    }

    /// `POST /games/join` and return the raw response.
    pub async fn join(
        &self,
        game_id: &str,
        user_id: &str,
    ) -> Result<reqwest::Response, anyhow::Error> {
        Ok(self
            .client
            .post(format!("{}/games/join", self.url()))
            .json(&join_game_body(game_id, user_id))
            .send()
            .await?)
    }
}

impl Drop for TestGameServer {
    fn drop(&mut self) {
        self._handle.abort();
    }
}
