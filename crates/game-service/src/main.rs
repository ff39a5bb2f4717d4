//! Game Service
//!
//! Entry point for the Gameroom game service. Creates and lists games and
//! coordinates who joins them as opponent or spectator.

use game_service::cache::{InMemorySessionCache, RedisSessionCache, SessionCache};
use game_service::config::{Config, LogFormat};
use game_service::observability::metrics::init_metrics_recorder;
use game_service::repositories::{PgSessionStore, SessionStore};
use game_service::routes::{self, AppState};
use game_service::services::{
    CentrifugoPublisher, EventPublisher, LogEventPublisher, MembershipCoordinator,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Configuration is loaded before tracing so the log format is known.
    let config = Config::from_env().map_err(|e| {
        eprintln!("Failed to load configuration: {e}");
        e
    })?;

    init_tracing(config.log_format);

    info!("Starting Game Service");
    info!(
        bind_address = %config.bind_address,
        redis = config.redis_url.is_some(),
        publisher = config.publisher.is_some(),
        store_timeout_ms = config.store_timeout.as_millis() as u64,
        publish_timeout_ms = config.publish_timeout.as_millis() as u64,
        "Configuration loaded successfully"
    );

    let metrics_handle = init_metrics_recorder().map_err(|e| {
        error!("Failed to initialize metrics recorder: {}", e);
        e
    })?;

    info!("Connecting to database...");
    let db_url_with_timeout = add_query_timeout(&config.database_url, 5);
    let db_pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(5))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(&db_url_with_timeout)
        .await
        .map_err(|e| {
            error!("Failed to connect to database: {}", e);
            e
        })?;
    info!("Database connection established");

    let store: Arc<dyn SessionStore> = Arc::new(PgSessionStore::new(db_pool));

    let cache: Arc<dyn SessionCache> = match &config.redis_url {
        Some(redis_url) => {
            info!("Connecting to Redis...");
            let cache = RedisSessionCache::connect(redis_url).await?;
            cache.ping().await?;
            info!("Redis connection established");
            Arc::new(cache)
        }
        None => {
            warn!("REDIS_URL not set; membership snapshots are kept in process memory");
            Arc::new(InMemorySessionCache::new())
        }
    };

    let publisher: Arc<dyn EventPublisher> = match &config.publisher {
        Some(publisher_config) => {
            info!(api_url = %publisher_config.api_url, "Publishing join events to Centrifugo");
            Arc::new(CentrifugoPublisher::new(
                publisher_config,
                config.publish_timeout,
            )?)
        }
        None => {
            warn!("CENTRIFUGO_API_URL not set; join events are only logged");
            Arc::new(LogEventPublisher)
        }
    };

    let coordinator = Arc::new(MembershipCoordinator::new(
        store.clone(),
        cache,
        publisher,
        config.store_timeout,
        config.publish_timeout,
    ));

    let bind_address = config.bind_address;

    let state = Arc::new(AppState { coordinator, store });

    let app = routes::build_routes(state, metrics_handle);

    let addr: SocketAddr = bind_address.parse().map_err(|e| {
        error!("Invalid bind address: {}", e);
        e
    })?;

    info!("Game Service listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Game Service shutdown complete");

    Ok(())
}

/// Install the global tracing subscriber.
fn init_tracing(log_format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "game_service=debug,tower_http=debug".into());

    match log_format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init(),
    }
}

/// Listens for shutdown signals (SIGTERM, SIGINT).
/// Returns when a shutdown signal is received and the drain period is complete.
async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, starting graceful shutdown..."),
            Err(e) => error!("Failed to listen for SIGINT: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, starting graceful shutdown...");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    let drain_secs: u64 = std::env::var("GAME_DRAIN_SECONDS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(10);

    if drain_secs > 0 {
        warn!("Draining connections for {} seconds...", drain_secs);
        tokio::time::sleep(Duration::from_secs(drain_secs)).await;
        info!("Drain period complete");
    } else {
        info!("Skipping drain period (GAME_DRAIN_SECONDS=0)");
    }
}

/// Adds statement_timeout to the database URL so queries cannot hang.
fn add_query_timeout(url: &str, timeout_secs: u32) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    format!(
        "{}{}options=-c%20statement_timeout%3D{}s",
        url, separator, timeout_secs
    )
}
