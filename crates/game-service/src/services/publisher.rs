//! Membership event publishing.
//!
//! [`EventPublisher`] delivers a [`JoinEvent`] to subscribers of a game's
//! channel. Delivery is best effort: the coordinator has already committed
//! its mutations when it publishes, and nothing here retries.
//!
//! Implementations:
//! - [`CentrifugoPublisher`] - Centrifugo HTTP server API (`/api/publish`)
//! - [`LogEventPublisher`] - logs the event; used when no transport is configured
//! - [`mock::MockEventPublisher`] - records events for tests

use crate::config::PublisherConfig;
use crate::errors::GameError;
use crate::models::JoinEvent;
use async_trait::async_trait;
use common::secret::{ExposeSecret, SecretString};
use common::types::GameId;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Contract for delivering membership events.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish `event` on the channel named after `channel`.
    async fn publish(&self, channel: GameId, event: &JoinEvent) -> Result<(), GameError>;
}

/// Body of a Centrifugo publish request.
#[derive(Debug, Serialize)]
struct PublishRequest<'a> {
    channel: String,
    data: &'a JoinEvent,
}

/// Centrifugo reports API errors in a 200 response body.
#[derive(Debug, Deserialize)]
struct PublishResponse {
    #[serde(default)]
    error: Option<CentrifugoError>,
}

#[derive(Debug, Deserialize)]
struct CentrifugoError {
    code: u32,
    message: String,
}

/// Publisher backed by the Centrifugo HTTP API.
pub struct CentrifugoPublisher {
    http_client: reqwest::Client,
    publish_url: String,
    api_key: SecretString,
}

impl CentrifugoPublisher {
    /// Create a publisher for the configured Centrifugo server.
    ///
    /// # Errors
    ///
    /// Returns `GameError::Internal` if the HTTP client cannot be built.
    pub fn new(config: &PublisherConfig, timeout: Duration) -> Result<Self, GameError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                tracing::error!(target: "game.publisher", error = %e, "Failed to build HTTP client");
                GameError::Internal
            })?;

        Ok(Self {
            http_client,
            publish_url: format!("{}/api/publish", config.api_url),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl EventPublisher for CentrifugoPublisher {
    #[instrument(skip_all, fields(channel = %channel, permission = event.permission.as_str()))]
    async fn publish(&self, channel: GameId, event: &JoinEvent) -> Result<(), GameError> {
        let request = PublishRequest {
            channel: channel.to_string(),
            data: event,
        };

        let response = self
            .http_client
            .post(&self.publish_url)
            .header("X-API-Key", self.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                warn!(target: "game.publisher", error = %e, "Failed to reach Centrifugo");
                GameError::Publish(format!("Failed to reach Centrifugo: {e}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(target: "game.publisher", status = %status, "Centrifugo rejected publish");
            return Err(GameError::Publish(format!(
                "Centrifugo returned status {status}"
            )));
        }

        let body: PublishResponse = response.json().await.map_err(|e| {
            warn!(target: "game.publisher", error = %e, "Invalid Centrifugo response");
            GameError::Publish(format!("Invalid Centrifugo response: {e}"))
        })?;

        if let Some(error) = body.error {
            warn!(
                target: "game.publisher",
                code = error.code,
                message = %error.message,
                "Centrifugo reported publish error"
            );
            return Err(GameError::Publish(format!(
                "Centrifugo error {}: {}",
                error.code, error.message
            )));
        }

        Ok(())
    }
}

/// Publisher that only logs events.
#[derive(Debug, Default)]
pub struct LogEventPublisher;

#[async_trait]
impl EventPublisher for LogEventPublisher {
    async fn publish(&self, channel: GameId, event: &JoinEvent) -> Result<(), GameError> {
        info!(
            target: "game.publisher",
            channel = %channel,
            event = %event.event,
            permission = event.permission.as_str(),
            name = %event.name,
            "Join event (no transport configured)"
        );
        Ok(())
    }
}

/// Mock publisher for testing.
pub mod mock {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Mutex, PoisonError};

    /// Records every publish call.
    #[derive(Default)]
    pub struct MockEventPublisher {
        events: Mutex<Vec<(GameId, JoinEvent)>>,
        return_error: AtomicBool,
    }

    impl MockEventPublisher {
        /// Publisher that accepts every event.
        pub fn accepting() -> Self {
            Self::default()
        }

        /// Publisher that fails every call (calls are still recorded).
        pub fn failing() -> Self {
            let publisher = Self::default();
            publisher.return_error.store(true, Ordering::SeqCst);
            publisher
        }

        /// Events published so far, in call order.
        pub fn events(&self) -> Vec<(GameId, JoinEvent)> {
            self.events
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }

        /// Number of publish calls made.
        pub fn call_count(&self) -> usize {
            self.events
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .len()
        }
    }

    #[async_trait]
    impl EventPublisher for MockEventPublisher {
        async fn publish(&self, channel: GameId, event: &JoinEvent) -> Result<(), GameError> {
            self.events
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push((channel, event.clone()));

            if self.return_error.load(Ordering::SeqCst) {
                return Err(GameError::Publish("Mock publisher error".to_string()));
            }
            Ok(())
        }
    }
}
