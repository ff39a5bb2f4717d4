//! Redis-backed membership cache.
//!
//! # Key Patterns
//!
//! - `game:{id}:membership` - Membership snapshot (JSON string)
//! - `game:{id}:lock` - Per-game lock holder token (string, `PX` expiry)
//!
//! # Connection Pattern
//!
//! `MultiplexedConnection` is cheap to clone and safe to use concurrently,
//! so each operation clones it instead of locking.

use super::{lua_scripts, SessionCache};
use crate::errors::GameError;
use crate::models::MembershipSnapshot;
use ::redis::aio::MultiplexedConnection;
use ::redis::{AsyncCommands, Client, Script};
use async_trait::async_trait;
use common::types::GameId;
use std::time::Duration;
use tracing::{debug, error, instrument, warn};
use uuid::Uuid;

/// Redis key holding a game's membership snapshot.
pub fn membership_key(id: GameId) -> String {
    format!("game:{id}:membership")
}

/// Redis key holding a game's lock token.
pub fn lock_key(id: GameId) -> String {
    format!("game:{id}:lock")
}

/// Membership cache stored in Redis.
#[derive(Clone)]
pub struct RedisSessionCache {
    connection: MultiplexedConnection,
    release_lock_script: Script,
}

impl RedisSessionCache {
    /// Connect to Redis.
    ///
    /// # Errors
    ///
    /// Returns `GameError::Cache` if the client cannot be opened or the
    /// connection fails.
    pub async fn connect(redis_url: &str) -> Result<Self, GameError> {
        let client = Client::open(redis_url).map_err(|e| {
            // The URL may carry credentials; never log it.
            error!(target: "game.cache.redis", error = %e, "Failed to open Redis client");
            GameError::Cache(format!("Failed to open Redis client: {e}"))
        })?;

        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| {
                error!(target: "game.cache.redis", error = %e, "Failed to connect to Redis");
                GameError::Cache(format!("Failed to connect to Redis: {e}"))
            })?;

        Ok(Self {
            connection,
            release_lock_script: Script::new(lua_scripts::RELEASE_LOCK),
        })
    }

    /// Check connectivity.
    pub async fn ping(&self) -> Result<(), GameError> {
        let mut conn = self.connection.clone();
        let _: String = ::redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}

#[async_trait]
impl SessionCache for RedisSessionCache {
    #[instrument(skip_all, fields(game_id = %id))]
    async fn save(&self, id: GameId, snapshot: &MembershipSnapshot) -> Result<(), GameError> {
        let json = serde_json::to_string(snapshot).map_err(|e| {
            error!(target: "game.cache.redis", error = %e, "Failed to serialize snapshot");
            GameError::Cache(format!("serialization failed: {e}"))
        })?;

        let mut conn = self.connection.clone();
        conn.set::<_, _, ()>(membership_key(id), json)
            .await
            .map_err(|e| {
                warn!(target: "game.cache.redis", error = %e, game_id = %id, "Failed to save snapshot");
                GameError::Cache(format!("Failed to save snapshot: {e}"))
            })?;

        debug!(target: "game.cache.redis", game_id = %id, "Saved membership snapshot");
        Ok(())
    }

    #[instrument(skip_all, fields(game_id = %id))]
    async fn retrieve(&self, id: GameId) -> Result<Option<MembershipSnapshot>, GameError> {
        let mut conn = self.connection.clone();

        let result: Option<String> = conn.get(membership_key(id)).await.map_err(|e| {
            warn!(target: "game.cache.redis", error = %e, game_id = %id, "Failed to read snapshot");
            GameError::Cache(format!("Failed to read snapshot: {e}"))
        })?;

        match result {
            Some(json) => {
                let snapshot = serde_json::from_str(&json).map_err(|e| {
                    error!(
                        target: "game.cache.redis",
                        error = %e,
                        game_id = %id,
                        "Failed to deserialize snapshot"
                    );
                    GameError::Cache(format!("Failed to deserialize snapshot: {e}"))
                })?;
                Ok(Some(snapshot))
            }
            None => Ok(None),
        }
    }

    #[instrument(skip_all, fields(game_id = %id))]
    async fn try_lock(&self, id: GameId, ttl: Duration) -> Result<Option<String>, GameError> {
        let mut conn = self.connection.clone();
        let token = Uuid::new_v4().to_string();
        let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1);

        // SET NX replies OK when taken and nil when already held.
        let reply: Option<String> = ::redis::cmd("SET")
            .arg(lock_key(id))
            .arg(&token)
            .arg("NX")
            .arg("PX")
            .arg(ttl_ms)
            .query_async(&mut conn)
            .await
            .map_err(|e| {
                warn!(target: "game.cache.redis", error = %e, game_id = %id, "Failed to take game lock");
                GameError::Cache(format!("Failed to take game lock: {e}"))
            })?;

        Ok(reply.map(|_| token))
    }

    #[instrument(skip_all, fields(game_id = %id))]
    async fn unlock(&self, id: GameId, token: &str) -> Result<(), GameError> {
        let mut conn = self.connection.clone();

        let released: i64 = self
            .release_lock_script
            .key(lock_key(id))
            .arg(token)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| {
                warn!(target: "game.cache.redis", error = %e, game_id = %id, "Failed to release game lock");
                GameError::Cache(format!("Failed to release game lock: {e}"))
            })?;

        if released == 0 {
            warn!(target: "game.cache.redis", game_id = %id, "Game lock expired before release");
        }
        Ok(())
    }
}
