//! Membership coordinator.
//!
//! Decides whether a joining user takes the single opponent seat or becomes
//! a spectator, keeps the durable session and the cached snapshot in step,
//! and announces the join on the game's channel.
//!
//! # Ordering
//!
//! 1. Per-game lock: in-process first, then the cache's shared lock.
//! 2. Store read, cache read, role decision.
//! 3. Store write before cache write, so the store never lags the cache.
//! 4. Locks released, then publish.
//!
//! The shared lock serializes the snapshot read-modify-write across service
//! instances that use one cache. It expires after a few store timeouts, so a
//! crashed holder only blocks the game until then. The store's opponent
//! column is write-once as well: a join that asked for the seat and got back
//! someone else's id becomes a spectator.

use crate::cache::SessionCache;
use crate::errors::GameError;
use crate::models::{
    GameSession, JoinEvent, JoinOutcome, MembershipSnapshot, NewGameSession, Permission,
    SessionUpdate,
};
use crate::observability::metrics;
use crate::repositories::SessionStore;
use crate::services::publisher::EventPublisher;
use crate::services::session_locks::SessionLocks;
use common::types::{GameId, UserId};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

/// Pause between attempts to take a game's shared lock.
const SHARED_LOCK_RETRY_INTERVAL: Duration = Duration::from_millis(10);

/// Shared lock lifetime, in store timeouts. Covers the four bounded calls a
/// join makes while holding it.
const SHARED_LOCK_TTL_FACTOR: u32 = 5;

/// Coordinates game creation and joins over the store, cache and publisher.
pub struct MembershipCoordinator {
    store: Arc<dyn SessionStore>,
    cache: Arc<dyn SessionCache>,
    publisher: Arc<dyn EventPublisher>,
    locks: SessionLocks,
    store_timeout: Duration,
    publish_timeout: Duration,
}

impl MembershipCoordinator {
    /// Create a coordinator.
    ///
    /// `store_timeout` bounds each store call, cache call and lock wait;
    /// `publish_timeout` bounds each publish.
    pub fn new(
        store: Arc<dyn SessionStore>,
        cache: Arc<dyn SessionCache>,
        publisher: Arc<dyn EventPublisher>,
        store_timeout: Duration,
        publish_timeout: Duration,
    ) -> Self {
        Self {
            store,
            cache,
            publisher,
            locks: SessionLocks::new(),
            store_timeout,
            publish_timeout,
        }
    }

    /// Create a game and seed its membership snapshot.
    ///
    /// # Errors
    ///
    /// Store and cache failures are returned as infrastructure errors. If
    /// the cache write fails the game still exists; the first join rebuilds
    /// the snapshot.
    #[instrument(skip_all, name = "game.membership.create", fields(owner_user_id = %new_game.owner_user_id))]
    pub async fn create_game(&self, new_game: NewGameSession) -> Result<GameSession, GameError> {
        let session = self
            .bounded("session_store.create", self.store.create(&new_game))
            .await?;

        let snapshot = MembershipSnapshot::seed(session.owner_user_id.clone());
        self.bounded("session_cache.save", self.cache.save(session.id, &snapshot))
            .await?;

        info!(
            target: "game.services.membership",
            game_id = %session.id,
            "Game created"
        );

        Ok(session)
    }

    /// List every game, newest first.
    #[instrument(skip_all, name = "game.membership.list")]
    pub async fn list_games(&self) -> Result<Vec<GameSession>, GameError> {
        self.bounded("session_store.fetch_all", self.store.fetch_all())
            .await
    }

    /// Join `user_id` to `game_id`.
    ///
    /// Returns the session as stored after the join together with the
    /// snapshot and the permission granted.
    ///
    /// # Errors
    ///
    /// - `GameError::NotFound` if the game does not exist. Nothing is
    ///   mutated and nothing is published.
    /// - `GameError::BadRequest` if the user owns the game.
    /// - Infrastructure errors for store, cache, publish and timeout
    ///   failures. Mutations made before a failed publish are kept.
    #[instrument(skip_all, name = "game.membership.join", fields(game_id = %game_id, user_id = %user_id))]
    pub async fn join(&self, game_id: GameId, user_id: UserId) -> Result<JoinOutcome, GameError> {
        let start = Instant::now();
        let result = self.join_and_publish(game_id, &user_id).await;

        match &result {
            Ok(outcome) => {
                metrics::record_join_success(outcome.permission.as_str(), start.elapsed());
            }
            Err(e) => {
                metrics::record_join_failure(e.label(), start.elapsed());
            }
        }

        result
    }

    async fn join_and_publish(
        &self,
        game_id: GameId,
        user_id: &UserId,
    ) -> Result<JoinOutcome, GameError> {
        let outcome = {
            let _guard = tokio::time::timeout(self.store_timeout, self.locks.acquire(game_id))
                .await
                .map_err(|_| GameError::Timeout("session_locks.acquire".to_string()))?;
            let token = self.acquire_shared_lock(game_id).await?;

            let decided = self.decide_and_apply(game_id, user_id).await;
            self.release_shared_lock(game_id, &token).await;
            decided?
        };

        let event = JoinEvent::join_game(user_id.clone(), outcome.permission);
        let published =
            tokio::time::timeout(self.publish_timeout, self.publisher.publish(game_id, &event))
                .await
                .map_err(|_| GameError::Timeout("publisher.publish".to_string()))
                .and_then(|r| r);

        if let Err(e) = published {
            metrics::record_publish_failure();
            warn!(
                target: "game.services.membership",
                error = %e,
                permission = outcome.permission.as_str(),
                "Join applied but event publish failed"
            );
            return Err(e);
        }

        info!(
            target: "game.services.membership",
            permission = outcome.permission.as_str(),
            "User joined game"
        );

        Ok(outcome)
    }

    /// Read-decide-write. Caller holds the game's lock.
    async fn decide_and_apply(
        &self,
        game_id: GameId,
        user_id: &UserId,
    ) -> Result<JoinOutcome, GameError> {
        let mut session = self
            .bounded("session_store.fetch_one", self.store.fetch_one(game_id))
            .await?
            .ok_or_else(|| GameError::NotFound("Game not found".to_string()))?;

        if session.owner_user_id == *user_id {
            return Err(GameError::BadRequest(
                "Game owner cannot join their own game".to_string(),
            ));
        }

        let (mut snapshot, mut snapshot_dirty) = match self
            .bounded("session_cache.retrieve", self.cache.retrieve(game_id))
            .await?
        {
            Some(snapshot) => (snapshot, false),
            None => {
                metrics::record_cache_miss();
                warn!(
                    target: "game.services.membership",
                    "Membership snapshot missing; rebuilding from store"
                );
                (MembershipSnapshot::from_session(&session), true)
            }
        };

        if session.opponent_user_id.as_ref() == Some(user_id) {
            snapshot_dirty |= heal_opponent(&mut snapshot, &session);
            if snapshot_dirty {
                self.save_snapshot(game_id, &snapshot).await?;
            }
            debug!(target: "game.services.membership", "Opponent rejoined");
            return Ok(JoinOutcome {
                session,
                snapshot,
                permission: Permission::ReadWrite,
            });
        }

        if session.opponent_user_id.is_none() && snapshot.game_opponent_user_id.is_none() {
            let updated = self
                .bounded(
                    "session_store.update",
                    self.store
                        .update(game_id, &SessionUpdate::assign_opponent(user_id.clone())),
                )
                .await?;

            if updated.opponent_user_id.as_ref() == Some(user_id) {
                snapshot.game_opponent_user_id = Some(user_id.clone());
                snapshot.spectators.retain(|s| s != user_id);
                self.save_snapshot(game_id, &snapshot).await?;

                return Ok(JoinOutcome {
                    session: updated,
                    snapshot,
                    permission: Permission::ReadWrite,
                });
            }

            metrics::record_lost_opponent_race();
            warn!(
                target: "game.services.membership",
                "Opponent seat taken concurrently; joining as spectator"
            );
            session = updated;
        }

        snapshot_dirty |= heal_opponent(&mut snapshot, &session);
        snapshot_dirty |= snapshot.add_spectator(user_id);
        if snapshot_dirty {
            self.save_snapshot(game_id, &snapshot).await?;
        }

        Ok(JoinOutcome {
            session,
            snapshot,
            permission: Permission::Read,
        })
    }

    /// Take the cache's lock for `game_id`, polling until the store timeout.
    async fn acquire_shared_lock(&self, game_id: GameId) -> Result<String, GameError> {
        let ttl = self.store_timeout * SHARED_LOCK_TTL_FACTOR;
        let acquire = async {
            loop {
                if let Some(token) = self.cache.try_lock(game_id, ttl).await? {
                    return Ok::<_, GameError>(token);
                }
                tokio::time::sleep(SHARED_LOCK_RETRY_INTERVAL).await;
            }
        };

        tokio::time::timeout(self.store_timeout, acquire)
            .await
            .map_err(|_| GameError::Timeout("session_cache.lock".to_string()))?
    }

    /// Release failures only delay other joins until the lock expires.
    async fn release_shared_lock(&self, game_id: GameId, token: &str) {
        let released = self
            .bounded("session_cache.unlock", self.cache.unlock(game_id, token))
            .await;
        if let Err(e) = released {
            warn!(
                target: "game.services.membership",
                error = %e,
                "Failed to release shared game lock"
            );
        }
    }

    async fn save_snapshot(
        &self,
        game_id: GameId,
        snapshot: &MembershipSnapshot,
    ) -> Result<(), GameError> {
        self.bounded("session_cache.save", self.cache.save(game_id, snapshot))
            .await
    }

    /// Run a store or cache call under the store timeout.
    async fn bounded<T, F>(&self, operation: &'static str, fut: F) -> Result<T, GameError>
    where
        F: Future<Output = Result<T, GameError>>,
    {
        tokio::time::timeout(self.store_timeout, fut)
            .await
            .map_err(|_| GameError::Timeout(operation.to_string()))?
    }
}

/// Copy the store's opponent into the snapshot. Returns `true` if it changed.
///
/// Only a recorded opponent is copied; the store is never used to clear one.
fn heal_opponent(snapshot: &mut MembershipSnapshot, session: &GameSession) -> bool {
    match &session.opponent_user_id {
        Some(opponent) if snapshot.game_opponent_user_id.as_ref() != Some(opponent) => {
            snapshot.game_opponent_user_id = Some(opponent.clone());
            snapshot.spectators.retain(|s| s != opponent);
            true
        }
        _ => false,
    }
}
