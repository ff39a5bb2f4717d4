//! Ephemeral membership cache.
//!
//! One [`MembershipSnapshot`] per game id. Snapshot reads and writes carry no
//! TTL and no compare-and-set. Instances that share a cache serialize their
//! read-modify-write of a snapshot with the per-game lock exposed here
//! ([`SessionCache::try_lock`] / [`SessionCache::unlock`]).
//!
//! Implementations:
//! - [`RedisSessionCache`] - shared across service instances
//! - [`InMemorySessionCache`] - process-local, used when no Redis is configured
//! - [`mock::MockSessionCache`] - counters and failure injection for tests

mod lua_scripts;
pub mod redis;

pub use self::redis::RedisSessionCache;

use crate::errors::GameError;
use crate::models::MembershipSnapshot;
use async_trait::async_trait;
use common::types::GameId;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Contract for the membership snapshot cache.
#[async_trait]
pub trait SessionCache: Send + Sync {
    /// Upsert the snapshot for a game, replacing it wholesale.
    async fn save(&self, id: GameId, snapshot: &MembershipSnapshot) -> Result<(), GameError>;

    /// Load the snapshot for a game, if cached.
    async fn retrieve(&self, id: GameId) -> Result<Option<MembershipSnapshot>, GameError>;

    /// Try to take the game's lock for `ttl`.
    ///
    /// Returns the holder token on success and `None` while another holder
    /// has it. An expired lock is free.
    async fn try_lock(&self, id: GameId, ttl: Duration) -> Result<Option<String>, GameError>;

    /// Release the game's lock if `token` still holds it.
    async fn unlock(&self, id: GameId, token: &str) -> Result<(), GameError>;
}

/// Held lock: holder token and expiry.
struct HeldLock {
    token: String,
    expires_at: Instant,
}

/// Process-local snapshot cache.
///
/// Contents are lost on restart, same as an evicted Redis entry.
#[derive(Default)]
pub struct InMemorySessionCache {
    entries: RwLock<HashMap<GameId, MembershipSnapshot>>,
    // Never held across an await.
    locks: Mutex<HashMap<GameId, HeldLock>>,
}

impl InMemorySessionCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionCache for InMemorySessionCache {
    async fn save(&self, id: GameId, snapshot: &MembershipSnapshot) -> Result<(), GameError> {
        self.entries.write().await.insert(id, snapshot.clone());
        Ok(())
    }

    async fn retrieve(&self, id: GameId) -> Result<Option<MembershipSnapshot>, GameError> {
        Ok(self.entries.read().await.get(&id).cloned())
    }

    async fn try_lock(&self, id: GameId, ttl: Duration) -> Result<Option<String>, GameError> {
        let now = Instant::now();
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);

        if locks.get(&id).is_some_and(|held| held.expires_at > now) {
            return Ok(None);
        }

        let token = Uuid::new_v4().to_string();
        locks.insert(
            id,
            HeldLock {
                token: token.clone(),
                expires_at: now + ttl,
            },
        );
        Ok(Some(token))
    }

    async fn unlock(&self, id: GameId, token: &str) -> Result<(), GameError> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if locks.get(&id).is_some_and(|held| held.token == token) {
            locks.remove(&id);
        }
        Ok(())
    }
}

/// Mock session cache for testing.
pub mod mock {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// In-memory cache with call counters and failure switches.
    ///
    /// Several coordinators sharing one `Arc<MockSessionCache>` behave like
    /// service instances sharing one Redis.
    #[derive(Default)]
    pub struct MockSessionCache {
        inner: InMemorySessionCache,
        fail_saves: AtomicBool,
        fail_reads: AtomicBool,
        read_delay: Option<Duration>,
        save_count: AtomicUsize,
        retrieve_count: AtomicUsize,
        lock_count: AtomicUsize,
    }

    impl MockSessionCache {
        pub fn new() -> Self {
            Self::default()
        }

        /// Sleep after each `retrieve`, widening read-modify-write windows.
        pub fn with_read_delay(mut self, delay: Duration) -> Self {
            self.read_delay = Some(delay);
            self
        }

        /// Make subsequent `save` calls fail.
        pub fn fail_saves(&self, fail: bool) {
            self.fail_saves.store(fail, Ordering::SeqCst);
        }

        /// Make subsequent `retrieve` calls fail.
        pub fn fail_reads(&self, fail: bool) {
            self.fail_reads.store(fail, Ordering::SeqCst);
        }

        /// Drop a cached snapshot, simulating eviction.
        pub async fn evict(&self, id: GameId) {
            self.inner.entries.write().await.remove(&id);
        }

        /// Read a snapshot without touching the counters.
        pub async fn peek(&self, id: GameId) -> Option<MembershipSnapshot> {
            self.inner.entries.read().await.get(&id).cloned()
        }

        /// Number of `save` calls made.
        pub fn save_count(&self) -> usize {
            self.save_count.load(Ordering::SeqCst)
        }

        /// Number of `retrieve` calls made.
        pub fn retrieve_count(&self) -> usize {
            self.retrieve_count.load(Ordering::SeqCst)
        }

        /// Number of successful `try_lock` calls.
        pub fn lock_count(&self) -> usize {
            self.lock_count.load(Ordering::SeqCst)
        }

        /// Whether a live lock is held for `id`.
        pub fn is_locked(&self, id: GameId) -> bool {
            self.inner
                .locks
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .get(&id)
                .is_some_and(|held| held.expires_at > Instant::now())
        }
    }

    #[async_trait]
    impl SessionCache for MockSessionCache {
        async fn save(&self, id: GameId, snapshot: &MembershipSnapshot) -> Result<(), GameError> {
            self.save_count.fetch_add(1, Ordering::SeqCst);
            if self.fail_saves.load(Ordering::SeqCst) {
                return Err(GameError::Cache("Mock cache save failure".to_string()));
            }
            self.inner.save(id, snapshot).await
        }

        async fn retrieve(&self, id: GameId) -> Result<Option<MembershipSnapshot>, GameError> {
            self.retrieve_count.fetch_add(1, Ordering::SeqCst);
            if self.fail_reads.load(Ordering::SeqCst) {
                return Err(GameError::Cache("Mock cache read failure".to_string()));
            }
            let snapshot = self.inner.retrieve(id).await?;
            if let Some(delay) = self.read_delay {
                tokio::time::sleep(delay).await;
            }
            Ok(snapshot)
        }

        async fn try_lock(
            &self,
            id: GameId,
            ttl: Duration,
        ) -> Result<Option<String>, GameError> {
            let token = self.inner.try_lock(id, ttl).await?;
            if token.is_some() {
                self.lock_count.fetch_add(1, Ordering::SeqCst);
            }
            Ok(token)
        }

        async fn unlock(&self, id: GameId, token: &str) -> Result<(), GameError> {
            self.inner.unlock(id, token).await
        }
    }
}
