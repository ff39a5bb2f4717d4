//! Durable game session store.
//!
//! [`SessionStore`] is the contract the membership coordinator consumes.
//! [`PgSessionStore`] backs it with PostgreSQL; [`mock::MockSessionStore`]
//! is an in-memory double with failure injection for tests.
//!
//! # Write-once opponent
//!
//! `update` never replaces an opponent that is already set. In SQL this is
//! `COALESCE(opponent_user_id, $2)` inside a single `UPDATE`, so two
//! service instances racing for the same slot cannot both win.

use crate::errors::GameError;
use crate::models::{GameSession, NewGameSession, SessionUpdate};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::types::{GameId, UserId};
use sqlx::PgPool;
use tracing::instrument;
use uuid::Uuid;

/// Contract for the durable session store.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Persist a new session and assign its id.
    async fn create(&self, new_session: &NewGameSession) -> Result<GameSession, GameError>;

    /// Load a session. A missing session is `Ok(None)`, not an error.
    async fn fetch_one(&self, id: GameId) -> Result<Option<GameSession>, GameError>;

    /// Apply a named-field update and return the session as stored afterwards.
    ///
    /// Returns `GameError::NotFound` if the session does not exist.
    async fn update(&self, id: GameId, update: &SessionUpdate) -> Result<GameSession, GameError>;

    /// Load every session, newest first.
    async fn fetch_all(&self) -> Result<Vec<GameSession>, GameError>;

    /// Check connectivity.
    async fn ping(&self) -> Result<(), GameError>;
}

/// Game database row.
#[derive(Debug, sqlx::FromRow)]
struct GameRow {
    id: Uuid,
    owner_user_id: String,
    opponent_user_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<GameRow> for GameSession {
    fn from(row: GameRow) -> Self {
        GameSession {
            id: GameId(row.id),
            owner_user_id: UserId(row.owner_user_id),
            opponent_user_id: row.opponent_user_id.map(UserId),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// SQL fragment listing every game column.
const GAME_COLUMNS: &str = "id, owner_user_id, opponent_user_id, created_at, updated_at";

/// PostgreSQL-backed session store.
#[derive(Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    /// Create a store over an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    #[instrument(skip_all, fields(owner_user_id = %new_session.owner_user_id))]
    async fn create(&self, new_session: &NewGameSession) -> Result<GameSession, GameError> {
        let query = format!(
            "INSERT INTO games (owner_user_id) VALUES ($1) RETURNING {}",
            GAME_COLUMNS
        );

        let row: GameRow = sqlx::query_as(&query)
            .bind(new_session.owner_user_id.as_str())
            .fetch_one(&self.pool)
            .await?;

        Ok(row.into())
    }

    #[instrument(skip_all, fields(game_id = %id))]
    async fn fetch_one(&self, id: GameId) -> Result<Option<GameSession>, GameError> {
        let query = format!("SELECT {} FROM games WHERE id = $1", GAME_COLUMNS);

        let row: Option<GameRow> = sqlx::query_as(&query)
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(GameSession::from))
    }

    #[instrument(skip_all, fields(game_id = %id))]
    async fn update(&self, id: GameId, update: &SessionUpdate) -> Result<GameSession, GameError> {
        if !update.has_changes() {
            return self
                .fetch_one(id)
                .await?
                .ok_or_else(|| GameError::NotFound("Game not found".to_string()));
        }

        let query = format!(
            r#"
            UPDATE games
            SET
                opponent_user_id = COALESCE(opponent_user_id, $2),
                updated_at = CASE
                    WHEN opponent_user_id IS NULL THEN NOW()
                    ELSE updated_at
                END
            WHERE id = $1
            RETURNING {}
            "#,
            GAME_COLUMNS
        );

        let row: GameRow = sqlx::query_as(&query)
            .bind(id.0)
            .bind(update.opponent_user_id.as_ref().map(UserId::as_str))
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| GameError::NotFound("Game not found".to_string()))?;

        Ok(row.into())
    }

    #[instrument(skip_all)]
    async fn fetch_all(&self) -> Result<Vec<GameSession>, GameError> {
        let query = format!(
            "SELECT {} FROM games ORDER BY created_at DESC",
            GAME_COLUMNS
        );

        let rows: Vec<GameRow> = sqlx::query_as(&query).fetch_all(&self.pool).await?;

        Ok(rows.into_iter().map(GameSession::from).collect())
    }

    async fn ping(&self) -> Result<(), GameError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Mock session store for testing.
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Mutex, PoisonError};
    use std::time::Duration;

    /// In-memory session store.
    ///
    /// By default the opponent is write-once like the real store.
    /// [`MockSessionStore::last_writer_wins`] builds a naive store that
    /// overwrites it, for proving the coordinator's own serialization.
    #[derive(Default)]
    pub struct MockSessionStore {
        sessions: Mutex<HashMap<GameId, GameSession>>,
        overwrite_opponent: bool,
        return_error: bool,
        fail_updates: bool,
        read_delay: Option<Duration>,
        create_count: AtomicUsize,
        fetch_count: AtomicUsize,
        update_count: AtomicUsize,
    }

    impl MockSessionStore {
        /// Empty store with write-once opponent semantics.
        pub fn new() -> Self {
            Self::default()
        }

        /// Store whose `update` overwrites an existing opponent.
        pub fn last_writer_wins() -> Self {
            Self {
                overwrite_opponent: true,
                ..Self::default()
            }
        }

        /// Store where every call fails with a database error.
        pub fn failing() -> Self {
            Self {
                return_error: true,
                ..Self::default()
            }
        }

        /// Make `update` fail while reads still succeed.
        pub fn with_failing_updates(mut self) -> Self {
            self.fail_updates = true;
            self
        }

        /// Sleep after each `fetch_one` read, widening race windows.
        pub fn with_read_delay(mut self, delay: Duration) -> Self {
            self.read_delay = Some(delay);
            self
        }

        /// Seed a session directly.
        pub fn insert(&self, session: GameSession) {
            self.lock().insert(session.id, session);
        }

        /// Current stored value of a session.
        pub fn get(&self, id: GameId) -> Option<GameSession> {
            self.lock().get(&id).cloned()
        }

        /// Number of `create` calls made.
        pub fn create_count(&self) -> usize {
            self.create_count.load(Ordering::SeqCst)
        }

        /// Number of `fetch_one` calls made.
        pub fn fetch_count(&self) -> usize {
            self.fetch_count.load(Ordering::SeqCst)
        }

        /// Number of `update` calls made.
        pub fn update_count(&self) -> usize {
            self.update_count.load(Ordering::SeqCst)
        }

        fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<GameId, GameSession>> {
            self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
        }

        fn check_available(&self) -> Result<(), GameError> {
            if self.return_error {
                return Err(GameError::Database("Mock session store error".to_string()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl SessionStore for MockSessionStore {
        async fn create(&self, new_session: &NewGameSession) -> Result<GameSession, GameError> {
            self.create_count.fetch_add(1, Ordering::SeqCst);
            self.check_available()?;

            let now = Utc::now();
            let session = GameSession {
                id: GameId::new(),
                owner_user_id: new_session.owner_user_id.clone(),
                opponent_user_id: None,
                created_at: now,
                updated_at: now,
            };
            self.insert(session.clone());
            Ok(session)
        }

        async fn fetch_one(&self, id: GameId) -> Result<Option<GameSession>, GameError> {
            self.fetch_count.fetch_add(1, Ordering::SeqCst);
            self.check_available()?;

            let session = self.get(id);
            if let Some(delay) = self.read_delay {
                tokio::time::sleep(delay).await;
            }
            Ok(session)
        }

        async fn update(
            &self,
            id: GameId,
            update: &SessionUpdate,
        ) -> Result<GameSession, GameError> {
            self.update_count.fetch_add(1, Ordering::SeqCst);
            self.check_available()?;
            if self.fail_updates {
                return Err(GameError::Database("Mock update failure".to_string()));
            }

            let mut sessions = self.lock();
            let session = sessions
                .get_mut(&id)
                .ok_or_else(|| GameError::NotFound("Game not found".to_string()))?;

            if let Some(opponent) = &update.opponent_user_id {
                if session.opponent_user_id.is_none() || self.overwrite_opponent {
                    session.opponent_user_id = Some(opponent.clone());
                    session.updated_at = Utc::now();
                }
            }

            Ok(session.clone())
        }

        async fn fetch_all(&self) -> Result<Vec<GameSession>, GameError> {
            self.check_available()?;
            let mut sessions: Vec<GameSession> = self.lock().values().cloned().collect();
            sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(sessions)
        }

        async fn ping(&self) -> Result<(), GameError> {
            self.check_available()
        }
    }
}
