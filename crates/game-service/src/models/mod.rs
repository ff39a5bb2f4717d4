//! Game Service models.
//!
//! Contains the durable session record, the ephemeral membership snapshot,
//! request/response bodies and the join notification payload.

use chrono::{DateTime, Utc};
use crate::errors::GameError;
use common::types::{GameId, UserId};
use serde::{Deserialize, Serialize};

/// Maximum accepted length of a user identifier.
pub const MAX_USER_ID_LENGTH: usize = 128;

/// Name of the event published on every successful join.
pub const JOIN_GAME_EVENT: &str = "join_game";

// ============================================================================
// Durable record
// ============================================================================

/// A game session as stored in the durable store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSession {
    /// Unique game identifier, assigned at creation.
    pub id: GameId,

    /// User who created the game. Never changes.
    pub owner_user_id: UserId,

    /// Second player. Assigned at most once.
    pub opponent_user_id: Option<UserId>,

    /// Creation timestamp.
    pub created_at: DateTime<Utc>,

    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Fields supplied when creating a game.
#[derive(Debug, Clone)]
pub struct NewGameSession {
    /// Creator of the game.
    pub owner_user_id: UserId,
}

/// Named-field partial update of a game session.
///
/// Fields left as `None` are untouched. The opponent is write-once: stores
/// never replace an opponent that is already assigned, so callers compare
/// the returned session against what they asked for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionUpdate {
    /// Opponent to assign if the slot is still empty.
    pub opponent_user_id: Option<UserId>,
}

impl SessionUpdate {
    /// Update that claims the opponent slot for `user_id`.
    pub fn assign_opponent(user_id: UserId) -> Self {
        Self {
            opponent_user_id: Some(user_id),
        }
    }

    /// Check if the update names any field.
    pub fn has_changes(&self) -> bool {
        self.opponent_user_id.is_some()
    }
}

// ============================================================================
// Ephemeral snapshot
// ============================================================================

/// Membership mirror kept in the session cache, one per game.
///
/// The spectator list only lives here; it is not durably persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipSnapshot {
    /// Mirrors the durable owner.
    pub game_owner_user_id: UserId,

    /// Mirrors the durable opponent once assigned.
    pub game_opponent_user_id: Option<UserId>,

    /// Users watching the game, in join order.
    pub spectators: Vec<UserId>,
}

impl MembershipSnapshot {
    /// Snapshot seeded at game creation.
    pub fn seed(owner_user_id: UserId) -> Self {
        Self {
            game_owner_user_id: owner_user_id,
            game_opponent_user_id: None,
            spectators: Vec::new(),
        }
    }

    /// Rebuild a snapshot from the durable record after a cache miss.
    /// Spectators are unrecoverable and start empty.
    pub fn from_session(session: &GameSession) -> Self {
        Self {
            game_owner_user_id: session.owner_user_id.clone(),
            game_opponent_user_id: session.opponent_user_id.clone(),
            spectators: Vec::new(),
        }
    }

    /// Whether `user_id` already holds any seat in this snapshot.
    pub fn is_member(&self, user_id: &UserId) -> bool {
        self.game_owner_user_id == *user_id
            || self.game_opponent_user_id.as_ref() == Some(user_id)
            || self.spectators.contains(user_id)
    }

    /// Append a spectator unless the user is already a member.
    ///
    /// Returns `true` if the snapshot changed.
    pub fn add_spectator(&mut self, user_id: &UserId) -> bool {
        if self.is_member(user_id) {
            return false;
        }
        self.spectators.push(user_id.clone());
        true
    }
}

// ============================================================================
// Permissions and notifications
// ============================================================================

/// Permission tier granted by a join.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Permission {
    /// Spectator.
    #[serde(rename = "READ")]
    Read,

    /// Active second player.
    #[serde(rename = "READ_WRITE")]
    ReadWrite,
}

impl Permission {
    /// Returns the wire representation of the permission.
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::Read => "READ",
            Permission::ReadWrite => "READ_WRITE",
        }
    }
}

/// Notification published on the game's channel after a join.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinEvent {
    /// Always [`JOIN_GAME_EVENT`].
    pub event: String,

    /// Permission granted to the joining user.
    pub permission: Permission,

    /// Joining user.
    pub name: UserId,
}

impl JoinEvent {
    /// Build the `join_game` event for a user.
    pub fn join_game(user_id: UserId, permission: Permission) -> Self {
        Self {
            event: JOIN_GAME_EVENT.to_string(),
            permission,
            name: user_id,
        }
    }
}

/// Result of a successful join.
#[derive(Debug, Clone)]
pub struct JoinOutcome {
    /// Session as it is after the join.
    pub session: GameSession,

    /// Snapshot as it is after the join.
    pub snapshot: MembershipSnapshot,

    /// Permission granted.
    pub permission: Permission,
}

// ============================================================================
// HTTP bodies
// ============================================================================

/// Response envelope shared by every endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Human readable outcome.
    pub message: String,

    /// Payload, `null` on failure.
    pub data: Option<T>,

    /// Whether the request succeeded.
    pub success: bool,
}

impl<T> ApiResponse<T> {
    /// Successful response carrying `data`.
    pub fn success(message: impl Into<String>, data: T) -> Self {
        Self {
            message: message.into(),
            data: Some(data),
            success: true,
        }
    }

    /// Failed response with no payload.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            data: None,
            success: false,
        }
    }
}

/// Request body for `POST /games`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateGameRequest {
    /// Creator of the game.
    pub owner_user_id: String,
}

impl CreateGameRequest {
    /// Validate and convert into the store's creation input.
    pub fn validate(&self) -> Result<NewGameSession, &'static str> {
        Ok(NewGameSession {
            owner_user_id: validate_user_id(&self.owner_user_id)?,
        })
    }
}

/// Request body for `POST /games/join`.
#[derive(Debug, Clone, Deserialize)]
pub struct JoinGameRequest {
    /// Game to join.
    pub game_id: String,

    /// Joining user.
    pub user_id: String,
}

impl JoinGameRequest {
    /// Validate and parse the request.
    ///
    /// A `game_id` that cannot name any game is reported the same way as an
    /// unknown one.
    pub fn validate(&self) -> Result<(GameId, UserId), GameError> {
        let game_id = GameId::parse(&self.game_id)
            .map_err(|_| GameError::NotFound("Game not found".to_string()))?;
        let user_id = validate_user_id(&self.user_id)
            .map_err(|reason| GameError::BadRequest(reason.to_string()))?;
        Ok((game_id, user_id))
    }
}

fn validate_user_id(raw: &str) -> Result<UserId, &'static str> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err("user_id must not be empty");
    }
    if trimmed.len() > MAX_USER_ID_LENGTH {
        return Err("user_id must be at most 128 characters");
    }
    Ok(UserId::from(trimmed))
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service health status ("healthy" or "unhealthy").
    pub status: String,

    /// Durable store connectivity status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
}
