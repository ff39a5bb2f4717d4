//! Session and request fixtures.

use chrono::Utc;
use common::types::{GameId, UserId};
use game_service::models::GameSession;
use serde_json::{json, Value};

/// A stored session with the given owner and optional opponent.
pub fn game_session(owner: &str, opponent: Option<&str>) -> GameSession {
    let now = Utc::now();
    GameSession {
        id: GameId::new(),
        owner_user_id: UserId::from(owner),
        opponent_user_id: opponent.map(UserId::from),
        created_at: now,
        updated_at: now,
    }
}

/// Body for `POST /games`.
pub fn create_game_body(owner: &str) -> Value {
    json!({ "owner_user_id": owner })
}

/// Body for `POST /games/join`.
pub fn join_game_body(game_id: &str, user_id: &str) -> Value {
    json!({ "game_id": game_id, "user_id": user_id })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_game_session_fixture() {
        let session = game_session("u1", Some("u2"));
        assert_eq!(session.owner_user_id, UserId::from("u1"));
        assert_eq!(session.opponent_user_id, Some(UserId::from("u2")));
    }

    #[test]
    fn test_join_body_shape() {
        assert_eq!(
            join_game_body("abc", "u2"),
            json!({"game_id": "abc", "user_id": "u2"})
        );
    }
}
