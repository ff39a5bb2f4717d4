//! Game handlers.
//!
//! - `POST /games` - create a game
//! - `POST /games/join` - join a game as opponent or spectator
//! - `GET /games` - list games
//!
//! Every response uses the `{message, data, success}` envelope.

use crate::errors::GameError;
use crate::models::{ApiResponse, CreateGameRequest, GameSession, JoinGameRequest};
use crate::routes::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use tracing::instrument;

/// Handler for POST /games
///
/// Creates a game owned by `owner_user_id` and seeds its membership snapshot.
///
/// # Response
///
/// - 201 Created: `{message: "Game created successfully", data: Game, success: true}`
/// - 400 Bad Request: malformed body or invalid `owner_user_id`
/// - 500 Internal Server Error: store or cache failure
#[instrument(skip_all, name = "game.games.create")]
pub async fn create_game(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateGameRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<GameSession>>), GameError> {
    let Json(request) = payload?;
    let new_game = request
        .validate()
        .map_err(|reason| GameError::BadRequest(reason.to_string()))?;

    let session = state.coordinator.create_game(new_game).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success("Game created successfully", session)),
    ))
}

/// Handler for POST /games/join
///
/// Seats the user as the opponent if the seat is free, otherwise adds them
/// as a spectator, then publishes a `join_game` event on the game's channel.
///
/// # Response
///
/// - 200 OK: `{message: "Game joined successfully", data: Game, success: true}`
/// - 400 Bad Request: unknown game (`"Game not found"`), malformed body, or
///   the owner joining their own game
/// - 500 Internal Server Error: store, cache or publish failure
#[instrument(skip_all, name = "game.games.join")]
pub async fn join_game(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<JoinGameRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<GameSession>>, GameError> {
    let Json(request) = payload?;
    let (game_id, user_id) = request.validate()?;

    let outcome = state.coordinator.join(game_id, user_id).await?;

    Ok(Json(ApiResponse::success(
        "Game joined successfully",
        outcome.session,
    )))
}

/// Handler for GET /games
///
/// # Response
///
/// - 200 OK: `{message: "Games retrieved successfully", data: [Game], success: true}`
#[instrument(skip_all, name = "game.games.list")]
pub async fn list_games(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<GameSession>>>, GameError> {
    let games = state.coordinator.list_games().await?;

    Ok(Json(ApiResponse::success(
        "Games retrieved successfully",
        games,
    )))
}
