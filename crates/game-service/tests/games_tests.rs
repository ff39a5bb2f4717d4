//! Game endpoint integration tests.
//!
//! - `POST /games` - create
//! - `POST /games/join` - join as opponent or spectator
//! - `GET /games` - list
//!
//! Servers are spawned with `TestGameServer` over in-memory collaborators.

// Test code is allowed to use expect/unwrap for assertions
#![allow(clippy::unwrap_used, clippy::expect_used)]

use anyhow::Result;
use common::types::UserId;
use game_service::models::{JoinEvent, MembershipSnapshot, Permission};
use game_service::repositories::MockSessionStore;
use game_service::services::MockEventPublisher;
use game_test_utils::{game_session, TestGameServer};
use serde_json::{json, Value};

fn user(id: &str) -> UserId {
    UserId::from(id)
}

#[tokio::test]
async fn test_create_game_returns_created_session() -> Result<()> {
    let server = TestGameServer::spawn().await?;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/games", server.url()))
        .json(&json!({"owner_user_id": "u1"}))
        .send()
        .await?;

    assert_eq!(response.status(), 201);
    let body: Value = response.json().await?;
    assert_eq!(body["message"], "Game created successfully");
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["owner_user_id"], "u1");
    assert!(body["data"]["opponent_user_id"].is_null());

    let id = body["data"]["id"].as_str().expect("id is a string");
    let game_id = common::types::GameId::parse(id)?;
    assert_eq!(
        server.cache().peek(game_id).await,
        Some(MembershipSnapshot::seed(user("u1")))
    );

    Ok(())
}

#[tokio::test]
async fn test_create_game_rejects_empty_owner() -> Result<()> {
    let server = TestGameServer::spawn().await?;

    let response = reqwest::Client::new()
        .post(format!("{}/games", server.url()))
        .json(&json!({"owner_user_id": "   "}))
        .send()
        .await?;

    assert_eq!(response.status(), 400);
    let body: Value = response.json().await?;
    assert_eq!(body["message"], "user_id must not be empty");
    assert_eq!(body["success"], false);
    assert_eq!(server.store().create_count(), 0);

    Ok(())
}

#[tokio::test]
async fn test_first_join_grants_read_write() -> Result<()> {
    let server = TestGameServer::spawn().await?;
    let game = server.create_game("u1").await?;

    let response = server.join(&game.id.to_string(), "u2").await?;

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await?;
    assert_eq!(body["message"], "Game joined successfully");
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["opponent_user_id"], "u2");

    assert_eq!(
        server.store().get(game.id).unwrap().opponent_user_id,
        Some(user("u2"))
    );
    assert_eq!(
        server.publisher().events(),
        vec![(game.id, JoinEvent::join_game(user("u2"), Permission::ReadWrite))]
    );

    Ok(())
}

#[tokio::test]
async fn test_second_join_grants_read() -> Result<()> {
    let server = TestGameServer::spawn().await?;
    let game = server.create_game("u1").await?;
    server.join(&game.id.to_string(), "u2").await?;

    let response = server.join(&game.id.to_string(), "u3").await?;

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await?;
    assert_eq!(body["data"]["opponent_user_id"], "u2");

    let snapshot = server.cache().peek(game.id).await.unwrap();
    assert_eq!(snapshot.game_opponent_user_id, Some(user("u2")));
    assert_eq!(snapshot.spectators, vec![user("u3")]);
    assert_eq!(
        server.publisher().events().last().map(|(_, e)| e.permission),
        Some(Permission::Read)
    );

    Ok(())
}

#[tokio::test]
async fn test_join_unknown_game_returns_game_not_found() -> Result<()> {
    let server = TestGameServer::spawn().await?;

    let response = server
        .join("5f0c6b8e-1d2a-4c3b-9e8f-7a6b5c4d3e2f", "u2")
        .await?;

    assert_eq!(response.status(), 400);
    let body: Value = response.json().await?;
    assert_eq!(
        body,
        json!({"message": "Game not found", "data": null, "success": false})
    );
    assert_eq!(server.store().update_count(), 0);
    assert_eq!(server.cache().save_count(), 0);
    assert_eq!(server.publisher().call_count(), 0);

    Ok(())
}

#[tokio::test]
async fn test_join_unparseable_game_id_is_game_not_found() -> Result<()> {
    let server = TestGameServer::spawn().await?;

    let response = server.join("not-a-uuid", "u2").await?;

    assert_eq!(response.status(), 400);
    let body: Value = response.json().await?;
    assert_eq!(
        body,
        json!({"message": "Game not found", "data": null, "success": false})
    );
    assert_eq!(server.store().fetch_count(), 0);
    assert_eq!(server.cache().save_count(), 0);
    assert_eq!(server.publisher().call_count(), 0);

    Ok(())
}

#[tokio::test]
async fn test_join_missing_field_is_bad_request() -> Result<()> {
    let server = TestGameServer::spawn().await?;

    let response = reqwest::Client::new()
        .post(format!("{}/games/join", server.url()))
        .json(&json!({"user_id": "u2"}))
        .send()
        .await?;

    assert_eq!(response.status(), 400);
    let body: Value = response.json().await?;
    assert_eq!(body["success"], false);
    assert!(body["data"].is_null());

    Ok(())
}

#[tokio::test]
async fn test_owner_join_is_rejected() -> Result<()> {
    let server = TestGameServer::spawn().await?;
    let game = server.create_game("u1").await?;

    let response = server.join(&game.id.to_string(), "u1").await?;

    assert_eq!(response.status(), 400);
    let body: Value = response.json().await?;
    assert_eq!(body["message"], "Game owner cannot join their own game");

    let snapshot = server.cache().peek(game.id).await.unwrap();
    assert!(snapshot.game_opponent_user_id.is_none());
    assert!(snapshot.spectators.is_empty());
    assert_eq!(server.publisher().call_count(), 0);

    Ok(())
}

#[tokio::test]
async fn test_publish_failure_is_500_but_join_sticks() -> Result<()> {
    let server =
        TestGameServer::spawn_with(MockSessionStore::new(), MockEventPublisher::failing()).await?;
    let game = server.create_game("u1").await?;

    let response = server.join(&game.id.to_string(), "u2").await?;

    assert_eq!(response.status(), 500);
    let body: Value = response.json().await?;
    assert_eq!(body["message"], "Failed to notify game subscribers");
    assert_eq!(
        server.store().get(game.id).unwrap().opponent_user_id,
        Some(user("u2"))
    );

    Ok(())
}

#[tokio::test]
async fn test_list_games_returns_all_sessions() -> Result<()> {
    let store = MockSessionStore::new();
    store.insert(game_session("u1", None));
    store.insert(game_session("u4", Some("u5")));
    let server = TestGameServer::spawn_with(store, MockEventPublisher::accepting()).await?;

    let response = reqwest::get(format!("{}/games", server.url())).await?;

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await?;
    assert_eq!(body["message"], "Games retrieved successfully");
    assert_eq!(body["data"].as_array().map(Vec::len), Some(2));

    Ok(())
}

#[tokio::test]
async fn test_store_outage_is_500_with_generic_message() -> Result<()> {
    let server =
        TestGameServer::spawn_with(MockSessionStore::failing(), MockEventPublisher::accepting())
            .await?;

    let response = reqwest::get(format!("{}/games", server.url())).await?;

    assert_eq!(response.status(), 500);
    let body: Value = response.json().await?;
    assert_eq!(body["message"], "An internal database error occurred");
    assert_eq!(body["success"], false);

    Ok(())
}

#[tokio::test]
async fn test_metrics_endpoint_is_served() -> Result<()> {
    let server = TestGameServer::spawn().await?;

    let response = reqwest::get(format!("{}/metrics", server.url())).await?;

    assert_eq!(response.status(), 200);

    Ok(())
}
