//! # Game Test Utilities
//!
//! Shared test utilities for the Game Service.
//!
//! This crate provides:
//! - Server test harness (`TestGameServer` for E2E tests)
//! - Fixtures for sessions and request bodies
//!
//! ## Usage
//!
//! ```rust,ignore
//! use game_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> Result<(), anyhow::Error> {
//!     let server = TestGameServer::spawn().await?;
//!     let game = server.create_game("u1").await?;
//!
//!     let response = server.join(&game.id.to_string(), "u2").await?;
//!     assert_eq!(response.status(), 200);
//!     Ok(())
//! }
//! ```

pub mod fixtures;
pub mod server_harness;

pub use fixtures::*;
pub use server_harness::*;
