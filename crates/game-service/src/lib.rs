//! Game Service Library
//!
//! Core functionality for the Gameroom game service:
//!
//! - Game creation and listing
//! - Membership coordination: deciding whether a joining user becomes the
//!   second player or a spectator
//! - Keeping the ephemeral membership cache consistent with the durable store
//! - Publishing one `join_game` notification per successful join
//!
//! # Architecture
//!
//! Handler -> Service -> Repository/Cache/Publisher:
//!
//! ```text
//! routes/mod.rs -> handlers/*.rs -> services/membership.rs -> repositories/*.rs
//!                                                         -> cache/*.rs
//!                                                         -> services/publisher.rs
//! ```
//!
//! # Modules
//!
//! - `cache` - Ephemeral membership snapshots (Redis or in-process)
//! - `config` - Service configuration from environment
//! - `errors` - Error types with HTTP status code mapping
//! - `handlers` - HTTP request handlers
//! - `middleware` - HTTP middleware
//! - `models` - Data models
//! - `observability` - Metrics
//! - `repositories` - Durable session store
//! - `routes` - Axum router setup
//! - `services` - Membership coordination and event publishing

pub mod cache;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod repositories;
pub mod routes;
pub mod services;
