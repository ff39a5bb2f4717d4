//! HTTP request handlers for the Game Service.

pub mod games;
pub mod health;
pub mod metrics;

pub use games::{create_game, join_game, list_games};
pub use health::health_check;
pub use metrics::metrics_handler;
