//! Repository layer for the Game Service.
//!
//! Provides durable storage following the Handler -> Service -> Repository
//! architecture. Queries use parameterized statements only.

pub mod sessions;

pub use sessions::{PgSessionStore, SessionStore};
// Mock store for testing (exposed for integration tests)
#[allow(unused_imports)]
pub use sessions::mock::MockSessionStore;
