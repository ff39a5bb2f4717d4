//! Service layer for the Game Service.
//!
//! # Components
//!
//! - `membership` - Role decision and store/cache coordination for joins
//! - `publisher` - Join event delivery (Centrifugo or log-only)
//! - `session_locks` - Per-game critical sections

pub mod membership;
pub mod publisher;
pub mod session_locks;

pub use membership::MembershipCoordinator;
pub use publisher::{CentrifugoPublisher, EventPublisher, LogEventPublisher};
// Mock publisher for testing (exposed for integration tests)
#[allow(unused_imports)]
pub use publisher::mock::MockEventPublisher;
pub use session_locks::{SessionLockGuard, SessionLocks};
