//! Observability for the Game Service.
//!
//! Provides metrics definitions and recording helpers.

pub mod metrics;
