//! Source health state
//!
//! Consecutive-failure tracking and the circuit breaker that disables
//! chronically failing sources.

mod health;

pub use health::{DisableReason, HealthPolicy, HealthTransition};
