//! # cordon-exec
//!
//! The untrusted half of the cordon pipeline: spawning real processes and
//! keeping flaky ones from taking the daemon down with them.
//!
//! - [`engine`]     — `ProcessEngine`, the `CommandRunner` that spawns via
//!   argv (never a shell), enforces the wall-clock timeout, captures
//!   output, and emits per-stage audit records.
//! - [`breaker`]    — a per-target circuit breaker (closed / open /
//!   half-open) keyed by binary + working directory.
//! - [`resilience`] — `ResilientRunner`, a `CommandRunner` decorator that
//!   adds breaker checks and exponential-backoff retries around any inner
//!   runner.
//!
//! Composition is by nesting: the orchestrator holds a
//! `ResilientRunner` wrapping a `ProcessEngine`, and sees only the
//! `CommandRunner` trait.

pub mod breaker;
pub mod engine;
pub mod resilience;

pub use breaker::{BreakerConfig, CircuitBreaker, CircuitState, TargetKey};
pub use engine::ProcessEngine;
pub use resilience::{ResilientRunner, RetryPolicy};
