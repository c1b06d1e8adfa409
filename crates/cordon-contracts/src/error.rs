//! Runtime error types for the cordon daemon.
//!
//! All fallible operations return `CordonResult<T>`. Denials and plan
//! rejections are typed errors, never panics — the daemon fails closed and
//! explains why. Spawn failures and timeouts are deliberately NOT errors:
//! they are normalized into `ExecutionOutcome` so callers have one uniform
//! result shape to branch on.

use thiserror::Error;

use crate::verdict::DenyReason;

/// The unified error type for the cordon daemon.
#[derive(Debug, Error)]
pub enum CordonError {
    /// The policy gate (or the circuit breaker) refused the request.
    ///
    /// Fails closed: no process is spawned when this is returned.
    #[error("policy denied: {reason}")]
    PolicyDenied { reason: DenyReason },

    /// An apply call failed plan validation (unknown id, token mismatch,
    /// or expiry). Always terminal for that plan.
    #[error("plan rejected: {reason}")]
    PlanRejected { reason: DenyReason },

    /// The policy file could not be read or hydrated.
    ///
    /// Treated as a denial at the request boundary — a decision cannot be
    /// made without a policy, so the request does not run.
    #[error("policy load failed: {reason}")]
    PolicyLoadFailed { reason: String },

    /// The audit sink could not persist a record.
    ///
    /// This is treated as fatal for the operation — a decision that cannot
    /// be audited cannot proceed.
    #[error("audit write failed: {reason}")]
    AuditWriteFailed { reason: String },

    /// A required configuration value is missing or malformed.
    #[error("configuration error: {reason}")]
    ConfigError { reason: String },

    /// An offline integrity check (schema or drift) failed.
    ///
    /// Only produced by the policy integrity subsystem, never on the live
    /// request path.
    #[error("policy integrity check failed: {reason}")]
    IntegrityError { reason: String },

    /// The execution engine hit an internal failure it could not normalize
    /// into an `ExecutionOutcome`.
    #[error("execution failed: {reason}")]
    ExecutionFailed { reason: String },
}

/// Convenience alias used throughout the cordon crates.
pub type CordonResult<T> = Result<T, CordonError>;
