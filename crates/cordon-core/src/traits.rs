//! Core trait definitions for the cordon enforcement pipeline.
//!
//! These three traits define the complete trust boundary:
//!
//! - `PolicySource`  — trusted loader (hydrates a fresh policy per decision)
//! - `CommandRunner` — the execution seam (engine, or engine + resilience)
//! - `AuditSink`     — trusted sink (records every decision immutably)
//!
//! The orchestrator wires them together in the correct order. A runner is
//! never called unless the gate first returned `Permit`.

use async_trait::async_trait;

use cordon_contracts::{
    audit::AuditRecord,
    error::CordonResult,
    outcome::ExecutionOutcome,
    policy::Policy,
    request::RunRequest,
};

/// Loads a fresh policy snapshot for one decision.
///
/// Implementations MUST NOT cache across calls: the policy file is
/// externally editable and edits take effect on the next decision without a
/// restart. Caching here would be a security bug, not an optimization.
pub trait PolicySource: Send + Sync {
    /// Read, substitute, and hydrate the policy. Errors fail closed — no
    /// decision can be made without a policy, so the request does not run.
    fn load(&self) -> CordonResult<Policy>;
}

/// Executes one permitted request and normalizes the result.
///
/// Implementations surface spawn failures and timeouts inside
/// `ExecutionOutcome` rather than as errors, so callers branch on one
/// uniform shape. `Err` is reserved for the resilience layer's fail-fast
/// path (circuit open) and internal faults.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, request: &RunRequest) -> CordonResult<ExecutionOutcome>;
}

/// The append-only audit trail.
///
/// Every decision and execution event produces exactly one record. Records
/// written here are never modified or deleted by the daemon; a failed write
/// is fatal for the operation that produced it.
pub trait AuditSink: Send + Sync {
    fn record(&self, record: &AuditRecord) -> CordonResult<()>;
}
