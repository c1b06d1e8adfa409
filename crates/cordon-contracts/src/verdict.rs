//! Gate verdicts and stable denial reasons.
//!
//! Denial reasons are string reason codes, not numeric exit statuses: the
//! primary consumer is an automated caller that needs to explain *why* a
//! request was refused. The strings are part of the external contract and
//! must never change silently.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Every way the daemon can refuse to run (or continue running) a request.
///
/// `Display` yields the stable reason string recorded in the audit log and
/// returned to callers verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    /// The working directory is outside the workspace fence.
    EscapesWorkspaceFence,
    /// The request's role has no entry in the policy.
    UnknownRole,
    /// The role exists but its allow-list does not contain the binary.
    BinaryNotAllowed,
    /// An argument matched a global deny-flag.
    DeniedFlagsGlobal,
    /// An argument matched a per-binary deny-flag.
    DeniedFlagsBinary,
    /// The circuit breaker for this target is open.
    CircuitOpen,
    /// No pending plan exists under the given id.
    UnknownOrExpiredPlan,
    /// The plan exists but the presented approval token does not match.
    ApprovalTokenMismatch,
    /// The plan's TTL elapsed before it was applied.
    PlanExpired,
}

impl DenyReason {
    /// The stable reason string for this denial.
    pub fn as_str(&self) -> &'static str {
        match self {
            DenyReason::EscapesWorkspaceFence => "escapes workspace fence",
            DenyReason::UnknownRole => "unknown role",
            DenyReason::BinaryNotAllowed => "binary not allowed for role",
            DenyReason::DeniedFlagsGlobal => "denied flags (global)",
            DenyReason::DeniedFlagsBinary => "denied flags for binary",
            DenyReason::CircuitOpen => "circuit open",
            DenyReason::UnknownOrExpiredPlan => "unknown or expired plan",
            DenyReason::ApprovalTokenMismatch => "approval token mismatch",
            DenyReason::PlanExpired => "plan expired",
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The decision the policy gate emits for a single request.
///
/// Anything other than `Permit` prevents the process from being spawned.
/// This is the core security guarantee of the daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The request is permitted. Execution may proceed.
    Permit,
    /// The request is refused for the given reason.
    Deny { reason: DenyReason },
}

impl Verdict {
    /// True when the verdict permits execution.
    pub fn is_permit(&self) -> bool {
        matches!(self, Verdict::Permit)
    }
}
