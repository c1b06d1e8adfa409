//! Audit records: the append-only decision and execution trail.
//!
//! One record per decision/event, emitted in causal order for a single
//! execution (decision → spawn/background → terminal). Records carry byte
//! counts of captured output, never the output itself, so the log stays
//! bounded regardless of what a command prints.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::request::RunRequest;

/// The event class of an audit record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditKind {
    /// A gate (or circuit breaker) decision: permit or deny.
    Decision,
    /// A foreground process was spawned.
    Spawn,
    /// A background process was spawned and detached.
    Background,
    /// Terminal: the process ran and exited.
    Exit,
    /// Terminal: the process could not be spawned or waited on.
    Error,
    /// Terminal: the wall-clock timeout fired and the process was killed.
    Timeout,
    /// The resilience layer is about to retry a failed attempt.
    Retry,
    /// The resilience layer gave up after exhausting its retries.
    RetryExhausted,
}

/// One append-only audit record.
///
/// Request identity fields are always present; the remainder are
/// outcome-specific and omitted from the serialized form when unset, so
/// each JSONL line carries only what its event kind needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub timestamp: DateTime<Utc>,
    pub kind: AuditKind,
    pub binary: String,
    pub args: Vec<String>,
    pub working_directory: PathBuf,
    pub role: String,

    /// "permit" or "deny" on decision records.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<String>,
    /// Stable denial reason string on deny decisions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// The plan this event belongs to, when it came through plan/apply.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signal: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    /// Byte count of captured stdout — never the bytes themselves.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stdout_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stderr_bytes: Option<u64>,
    /// Zero-based attempt number on retry records.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempt: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
}

impl AuditRecord {
    /// Seed a record of `kind` with the request's identity fields and the
    /// current timestamp. Outcome-specific fields start unset.
    pub fn for_request(kind: AuditKind, request: &RunRequest) -> Self {
        Self {
            timestamp: Utc::now(),
            kind,
            binary: request.binary.clone(),
            args: request.args.clone(),
            working_directory: request.working_directory.clone(),
            role: request.role.clone(),
            outcome: None,
            reason: None,
            plan_id: None,
            exit_code: None,
            signal: None,
            duration_ms: None,
            stdout_bytes: None,
            stderr_bytes: None,
            attempt: None,
            pid: None,
        }
    }
}
