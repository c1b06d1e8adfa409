//! Execution outcomes.
//!
//! `Completed` and `Detached` are distinct variants rather than one struct
//! with empty strings, so callers cannot mistake "ran and produced nothing"
//! for "didn't wait". Spawn failures and timeouts are folded into
//! `Completed` with a negative exit code — one uniform shape to branch on,
//! with `ExitClass` preserving the terminal cause.

use serde::{Deserialize, Serialize};

/// Why a foreground execution reached its terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitClass {
    /// The process ran and exited (any exit code, any signal).
    Exited,
    /// The process could not be spawned (binary not found, permission
    /// denied at the OS level). The OS error text is carried in `stderr`.
    SpawnFailed,
    /// The wall-clock timeout fired and the process was forcibly killed.
    TimedOut,
}

/// The result of one execution engine invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum ExecutionOutcome {
    /// The engine waited for the process (or for its failure to start).
    #[serde(rename_all = "camelCase")]
    Completed {
        /// Process exit code; `-1` when the process was killed, never
        /// started, or exited via signal without a code.
        exit_code: i32,
        /// Terminating signal, when one was delivered (unix only).
        signal: Option<i32>,
        /// Wall-clock duration from spawn to terminal state.
        duration_ms: u64,
        /// Captured standard output (lossy UTF-8).
        stdout: String,
        /// Captured standard error, or the OS error text on spawn failure.
        stderr: String,
        /// The terminal cause, used for retry classification and audit kind.
        class: ExitClass,
    },

    /// Fire-and-forget: the process was spawned, confirmed, and detached.
    /// Nothing was captured and nothing was waited for.
    #[serde(rename_all = "camelCase")]
    Detached {
        /// OS process id at spawn time, when the OS reported one.
        pid: Option<u32>,
    },
}

impl ExecutionOutcome {
    /// A synthetic completed outcome for failures that never produced a
    /// process (spawn errors, wait errors).
    pub fn spawn_failure(error: impl std::fmt::Display, duration_ms: u64) -> Self {
        ExecutionOutcome::Completed {
            exit_code: -1,
            signal: None,
            duration_ms,
            stdout: String::new(),
            stderr: error.to_string(),
            class: ExitClass::SpawnFailed,
        }
    }

    /// True for a clean foreground exit (code 0) or a confirmed detach.
    pub fn is_success(&self) -> bool {
        match self {
            ExecutionOutcome::Completed { exit_code, class, .. } => {
                *class == ExitClass::Exited && *exit_code == 0
            }
            ExecutionOutcome::Detached { .. } => true,
        }
    }

    /// The exit class, when this outcome is a completion.
    pub fn class(&self) -> Option<ExitClass> {
        match self {
            ExecutionOutcome::Completed { class, .. } => Some(*class),
            ExecutionOutcome::Detached { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_requires_clean_exit() {
        let ok = ExecutionOutcome::Completed {
            exit_code: 0,
            signal: None,
            duration_ms: 12,
            stdout: String::new(),
            stderr: String::new(),
            class: ExitClass::Exited,
        };
        assert!(ok.is_success());

        let failed = ExecutionOutcome::Completed {
            exit_code: 1,
            signal: None,
            duration_ms: 12,
            stdout: String::new(),
            stderr: String::new(),
            class: ExitClass::Exited,
        };
        assert!(!failed.is_success());

        // A zero exit code is meaningless when the class is a timeout.
        let timed_out = ExecutionOutcome::Completed {
            exit_code: 0,
            signal: Some(9),
            duration_ms: 50,
            stdout: String::new(),
            stderr: String::new(),
            class: ExitClass::TimedOut,
        };
        assert!(!timed_out.is_success());
    }

    #[test]
    fn detached_counts_as_success() {
        assert!(ExecutionOutcome::Detached { pid: Some(4242) }.is_success());
    }

    #[test]
    fn spawn_failure_carries_error_text() {
        let outcome = ExecutionOutcome::spawn_failure("No such file or directory", 0);
        match outcome {
            ExecutionOutcome::Completed { exit_code, stderr, class, .. } => {
                assert_eq!(exit_code, -1);
                assert_eq!(class, ExitClass::SpawnFailed);
                assert!(stderr.contains("No such file"));
            }
            other => panic!("expected Completed, got {:?}", other),
        }
    }
}
