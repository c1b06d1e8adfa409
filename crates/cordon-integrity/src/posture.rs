//! Policy posture scoring.
//!
//! A policy can be structurally valid and still dangerously permissive.
//! The assessment walks the hydrated policy looking for known-risky
//! grants and missing guardrails, then folds the findings into a single
//! 0–100 score:
//!
//!   score = 100 − 25·High − 10·Medium − 5·Low, clamped at 0
//!
//! The score is a review aid, not an enforcement input — nothing on the
//! request path reads it.

use tracing::debug;

use cordon_contracts::policy::Policy;

/// Binaries whose whole purpose is privilege escalation.
const PRIVILEGE_BINARIES: &[&str] = &["sudo", "su", "doas"];

/// Binaries that destroy data or system state when misused.
const DESTRUCTIVE_BINARIES: &[&str] =
    &["rm", "dd", "shred", "chmod", "chown", "shutdown", "reboot"];

/// Flags every hardened policy is expected to deny globally.
const CRITICAL_DENY_FLAGS: &[&str] = &["--force", "-rf", "--no-preserve-root"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    High,
    Medium,
    Low,
}

impl Severity {
    fn penalty(self) -> u32 {
        match self {
            Severity::High => 25,
            Severity::Medium => 10,
            Severity::Low => 5,
        }
    }
}

/// One risky aspect of the policy.
#[derive(Debug, Clone)]
pub struct Finding {
    pub severity: Severity,
    pub message: String,
}

/// The full assessment: every finding plus the folded score.
#[derive(Debug, Clone)]
pub struct PostureReport {
    pub findings: Vec<Finding>,
    pub score: u32,
}

impl PostureReport {
    pub fn count(&self, severity: Severity) -> usize {
        self.findings.iter().filter(|f| f.severity == severity).count()
    }
}

/// Assess a hydrated policy.
pub fn assess(policy: &Policy) -> PostureReport {
    let mut findings = Vec::new();

    for (role, grant) in &policy.roles {
        for binary in &grant.allowed_binaries {
            if PRIVILEGE_BINARIES.contains(&binary.as_str()) {
                findings.push(Finding {
                    severity: Severity::High,
                    message: format!(
                        "role {:?} may run privilege escalation binary {:?}",
                        role, binary
                    ),
                });
            } else if is_destructive(binary) {
                findings.push(Finding {
                    severity: Severity::Medium,
                    message: format!("role {:?} may run destructive binary {:?}", role, binary),
                });
            }
        }
    }

    for flag in CRITICAL_DENY_FLAGS {
        if !policy.deny_flags.iter().any(|f| f == flag) {
            findings.push(Finding {
                severity: Severity::Low,
                message: format!("global deny-flags do not include {:?}", flag),
            });
        }
    }

    let penalty: u32 = findings.iter().map(|f| f.severity.penalty()).sum();
    let score = 100u32.saturating_sub(penalty);

    debug!(findings = findings.len(), score, "posture assessed");
    PostureReport { findings, score }
}

/// Destructive by name, with the `mkfs` family matched as a prefix —
/// `mkfs.ext4`, `mkfs.xfs` and friends are separate binaries.
fn is_destructive(binary: &str) -> bool {
    DESTRUCTIVE_BINARIES.contains(&binary) || binary.starts_with("mkfs")
}
