//! Plans: validated-but-not-yet-executed requests awaiting approval.
//!
//! A plan is created after the gate approves the *shape* of a request. It is
//! consumed exactly once by a matching apply call, or discarded on expiry —
//! `created → applied` and `created → expired` are the only transitions, and
//! both are terminal.

use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::request::RunRequest;

/// Unique identifier for a pending plan.
///
/// Generated fresh per plan; unguessable, and independent from the approval
/// token so that knowing *what* is planned never implies permission to run it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlanId(pub uuid::Uuid);

impl PlanId {
    /// Create a new, unique plan ID.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for PlanId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PlanId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// The secret that authorizes applying a plan.
///
/// 32 bytes from the OS CSPRNG, hex-encoded. Comparison is constant-time so
/// a caller probing with partial tokens learns nothing from timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApprovalToken(String);

impl ApprovalToken {
    /// Generate a fresh token with 32 bytes of entropy.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::rng().fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }

    /// Constant-time comparison against a candidate token.
    ///
    /// Every byte is examined regardless of where the first mismatch occurs;
    /// only the length check can short-circuit, and length is public (all
    /// generated tokens are 64 hex chars).
    pub fn matches(&self, candidate: &str) -> bool {
        let a = self.0.as_bytes();
        let b = candidate.as_bytes();
        if a.len() != b.len() {
            return false;
        }
        a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
    }

    /// The hex-encoded token value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A pending plan held in the plan store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub plan_id: PlanId,
    pub approval_token: ApprovalToken,
    pub request: RunRequest,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Plan {
    /// True once the plan's TTL has elapsed.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// The human-readable preview returned when a plan is created.
///
/// Environment variable **names** only — values never appear here, in logs,
/// or anywhere else a preview might be displayed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanPreview {
    pub plan_id: PlanId,
    pub approval_token: ApprovalToken,
    pub command_line: String,
    pub env_keys: Vec<String>,
    pub background: bool,
    pub expires_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn plan_expiry_is_strictly_after_deadline() {
        let now = Utc::now();
        let plan = Plan {
            plan_id: PlanId::new(),
            approval_token: ApprovalToken::generate(),
            request: RunRequest {
                binary: "git".to_string(),
                args: vec![],
                working_directory: PathBuf::from("/work"),
                role: "builder".to_string(),
                env_overrides: Default::default(),
                background: false,
            },
            created_at: now,
            expires_at: now + chrono::Duration::milliseconds(50),
        };

        assert!(!plan.is_expired(now));
        // Exactly at the deadline the plan is still applicable.
        assert!(!plan.is_expired(plan.expires_at));
        assert!(plan.is_expired(plan.expires_at + chrono::Duration::milliseconds(1)));
    }

    #[test]
    fn token_mismatch_with_different_length() {
        let token = ApprovalToken::generate();
        assert!(!token.matches(""));
        assert!(!token.matches(&token.as_str()[..32]));
    }
}
