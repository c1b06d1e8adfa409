//! The plan/apply orchestrator.
//!
//! Implements the two-phase workflow on top of the gate, the plan store,
//! and the command runner:
//!
//! - `plan()`  — gate the request's shape, mint a plan id + approval token,
//!   store the plan, return a preview. Nothing executes.
//! - `apply()` — claim the plan (single-use), **re-run the gate against the
//!   policy current right now**, then execute. The re-check is mandatory:
//!   the policy may have changed since planning, and an apply must never
//!   ride on a stale permit.
//! - `run_now()` / `start_background()` — the direct path for idempotent
//!   commands; gate then execute, no plan.
//!
//! Every gate decision — permit or deny — emits one `decision` audit
//! record before anything else happens for that request.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use cordon_contracts::{
    audit::{AuditKind, AuditRecord},
    error::{CordonError, CordonResult},
    outcome::ExecutionOutcome,
    plan::{ApprovalToken, Plan, PlanId, PlanPreview},
    request::RunRequest,
    verdict::Verdict,
};

use crate::gate;
use crate::plan::PlanStore;
use crate::traits::{AuditSink, CommandRunner, PolicySource};

/// The component that serves the four caller-facing operations.
///
/// Owns the trusted collaborators — policy source, runner, audit sink, and
/// plan store — and enforces the pipeline ordering on every call. Store
/// handles are passed in explicitly; there is no ambient global state, so
/// tests construct a fresh orchestrator per case.
pub struct Orchestrator {
    policy: Box<dyn PolicySource>,
    runner: Box<dyn CommandRunner>,
    audit: Arc<dyn AuditSink>,
    plans: PlanStore,
    default_ttl: Duration,
}

impl Orchestrator {
    pub fn new(
        policy: Box<dyn PolicySource>,
        runner: Box<dyn CommandRunner>,
        audit: Arc<dyn AuditSink>,
        default_ttl: Duration,
    ) -> Self {
        Self {
            policy,
            runner,
            audit,
            plans: PlanStore::new(),
            default_ttl,
        }
    }

    /// Validate a request's shape and register it as a pending plan.
    ///
    /// On permit, returns a preview carrying the plan id, the approval
    /// token, the rendered command line, environment variable names (never
    /// values), the background flag, and the expiry. Denials surface the
    /// gate's reason verbatim.
    pub fn plan(&self, request: RunRequest, ttl: Option<Duration>) -> CordonResult<PlanPreview> {
        self.gate_checked(&request, None)?;

        let ttl = ttl.unwrap_or(self.default_ttl);
        let now = Utc::now();
        let expires_at = now
            + chrono::Duration::from_std(ttl).map_err(|e| CordonError::ConfigError {
                reason: format!("plan ttl out of range: {}", e),
            })?;

        let plan = Plan {
            plan_id: PlanId::new(),
            approval_token: ApprovalToken::generate(),
            request,
            created_at: now,
            expires_at,
        };

        let preview = PlanPreview {
            plan_id: plan.plan_id,
            approval_token: plan.approval_token.clone(),
            command_line: plan.request.command_line(),
            env_keys: plan.request.env_keys(),
            background: plan.request.background,
            expires_at: plan.expires_at,
        };

        info!(
            plan_id = %plan.plan_id,
            command = %preview.command_line,
            expires_at = %plan.expires_at,
            "plan created"
        );
        self.plans.insert(plan);

        Ok(preview)
    }

    /// Consume a pending plan and execute its request.
    ///
    /// The plan id and approval token must both match — they are
    /// independent values, separating "what is planned" from "who may
    /// proceed". After the claim, the gate runs again against the live
    /// policy; a permit minted at plan time proves nothing at apply time.
    pub async fn apply(&self, plan_id: &PlanId, token: &str) -> CordonResult<ExecutionOutcome> {
        let plan = match self.plans.claim(plan_id, token, Utc::now()) {
            Ok(plan) => plan,
            Err(reason) => {
                warn!(plan_id = %plan_id, reason = %reason, "apply rejected");
                return Err(CordonError::PlanRejected { reason });
            }
        };

        // Re-gate against the policy as it exists right now.
        self.gate_checked(&plan.request, Some(plan.plan_id))?;

        debug!(plan_id = %plan.plan_id, "plan permitted at apply time, executing");
        self.runner.run(&plan.request).await
    }

    /// Gate and execute directly, without a plan.
    ///
    /// Intended for idempotent, non-mutating commands; keeping that use
    /// narrow is the policy author's responsibility, not this component's.
    pub async fn run_now(&self, request: RunRequest) -> CordonResult<ExecutionOutcome> {
        self.gate_checked(&request, None)?;
        self.runner.run(&request).await
    }

    /// `run_now` with background mode forced on.
    pub async fn start_background(&self, mut request: RunRequest) -> CordonResult<ExecutionOutcome> {
        request.background = true;
        self.run_now(request).await
    }

    /// Drop expired plans. Returns the number removed.
    pub fn purge_expired(&self) -> usize {
        self.plans.purge_expired(Utc::now())
    }

    // ── Internal ─────────────────────────────────────────────────────────

    /// Load a fresh policy, run the gate, and audit the decision.
    ///
    /// The policy is loaded per call — never cached — so concurrent edits
    /// to the policy file take effect on the very next decision.
    fn gate_checked(&self, request: &RunRequest, plan_id: Option<PlanId>) -> CordonResult<()> {
        let policy = self.policy.load()?;

        let mut record = AuditRecord::for_request(AuditKind::Decision, request);
        record.plan_id = plan_id.map(|id| id.to_string());

        match gate::evaluate(request, &policy) {
            Verdict::Permit => {
                record.outcome = Some("permit".to_string());
                self.audit.record(&record)?;
                Ok(())
            }
            Verdict::Deny { reason } => {
                warn!(
                    binary = %request.binary,
                    role = %request.role,
                    reason = %reason,
                    "request denied"
                );
                record.outcome = Some("deny".to_string());
                record.reason = Some(reason.as_str().to_string());
                self.audit.record(&record)?;
                Err(CordonError::PolicyDenied { reason })
            }
        }
    }
}
