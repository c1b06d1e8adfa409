//! The in-memory plan store.
//!
//! Pending plans live in a `Mutex`-guarded map keyed by plan id. The store
//! is not persisted — a daemon restart discards all pending plans, which is
//! the only caller-visible "cancellation" mechanism besides expiry.
//!
//! `claim()` performs the whole apply-side validation (lookup, token,
//! expiry) under one lock acquisition and removes the plan the moment it
//! validates, so two concurrent applies of the same plan can never both
//! succeed.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use cordon_contracts::{
    plan::{Plan, PlanId},
    verdict::DenyReason,
};

/// A registry of pending plans, owned by the orchestrator.
///
/// Construct a fresh store per daemon instance (or per test). All methods
/// take `&self`; interior mutability keeps the orchestrator shareable.
#[derive(Debug, Default)]
pub struct PlanStore {
    inner: Mutex<HashMap<PlanId, Plan>>,
}

impl PlanStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly created plan.
    pub fn insert(&self, plan: Plan) {
        let mut plans = self.inner.lock().expect("plan store lock poisoned");
        debug!(plan_id = %plan.plan_id, expires_at = %plan.expires_at, "plan stored");
        plans.insert(plan.plan_id, plan);
    }

    /// Validate and consume a plan in one atomic step.
    ///
    /// Failure modes, checked in order:
    /// - no entry under `plan_id` → `UnknownOrExpiredPlan`
    /// - approval token mismatch → `ApprovalTokenMismatch` (plan retained;
    ///   a wrong token must not let a third party cancel someone's plan)
    /// - TTL elapsed → `PlanExpired`, and the entry is deleted
    ///
    /// On success the plan is removed — it can never be applied twice.
    pub fn claim(
        &self,
        plan_id: &PlanId,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Plan, DenyReason> {
        let mut plans = self.inner.lock().expect("plan store lock poisoned");

        let Some(plan) = plans.get(plan_id) else {
            warn!(plan_id = %plan_id, "apply for unknown plan id");
            return Err(DenyReason::UnknownOrExpiredPlan);
        };

        if !plan.approval_token.matches(token) {
            warn!(plan_id = %plan_id, "apply with mismatched approval token");
            return Err(DenyReason::ApprovalTokenMismatch);
        }

        if plan.is_expired(now) {
            warn!(plan_id = %plan_id, "apply after plan expiry");
            plans.remove(plan_id);
            return Err(DenyReason::PlanExpired);
        }

        plans.remove(plan_id).ok_or(DenyReason::UnknownOrExpiredPlan)
    }

    /// Drop every plan whose TTL has elapsed. Returns the number removed.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let mut plans = self.inner.lock().expect("plan store lock poisoned");
        let before = plans.len();
        plans.retain(|_, plan| !plan.is_expired(now));
        before - plans.len()
    }

    /// Number of pending plans.
    pub fn len(&self) -> usize {
        self.inner.lock().expect("plan store lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
