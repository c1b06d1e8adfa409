//! The resilience layer: a `CommandRunner` decorator adding circuit
//! breaking and retry-with-backoff around any inner runner.
//!
//! Ordering per call: breaker check → attempt → classify → maybe retry.
//! The breaker is consulted again before every retry, not just at entry —
//! another caller's failures may have opened the circuit while this call
//! was sleeping out its backoff.
//!
//! Background requests get the breaker check only. Retrying a detached
//! spawn could launch the command twice, and nobody waits on it to know
//! whether it failed anyway.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tracing::{debug, info, warn};

use cordon_contracts::{
    audit::{AuditKind, AuditRecord},
    error::{CordonError, CordonResult},
    outcome::{ExecutionOutcome, ExitClass},
    request::RunRequest,
    verdict::DenyReason,
};
use cordon_core::traits::{AuditSink, CommandRunner};

use crate::breaker::{BreakerConfig, CircuitBreaker, TargetKey};

/// Retry tuning.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the initial attempt. Zero disables retrying.
    pub max_retries: u32,
    /// Backoff base: attempt `n` sleeps `base * 2^n` plus jitter.
    pub base_delay: Duration,
    /// Whether a timed-out run is worth repeating. Off by default — a
    /// command that exhausted the full timeout will usually do it again,
    /// and the caller has already waited once.
    pub retry_on_timeout: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(250),
            retry_on_timeout: false,
        }
    }
}

impl RetryPolicy {
    /// Backoff before retry number `attempt` (zero-based): exponential in
    /// the attempt, plus up to half the base as jitter so synchronized
    /// callers fan out.
    fn backoff(&self, attempt: u32) -> Duration {
        let base = self.base_delay.saturating_mul(2u32.saturating_pow(attempt));
        let jitter_cap = (self.base_delay.as_millis() as u64 / 2).max(1);
        let jitter = rand::rng().random_range(0..jitter_cap);
        base + Duration::from_millis(jitter)
    }

    fn is_retryable(&self, outcome: &ExecutionOutcome) -> bool {
        match outcome.class() {
            Some(ExitClass::TimedOut) => self.retry_on_timeout,
            Some(ExitClass::SpawnFailed) => true,
            Some(ExitClass::Exited) => !outcome.is_success(),
            // Detached is already a success.
            None => false,
        }
    }
}

/// Wraps an inner runner with breaker bookkeeping and retries.
pub struct ResilientRunner {
    inner: Box<dyn CommandRunner>,
    breaker: CircuitBreaker,
    retry: RetryPolicy,
    audit: Arc<dyn AuditSink>,
}

impl ResilientRunner {
    pub fn new(
        inner: Box<dyn CommandRunner>,
        breaker_config: BreakerConfig,
        retry: RetryPolicy,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            inner,
            breaker: CircuitBreaker::new(breaker_config),
            retry,
            audit,
        }
    }

    /// The breaker this runner consults, for inspection.
    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    fn reject_circuit_open(&self, request: &RunRequest) -> CordonError {
        warn!(
            binary = %request.binary,
            cwd = %request.working_directory.display(),
            "circuit open, request rejected"
        );
        let mut record = AuditRecord::for_request(AuditKind::Decision, request);
        record.outcome = Some("deny".to_string());
        record.reason = Some(DenyReason::CircuitOpen.as_str().to_string());
        if let Err(e) = self.audit.record(&record) {
            warn!(error = %e, "audit write failed while rejecting request");
        }
        CordonError::PolicyDenied { reason: DenyReason::CircuitOpen }
    }
}

#[async_trait]
impl CommandRunner for ResilientRunner {
    async fn run(&self, request: &RunRequest) -> CordonResult<ExecutionOutcome> {
        let key = TargetKey::for_request(request);

        if !self.breaker.check(&key) {
            return Err(self.reject_circuit_open(request));
        }

        // Fire-and-forget gets no retries and no outcome bookkeeping —
        // there is no outcome to book. The probe slot taken by `check`
        // still has to come back, or a half-open target wedges.
        if request.background {
            let result = self.inner.run(request).await;
            self.breaker.release_probe(&key);
            return result;
        }

        let mut attempt: u32 = 0;
        loop {
            // An internal fault (audit write, engine fault) counts against
            // the breaker like any other failure; swallowing it would leak
            // the half-open probe slot.
            let outcome = match self.inner.run(request).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    self.breaker.record_failure(&key);
                    return Err(e);
                }
            };

            if outcome.is_success() {
                self.breaker.record_success(&key);
                return Ok(outcome);
            }
            self.breaker.record_failure(&key);

            if !self.retry.is_retryable(&outcome) {
                debug!(binary = %request.binary, "failure not retryable");
                return Ok(outcome);
            }

            if attempt >= self.retry.max_retries {
                if self.retry.max_retries > 0 {
                    info!(
                        binary = %request.binary,
                        attempts = attempt + 1,
                        "retries exhausted"
                    );
                    let mut record =
                        AuditRecord::for_request(AuditKind::RetryExhausted, request);
                    record.attempt = Some(attempt);
                    self.audit.record(&record)?;
                }
                return Ok(outcome);
            }

            let delay = self.retry.backoff(attempt);
            debug!(
                binary = %request.binary,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "retrying after backoff"
            );
            let mut record = AuditRecord::for_request(AuditKind::Retry, request);
            record.attempt = Some(attempt);
            self.audit.record(&record)?;

            tokio::time::sleep(delay).await;
            attempt += 1;

            // The circuit may have opened while we slept.
            if !self.breaker.check(&key) {
                return Err(self.reject_circuit_open(request));
            }
        }
    }
}
