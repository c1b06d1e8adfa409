//! Per-target circuit breaker.
//!
//! One breaker instance tracks every execution target the daemon has seen,
//! keyed by binary + working directory — a flaky `npm` in one repo must not
//! trip executions of the same binary elsewhere.
//!
//! State machine per target:
//!
//!   Closed ──(failures reach threshold)──▶ Open
//!   Open   ──(recovery timeout elapses)──▶ HalfOpen
//!   HalfOpen ──(probe budget succeeds)──▶ Closed
//!   HalfOpen ──(any probe fails)────────▶ Open
//!
//! An open circuit is a *policy* outcome, not an execution outcome: callers
//! surface it as a denial with the "circuit open" reason, and nothing is
//! spawned.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use cordon_contracts::request::RunRequest;

/// What a breaker tracks: one binary in one working directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TargetKey {
    pub binary: String,
    pub working_directory: PathBuf,
}

impl TargetKey {
    pub fn for_request(request: &RunRequest) -> Self {
        Self {
            binary: request.binary.clone(),
            working_directory: request.working_directory.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// Breaker tuning. The defaults suit interactive use: trip after a burst
/// of failures, stay open long enough for a transient fault to clear.
#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// Consecutive failures (while closed) that trip the circuit.
    pub failure_threshold: u32,
    /// How long an open circuit rejects calls before probing.
    pub recovery_timeout: Duration,
    /// Probe successes required to close again; a single probe failure
    /// re-opens immediately.
    pub half_open_max_calls: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(30),
            half_open_max_calls: 2,
        }
    }
}

#[derive(Debug)]
struct TargetState {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    half_open_successes: u32,
    half_open_inflight: u32,
}

impl TargetState {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            opened_at: None,
            half_open_successes: 0,
            half_open_inflight: 0,
        }
    }
}

/// Tracks circuit state for every target under one lock.
#[derive(Debug, Default)]
pub struct CircuitBreaker {
    config: BreakerConfig,
    targets: Mutex<HashMap<TargetKey, TargetState>>,
}

impl CircuitBreaker {
    pub fn new(config: BreakerConfig) -> Self {
        Self { config, targets: Mutex::new(HashMap::new()) }
    }

    /// May a call to `key` proceed right now?
    ///
    /// Also drives the open → half-open transition: the first check after
    /// the recovery timeout flips the target into probing mode.
    pub fn check(&self, key: &TargetKey) -> bool {
        let mut targets = self.targets.lock().expect("breaker lock poisoned");
        let target = targets.entry(key.clone()).or_insert_with(TargetState::new);

        match target.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let elapsed = target
                    .opened_at
                    .map(|at| at.elapsed() >= self.config.recovery_timeout)
                    .unwrap_or(true);
                if elapsed {
                    info!(binary = %key.binary, "circuit half-open, probing");
                    target.state = CircuitState::HalfOpen;
                    target.half_open_successes = 0;
                    target.half_open_inflight = 1;
                    true
                } else {
                    debug!(binary = %key.binary, "circuit open, call rejected");
                    false
                }
            }
            CircuitState::HalfOpen => {
                if target.half_open_inflight < self.config.half_open_max_calls {
                    target.half_open_inflight += 1;
                    true
                } else {
                    debug!(binary = %key.binary, "probe budget exhausted, call rejected");
                    false
                }
            }
        }
    }

    /// Record that a permitted call to `key` succeeded.
    pub fn record_success(&self, key: &TargetKey) {
        let mut targets = self.targets.lock().expect("breaker lock poisoned");
        let target = targets.entry(key.clone()).or_insert_with(TargetState::new);

        match target.state {
            CircuitState::Closed => target.consecutive_failures = 0,
            CircuitState::HalfOpen => {
                target.half_open_successes += 1;
                target.half_open_inflight = target.half_open_inflight.saturating_sub(1);
                if target.half_open_successes >= self.config.half_open_max_calls {
                    info!(binary = %key.binary, "circuit closed");
                    *target = TargetState::new();
                }
            }
            // A success report against an open circuit is a late arrival
            // from a call permitted earlier; it does not reset the clock.
            CircuitState::Open => {}
        }
    }

    /// Record that a permitted call to `key` failed.
    pub fn record_failure(&self, key: &TargetKey) {
        let mut targets = self.targets.lock().expect("breaker lock poisoned");
        let target = targets.entry(key.clone()).or_insert_with(TargetState::new);

        match target.state {
            CircuitState::Closed => {
                target.consecutive_failures += 1;
                if target.consecutive_failures >= self.config.failure_threshold {
                    warn!(
                        binary = %key.binary,
                        failures = target.consecutive_failures,
                        "circuit opened"
                    );
                    target.state = CircuitState::Open;
                    target.opened_at = Some(Instant::now());
                }
            }
            CircuitState::HalfOpen => {
                warn!(binary = %key.binary, "probe failed, circuit re-opened");
                target.state = CircuitState::Open;
                target.opened_at = Some(Instant::now());
                target.half_open_successes = 0;
                target.half_open_inflight = 0;
            }
            CircuitState::Open => {}
        }
    }

    /// Return a probe slot admitted by `check` without judging the call.
    ///
    /// For callers that complete without a success/failure verdict (a
    /// detached background spawn has no outcome to report). Every slot
    /// taken from the half-open budget must come back through this,
    /// `record_success`, or `record_failure` — a leaked slot would pin the
    /// target in `HalfOpen` rejecting forever, since the recovery timeout
    /// only applies to `Open`.
    pub fn release_probe(&self, key: &TargetKey) {
        let mut targets = self.targets.lock().expect("breaker lock poisoned");
        if let Some(target) = targets.get_mut(key) {
            if target.state == CircuitState::HalfOpen {
                target.half_open_inflight = target.half_open_inflight.saturating_sub(1);
            }
        }
    }

    /// Current state for `key`; targets never seen report `Closed`.
    pub fn state(&self, key: &TargetKey) -> CircuitState {
        self.targets
            .lock()
            .expect("breaker lock poisoned")
            .get(key)
            .map(|t| t.state)
            .unwrap_or(CircuitState::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(binary: &str, cwd: &str) -> TargetKey {
        TargetKey { binary: binary.to_string(), working_directory: PathBuf::from(cwd) }
    }

    fn breaker(recovery: Duration) -> CircuitBreaker {
        CircuitBreaker::new(BreakerConfig {
            failure_threshold: 3,
            recovery_timeout: recovery,
            half_open_max_calls: 2,
        })
    }

    #[test]
    fn trips_after_consecutive_failures() {
        let breaker = breaker(Duration::from_secs(60));
        let target = key("npm", "/work");

        for _ in 0..2 {
            assert!(breaker.check(&target));
            breaker.record_failure(&target);
        }
        assert_eq!(breaker.state(&target), CircuitState::Closed);

        assert!(breaker.check(&target));
        breaker.record_failure(&target);
        assert_eq!(breaker.state(&target), CircuitState::Open);
        assert!(!breaker.check(&target));
    }

    #[test]
    fn success_resets_the_failure_count() {
        let breaker = breaker(Duration::from_secs(60));
        let target = key("npm", "/work");

        breaker.record_failure(&target);
        breaker.record_failure(&target);
        breaker.record_success(&target);

        // Two more failures do not reach the threshold of three.
        breaker.record_failure(&target);
        breaker.record_failure(&target);
        assert_eq!(breaker.state(&target), CircuitState::Closed);
    }

    #[test]
    fn targets_are_isolated_by_binary_and_directory() {
        let breaker = breaker(Duration::from_secs(60));
        let flaky = key("npm", "/work/a");
        let healthy_elsewhere = key("npm", "/work/b");
        let other_binary = key("git", "/work/a");

        for _ in 0..3 {
            breaker.record_failure(&flaky);
        }
        assert!(!breaker.check(&flaky));
        assert!(breaker.check(&healthy_elsewhere));
        assert!(breaker.check(&other_binary));
    }

    #[test]
    fn recovers_through_half_open_probes() {
        let breaker = breaker(Duration::from_millis(10));
        let target = key("npm", "/work");

        for _ in 0..3 {
            breaker.record_failure(&target);
        }
        assert!(!breaker.check(&target));

        std::thread::sleep(Duration::from_millis(20));

        // First check after recovery flips to half-open and admits a probe.
        assert!(breaker.check(&target));
        assert_eq!(breaker.state(&target), CircuitState::HalfOpen);
        breaker.record_success(&target);

        assert!(breaker.check(&target));
        breaker.record_success(&target);
        assert_eq!(breaker.state(&target), CircuitState::Closed);
    }

    #[test]
    fn probe_failure_reopens_immediately() {
        let breaker = breaker(Duration::from_millis(10));
        let target = key("npm", "/work");

        for _ in 0..3 {
            breaker.record_failure(&target);
        }
        std::thread::sleep(Duration::from_millis(20));

        assert!(breaker.check(&target));
        breaker.record_failure(&target);
        assert_eq!(breaker.state(&target), CircuitState::Open);
        assert!(!breaker.check(&target));
    }

    #[test]
    fn released_slot_is_admitted_again() {
        let breaker = breaker(Duration::from_millis(10));
        let target = key("npm", "/work");

        for _ in 0..3 {
            breaker.record_failure(&target);
        }
        std::thread::sleep(Duration::from_millis(20));

        // Take both probe slots, return one without a verdict.
        assert!(breaker.check(&target));
        assert!(breaker.check(&target));
        assert!(!breaker.check(&target));
        breaker.release_probe(&target);

        assert!(breaker.check(&target));
        assert_eq!(breaker.state(&target), CircuitState::HalfOpen);
    }

    #[test]
    fn half_open_caps_concurrent_probes() {
        let breaker = breaker(Duration::from_millis(10));
        let target = key("npm", "/work");

        for _ in 0..3 {
            breaker.record_failure(&target);
        }
        std::thread::sleep(Duration::from_millis(20));

        // Probe budget is two; a third concurrent call is rejected.
        assert!(breaker.check(&target));
        assert!(breaker.check(&target));
        assert!(!breaker.check(&target));
    }
}
