//! # cordon-core
//!
//! The trusted core of the cordon execution daemon: the pure policy gate,
//! the in-memory plan store, and the plan/apply orchestrator that wires
//! gate, store, audit sink, and command runner together.
//!
//! The enforcement pipeline per request:
//!
//!   Load policy (fresh) → Gate → [plan / apply token check] → Runner → Audit
//!
//! The security invariant is absolute: `CommandRunner::run()` is NEVER
//! called unless `gate::evaluate()` returned `Verdict::Permit` against a
//! policy loaded for *this* decision. This is enforced structurally — the
//! only code paths to the runner sit behind the gate check.

pub mod config;
pub mod gate;
pub mod orchestrator;
pub mod plan;
pub mod traits;

pub use config::RuntimeConfig;
pub use gate::evaluate;
pub use orchestrator::Orchestrator;
pub use plan::PlanStore;
pub use traits::{AuditSink, CommandRunner, PolicySource};
