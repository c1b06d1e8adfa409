//! # cordon-integrity
//!
//! Offline integrity checks for cordon policy files. Nothing here sits on
//! the live request path — these are operator tools, run from the `cordon`
//! CLI or a CI step before a policy is deployed:
//!
//! - [`schema`]  — two-phase validation: JSON Schema structure first, then
//!   semantic lint rules over the hydrated policy.
//! - [`posture`] — scores how permissive a valid policy is, flagging
//!   dangerous binaries and missing deny-flags.
//! - [`drift`]   — detects out-of-band edits by comparing the policy
//!   file's hash against a recorded baseline.

pub mod drift;
pub mod posture;
pub mod schema;

pub use drift::{DriftBaseline, DriftStatus};
pub use posture::{PostureReport, Severity};
pub use schema::ValidationReport;
