//! # cordon-audit
//!
//! Audit sinks for the cordon daemon. The production sink appends one JSON
//! line per record to a log file; the in-memory sink backs tests and
//! embedders that inspect the trail programmatically.
//!
//! Append-only is a contract, not a file mode: nothing in this crate (or
//! anywhere in the daemon) rewrites or truncates an audit file. Each line
//! is independently parseable, so a reader tolerates a torn final line
//! after a crash by skipping it.

pub mod sink;

pub use sink::{JsonlAuditSink, MemoryAuditSink};
