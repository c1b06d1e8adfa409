//! # cordon-policy
//!
//! Policy loading for the cordon daemon: a file-backed JSON source that
//! re-reads and re-hydrates the policy on every decision, plus an in-memory
//! source for tests and embedders.
//!
//! Hot reload is a property of *not caching*: there is no watcher thread and
//! no invalidation protocol. Each `load()` reads the file as it exists at
//! that instant, so an edit takes effect on the very next decision.

pub mod source;

pub use source::{JsonPolicySource, MemoryPolicySource};
