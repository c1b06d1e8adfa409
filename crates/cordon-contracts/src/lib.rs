//! # cordon-contracts
//!
//! Shared types and contracts for the cordon execution daemon.
//!
//! All crates in the workspace import from here. No business logic lives in
//! this crate — only data definitions and error types.

pub mod audit;
pub mod error;
pub mod outcome;
pub mod plan;
pub mod policy;
pub mod request;
pub mod verdict;
