//! The policy document: the authorization source of truth.
//!
//! A `Policy` is hydrated from a JSON document on **every** decision — it is
//! data, never code, and is never cached across calls. Staleness here would
//! be a security bug, so hot edits to the policy file take effect on the
//! very next request without a restart.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A hydrated policy snapshot, immutable for the duration of one decision.
///
/// Field names in the JSON document are camelCase (`workspaceFence`,
/// `denyFlags`, `perBinary`), matching the externally edited `policy.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Policy {
    /// The directory subtree outside of which no command may execute.
    /// Placeholders (e.g. `${WORKSPACE}`) are substituted before hydration.
    pub workspace_fence: PathBuf,

    /// Arguments that unconditionally block execution regardless of role.
    /// Matching is exact, plus a one-directional prefix rule for flags
    /// longer than one character (see the gate for the exact semantics).
    #[serde(default)]
    pub deny_flags: Vec<String>,

    /// Role name → the binaries that role may invoke. A role with no entry
    /// is unknown and always denied.
    #[serde(default)]
    pub roles: BTreeMap<String, RoleGrant>,

    /// Binary name → additional deny-flags, additive to the global set.
    #[serde(default)]
    pub per_binary: BTreeMap<String, BinaryRestriction>,
}

/// The binaries a single role is allowed to invoke.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleGrant {
    pub allowed_binaries: Vec<String>,
}

/// Per-binary deny-flags, checked after the global set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BinaryRestriction {
    #[serde(default)]
    pub deny_flags: Vec<String>,
}
