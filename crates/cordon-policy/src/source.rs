//! Policy source implementations.
//!
//! `JsonPolicySource` is the production loader: read the file, substitute
//! `${VAR}` placeholders, parse JSON, hydrate the typed policy. Every step
//! that can fail maps to `PolicyLoadFailed`, which the request path treats
//! as a denial — no policy, no execution.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, warn};

use cordon_contracts::{
    error::{CordonError, CordonResult},
    policy::Policy,
};
use cordon_core::traits::PolicySource;

/// File-backed policy source.
///
/// Holds only the path and an optional fixed variable set — never a parsed
/// policy. Caching would break the hot-reload contract.
pub struct JsonPolicySource {
    path: PathBuf,
    /// Placeholder values consulted before the process environment. Lets
    /// embedders pin substitutions without touching env vars.
    vars: BTreeMap<String, String>,
}

impl JsonPolicySource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), vars: BTreeMap::new() }
    }

    pub fn with_vars(path: impl Into<PathBuf>, vars: BTreeMap<String, String>) -> Self {
        Self { path: path.into(), vars }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PolicySource for JsonPolicySource {
    fn load(&self) -> CordonResult<Policy> {
        let raw = std::fs::read_to_string(&self.path).map_err(|e| {
            warn!(path = %self.path.display(), error = %e, "policy file unreadable");
            CordonError::PolicyLoadFailed {
                reason: format!("cannot read {}: {}", self.path.display(), e),
            }
        })?;

        let substituted = substitute(&raw, &self.vars)?;

        let policy: Policy = serde_json::from_str(&substituted).map_err(|e| {
            warn!(path = %self.path.display(), error = %e, "policy file malformed");
            CordonError::PolicyLoadFailed {
                reason: format!("cannot parse {}: {}", self.path.display(), e),
            }
        })?;

        debug!(
            path = %self.path.display(),
            roles = policy.roles.len(),
            deny_flags = policy.deny_flags.len(),
            "policy hydrated"
        );
        Ok(policy)
    }
}

/// Replace every `${NAME}` placeholder in `raw`.
///
/// Resolution order: the explicit variable map, then the process
/// environment. An unresolvable placeholder is a load failure — a policy
/// with a hole in it must not be enforced.
fn substitute(raw: &str, vars: &BTreeMap<String, String>) -> CordonResult<String> {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            return Err(CordonError::PolicyLoadFailed {
                reason: "unterminated ${ placeholder in policy file".to_string(),
            });
        };
        let name = &after[..end];
        let value = match vars.get(name) {
            Some(v) => v.clone(),
            None => std::env::var(name).map_err(|_| CordonError::PolicyLoadFailed {
                reason: format!("unresolved placeholder ${{{}}} in policy file", name),
            })?,
        };
        out.push_str(&value);
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

/// In-memory policy source for tests and embedders.
///
/// `replace()` swaps the snapshot under a lock; the next `load()` returns
/// the new policy, mirroring a file edit.
#[derive(Debug)]
pub struct MemoryPolicySource {
    inner: Mutex<Policy>,
}

impl MemoryPolicySource {
    pub fn new(policy: Policy) -> Self {
        Self { inner: Mutex::new(policy) }
    }

    pub fn replace(&self, policy: Policy) {
        *self.inner.lock().expect("policy source lock poisoned") = policy;
    }
}

impl PolicySource for MemoryPolicySource {
    fn load(&self) -> CordonResult<Policy> {
        Ok(self.inner.lock().expect("policy source lock poisoned").clone())
    }
}
