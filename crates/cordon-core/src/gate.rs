//! The policy gate: the pure permission function.
//!
//! `evaluate()` is deterministic and does no I/O — the policy snapshot it
//! receives was already loaded and hydrated by the caller. Checks run in a
//! fixed order and the first failure wins, each with its own denial reason
//! so the audit log always says exactly which check refused a request:
//!
//!   1. workspace fence   → "escapes workspace fence"
//!   2. role exists       → "unknown role"
//!   3. binary allowed    → "binary not allowed for role"
//!   4. global deny-flags → "denied flags (global)"
//!   5. per-binary flags  → "denied flags for binary"

use std::path::{Component, Path, PathBuf};

use tracing::{debug, warn};

use cordon_contracts::{
    policy::Policy,
    request::RunRequest,
    verdict::{DenyReason, Verdict},
};

/// Evaluate one request against one policy snapshot.
pub fn evaluate(request: &RunRequest, policy: &Policy) -> Verdict {
    debug!(
        binary = %request.binary,
        role = %request.role,
        cwd = %request.working_directory.display(),
        "evaluating request"
    );

    // ── 1. Workspace fence ───────────────────────────────────────────────
    //
    // The normalized working directory must equal or descend from the
    // normalized fence. Relative working directories resolve against the
    // fence root, so they can never escape it by construction — only an
    // absolute path or a `..` chain can, and normalization folds both.
    let fence = normalize(&policy.workspace_fence);
    let cwd = if request.working_directory.is_absolute() {
        normalize(&request.working_directory)
    } else {
        normalize(&fence.join(&request.working_directory))
    };
    if !cwd.starts_with(&fence) {
        warn!(
            cwd = %cwd.display(),
            fence = %fence.display(),
            "working directory outside workspace fence"
        );
        return Verdict::Deny { reason: DenyReason::EscapesWorkspaceFence };
    }

    // ── 2. Role ──────────────────────────────────────────────────────────
    let Some(grant) = policy.roles.get(&request.role) else {
        warn!(role = %request.role, "role has no policy entry");
        return Verdict::Deny { reason: DenyReason::UnknownRole };
    };

    // ── 3. Binary allow-list ─────────────────────────────────────────────
    if !grant.allowed_binaries.iter().any(|b| b == &request.binary) {
        warn!(
            binary = %request.binary,
            role = %request.role,
            "binary not in role allow-list"
        );
        return Verdict::Deny { reason: DenyReason::BinaryNotAllowed };
    }

    // ── 4. Global deny-flags ─────────────────────────────────────────────
    if let Some(flag) = first_denied_flag(&request.args, &policy.deny_flags) {
        warn!(flag = %flag, "argument matched global deny-flag");
        return Verdict::Deny { reason: DenyReason::DeniedFlagsGlobal };
    }

    // ── 5. Per-binary deny-flags ─────────────────────────────────────────
    if let Some(restriction) = policy.per_binary.get(&request.binary) {
        if let Some(flag) = first_denied_flag(&request.args, &restriction.deny_flags) {
            warn!(
                binary = %request.binary,
                flag = %flag,
                "argument matched per-binary deny-flag"
            );
            return Verdict::Deny { reason: DenyReason::DeniedFlagsBinary };
        }
    }

    debug!(binary = %request.binary, role = %request.role, "request permitted");
    Verdict::Permit
}

/// Return the first deny-flag any argument matches, or `None`.
///
/// Matching rule: exact token match, OR the argument starts with the
/// deny-flag and the deny-flag has more than one significant character
/// (characters after its leading dashes). The length guard keeps a
/// single-character flag like `-r` from prefix-matching unrelated
/// arguments, while `-rf` still catches bundled forms like `-rfv`. The
/// asymmetry is a known heuristic, preserved on purpose — long-form
/// bundling conventions of other tools are not modeled, and changing the
/// rule would silently alter which commands are blocked.
fn first_denied_flag<'p>(args: &[String], deny_flags: &'p [String]) -> Option<&'p str> {
    for arg in args {
        for flag in deny_flags {
            let exact = arg == flag;
            let multi_char = flag.trim_start_matches('-').len() > 1;
            let prefix = multi_char && arg.starts_with(flag.as_str());
            if exact || prefix {
                return Some(flag);
            }
        }
    }
    None
}

/// Lexically normalize a path: fold `.` away and resolve `..` against the
/// components seen so far, never popping past the root.
///
/// Deliberately lexical rather than `canonicalize()` — the gate must be
/// able to judge a working directory that does not exist yet, and policy
/// containment here is allow-list-level, not OS-level.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(p) => out.push(p.as_os_str()),
            Component::RootDir => out.push(Component::RootDir.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                // Popping the root is a no-op; `/..` stays `/`.
                let popped = out.pop();
                if !popped {
                    out.push(Component::RootDir.as_os_str());
                }
            }
            Component::Normal(part) => out.push(part),
        }
    }
    out
}
