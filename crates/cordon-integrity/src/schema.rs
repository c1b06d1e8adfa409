//! Two-phase policy validation.
//!
//! 1. **Structural** — the raw JSON document is validated against the
//!    embedded policy schema using the `jsonschema` crate. All violations
//!    are collected, not just the first.
//! 2. **Semantic** — lint rules over the hydrated policy: things the
//!    schema cannot express, like cross-references between sections.
//!
//! Errors block deployment; warnings are advisory. The semantic phase only
//! runs when the structural phase passed — linting a document that failed
//! to hydrate would just repeat the structural errors in worse words.

use std::path::Path;

use tracing::{debug, warn};

use cordon_contracts::{
    error::{CordonError, CordonResult},
    policy::Policy,
};

/// JSON Schema for the policy document. Embedded so the validator has no
/// runtime file dependency beyond the policy itself.
const POLICY_SCHEMA: &str = r#"{
    "type": "object",
    "required": ["workspaceFence", "roles"],
    "additionalProperties": false,
    "properties": {
        "workspaceFence": { "type": "string", "minLength": 1 },
        "denyFlags": {
            "type": "array",
            "items": { "type": "string", "minLength": 1 }
        },
        "roles": {
            "type": "object",
            "additionalProperties": {
                "type": "object",
                "required": ["allowedBinaries"],
                "additionalProperties": false,
                "properties": {
                    "allowedBinaries": {
                        "type": "array",
                        "items": { "type": "string", "minLength": 1 }
                    }
                }
            }
        },
        "perBinary": {
            "type": "object",
            "additionalProperties": {
                "type": "object",
                "required": ["denyFlags"],
                "additionalProperties": false,
                "properties": {
                    "denyFlags": {
                        "type": "array",
                        "items": { "type": "string", "minLength": 1 }
                    }
                }
            }
        }
    }
}"#;

/// The outcome of validating one policy file.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    /// Violations that must block deployment.
    pub errors: Vec<String>,
    /// Advisory findings; the policy is usable but worth a look.
    pub warnings: Vec<String>,
}

impl ValidationReport {
    /// True when the policy must not be deployed.
    pub fn is_blocking(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Validate the policy file at `path`, both phases.
pub fn validate_policy_file(path: impl AsRef<Path>) -> CordonResult<ValidationReport> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path).map_err(|e| CordonError::IntegrityError {
        reason: format!("cannot read {}: {}", path.display(), e),
    })?;

    let document: serde_json::Value =
        serde_json::from_str(&raw).map_err(|e| CordonError::IntegrityError {
            reason: format!("{} is not valid JSON: {}", path.display(), e),
        })?;

    let mut report = ValidationReport::default();

    // ── Phase 1: structural ──────────────────────────────────────────────
    let schema: serde_json::Value =
        serde_json::from_str(POLICY_SCHEMA).map_err(|e| CordonError::IntegrityError {
            reason: format!("embedded policy schema is malformed: {}", e),
        })?;
    let validator =
        jsonschema::validator_for(&schema).map_err(|e| CordonError::IntegrityError {
            reason: format!("embedded policy schema does not compile: {}", e),
        })?;

    for error in validator.iter_errors(&document) {
        let message = format!("schema violation at {}: {}", error.instance_path, error);
        warn!(path = %path.display(), %message, "structural validation failure");
        report.errors.push(message);
    }

    if report.is_blocking() {
        return Ok(report);
    }

    // ── Phase 2: semantic ────────────────────────────────────────────────
    let policy: Policy =
        serde_json::from_str(&raw).map_err(|e| CordonError::IntegrityError {
            reason: format!("cannot hydrate {}: {}", path.display(), e),
        })?;
    lint(&policy, &mut report);

    debug!(
        path = %path.display(),
        errors = report.errors.len(),
        warnings = report.warnings.len(),
        "validation complete"
    );
    Ok(report)
}

/// Semantic lint rules over a hydrated policy.
fn lint(policy: &Policy, report: &mut ValidationReport) {
    for (name, grant) in &policy.roles {
        if !is_identifier(name) {
            report.errors.push(format!(
                "role name {:?} is not a valid identifier (letters, digits, '-', '_')",
                name
            ));
        }
        if grant.allowed_binaries.is_empty() {
            report.warnings.push(format!(
                "role {:?} allows no binaries and can never run anything",
                name
            ));
        }
    }

    // A perBinary entry for a binary no role can run is dead configuration,
    // usually a leftover from a removed grant.
    for binary in policy.per_binary.keys() {
        let reachable = policy
            .roles
            .values()
            .any(|grant| grant.allowed_binaries.iter().any(|b| b == binary));
        if !reachable {
            report.warnings.push(format!(
                "perBinary entry for {:?} is unreachable: no role allows that binary",
                binary
            ));
        }
    }
}

fn is_identifier(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
