//! Policy drift detection.
//!
//! Because the daemon re-reads the policy on every decision, an
//! out-of-band edit takes effect silently. The drift check gives
//! operators a tripwire: record a SHA-256 baseline of the reviewed
//! policy, then compare the live file against it later. A mismatch means
//! someone changed the policy since it was last blessed — legitimately or
//! not, the operator decides.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use cordon_contracts::error::{CordonError, CordonResult};

/// A recorded policy fingerprint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriftBaseline {
    /// Hex-encoded SHA-256 of the policy file's bytes.
    pub hash: String,
    pub recorded_at: DateTime<Utc>,
    /// The policy file this baseline fingerprints.
    pub policy_path: PathBuf,
}

/// The result of comparing a policy file against its baseline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriftStatus {
    /// The file matches the recorded baseline.
    Match,
    /// The file has changed since the baseline was recorded.
    Mismatch { expected: String, actual: String },
    /// No baseline has been recorded yet.
    MissingBaseline,
}

impl DriftStatus {
    /// Treat anything but a match as an integrity failure, for CI-style
    /// callers that want drift to be fatal.
    pub fn enforce(self) -> CordonResult<()> {
        match self {
            DriftStatus::Match => Ok(()),
            DriftStatus::Mismatch { expected, actual } => Err(CordonError::IntegrityError {
                reason: format!(
                    "policy drift detected: baseline {} but file hashes to {}",
                    expected, actual
                ),
            }),
            DriftStatus::MissingBaseline => Err(CordonError::IntegrityError {
                reason: "no drift baseline recorded for this policy".to_string(),
            }),
        }
    }
}

/// Hex-encoded SHA-256 of the policy file's raw bytes.
pub fn hash_policy_file(path: impl AsRef<Path>) -> CordonResult<String> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|e| CordonError::IntegrityError {
        reason: format!("cannot read {}: {}", path.display(), e),
    })?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

/// Record (or overwrite) the baseline for `policy_path` at `baseline_path`.
pub fn record_baseline(
    policy_path: impl AsRef<Path>,
    baseline_path: impl AsRef<Path>,
) -> CordonResult<DriftBaseline> {
    let policy_path = policy_path.as_ref();
    let baseline = DriftBaseline {
        hash: hash_policy_file(policy_path)?,
        recorded_at: Utc::now(),
        policy_path: policy_path.to_path_buf(),
    };

    let body = serde_json::to_string_pretty(&baseline).map_err(|e| {
        CordonError::IntegrityError { reason: format!("cannot serialize baseline: {}", e) }
    })?;
    std::fs::write(baseline_path.as_ref(), body).map_err(|e| CordonError::IntegrityError {
        reason: format!(
            "cannot write {}: {}",
            baseline_path.as_ref().display(),
            e
        ),
    })?;

    info!(
        policy = %policy_path.display(),
        hash = %baseline.hash,
        "drift baseline recorded"
    );
    Ok(baseline)
}

/// Load a previously recorded baseline, or `None` if the file is absent.
pub fn load_baseline(baseline_path: impl AsRef<Path>) -> CordonResult<Option<DriftBaseline>> {
    let path = baseline_path.as_ref();
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(CordonError::IntegrityError {
                reason: format!("cannot read {}: {}", path.display(), e),
            })
        }
    };
    let baseline = serde_json::from_str(&raw).map_err(|e| CordonError::IntegrityError {
        reason: format!("cannot parse {}: {}", path.display(), e),
    })?;
    Ok(Some(baseline))
}

/// Compare the policy file against its recorded baseline.
pub fn check(
    policy_path: impl AsRef<Path>,
    baseline_path: impl AsRef<Path>,
) -> CordonResult<DriftStatus> {
    let Some(baseline) = load_baseline(baseline_path)? else {
        warn!("drift check requested but no baseline exists");
        return Ok(DriftStatus::MissingBaseline);
    };

    let actual = hash_policy_file(policy_path)?;
    if actual == baseline.hash {
        Ok(DriftStatus::Match)
    } else {
        warn!(
            expected = %baseline.hash,
            actual = %actual,
            "policy file does not match baseline"
        );
        Ok(DriftStatus::Mismatch { expected: baseline.hash, actual })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (tempfile::TempDir, PathBuf, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let policy = dir.path().join("policy.json");
        let baseline = dir.path().join("policy.baseline.json");
        std::fs::write(&policy, r#"{ "workspaceFence": "/work", "roles": {} }"#).unwrap();
        (dir, policy, baseline)
    }

    #[test]
    fn unchanged_policy_matches_its_baseline() {
        let (_dir, policy, baseline) = setup();
        record_baseline(&policy, &baseline).unwrap();

        let status = check(&policy, &baseline).unwrap();
        assert_eq!(status, DriftStatus::Match);
        assert!(status.enforce().is_ok());
    }

    #[test]
    fn edited_policy_reports_a_mismatch() {
        let (_dir, policy, baseline) = setup();
        let recorded = record_baseline(&policy, &baseline).unwrap();

        std::fs::write(&policy, r#"{ "workspaceFence": "/", "roles": {} }"#).unwrap();

        match check(&policy, &baseline).unwrap() {
            DriftStatus::Mismatch { expected, actual } => {
                assert_eq!(expected, recorded.hash);
                assert_ne!(actual, expected);
            }
            other => panic!("expected Mismatch, got {:?}", other),
        }
    }

    #[test]
    fn missing_baseline_is_its_own_status() {
        let (_dir, policy, baseline) = setup();
        let status = check(&policy, &baseline).unwrap();
        assert_eq!(status, DriftStatus::MissingBaseline);
        assert!(status.enforce().is_err());
    }

    #[test]
    fn re_recording_updates_the_baseline() {
        let (_dir, policy, baseline) = setup();
        record_baseline(&policy, &baseline).unwrap();

        std::fs::write(&policy, r#"{ "workspaceFence": "/", "roles": {} }"#).unwrap();
        assert!(matches!(
            check(&policy, &baseline).unwrap(),
            DriftStatus::Mismatch { .. }
        ));

        record_baseline(&policy, &baseline).unwrap();
        assert_eq!(check(&policy, &baseline).unwrap(), DriftStatus::Match);
    }

    #[test]
    fn hash_is_hex_encoded_sha256() {
        let (_dir, policy, _) = setup();
        let hash = hash_policy_file(&policy).unwrap();
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
