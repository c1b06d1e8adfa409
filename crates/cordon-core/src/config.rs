//! Runtime configuration, read from the environment at startup.
//!
//! Every knob has a default; the daemon starts with zero configuration and
//! tightens from there. Malformed values are startup errors, not silent
//! fallbacks — a typo in a timeout must not quietly grant a longer one.

use std::path::PathBuf;
use std::time::Duration;

use tracing::debug;

use cordon_contracts::error::{CordonError, CordonResult};

const ENV_ROLE: &str = "CORDON_ROLE";
const ENV_WORKSPACE: &str = "CORDON_WORKSPACE";
const ENV_TIMEOUT_MS: &str = "CORDON_TIMEOUT_MS";
const ENV_LOG_PATH: &str = "CORDON_LOG_PATH";
const ENV_POLICY_PATH: &str = "CORDON_POLICY_PATH";
const ENV_MAX_RETRIES: &str = "CORDON_MAX_RETRIES";
const ENV_RETRY_BASE_MS: &str = "CORDON_RETRY_BASE_MS";
const ENV_PLAN_TTL_MS: &str = "CORDON_PLAN_TTL_MS";

/// Startup configuration for one daemon instance.
///
/// Assembled once at boot and handed to the components that need each
/// piece; nothing re-reads the environment afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeConfig {
    /// Default role attached to requests that do not name one.
    pub role: String,
    /// Workspace fence root used when the policy file does not set one.
    pub workspace: PathBuf,
    /// Foreground execution timeout.
    pub timeout: Duration,
    /// Audit log destination.
    pub log_path: PathBuf,
    /// Policy file location.
    pub policy_path: PathBuf,
    /// Retry attempts after the initial try.
    pub max_retries: u32,
    /// Base delay for exponential retry backoff.
    pub retry_base: Duration,
    /// How long a pending plan stays claimable.
    pub plan_ttl: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            role: "default".to_string(),
            workspace: PathBuf::from("/workspace"),
            timeout: Duration::from_secs(30),
            log_path: PathBuf::from("cordon-audit.jsonl"),
            policy_path: PathBuf::from("cordon-policy.json"),
            max_retries: 2,
            retry_base: Duration::from_millis(250),
            plan_ttl: Duration::from_secs(300),
        }
    }
}

impl RuntimeConfig {
    /// Build a configuration from the process environment.
    pub fn from_env() -> CordonResult<Self> {
        Self::from_vars(std::env::vars())
    }

    /// Build a configuration from an explicit variable set.
    ///
    /// Separated from `from_env` so tests can exercise parsing without
    /// mutating the process environment.
    pub fn from_vars<I>(vars: I) -> CordonResult<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut config = Self::default();

        for (key, value) in vars {
            match key.as_str() {
                ENV_ROLE => config.role = value,
                ENV_WORKSPACE => config.workspace = PathBuf::from(value),
                ENV_LOG_PATH => config.log_path = PathBuf::from(value),
                ENV_POLICY_PATH => config.policy_path = PathBuf::from(value),
                ENV_TIMEOUT_MS => {
                    config.timeout = Duration::from_millis(parse_u64(&key, &value)?)
                }
                ENV_RETRY_BASE_MS => {
                    config.retry_base = Duration::from_millis(parse_u64(&key, &value)?)
                }
                ENV_PLAN_TTL_MS => {
                    config.plan_ttl = Duration::from_millis(parse_u64(&key, &value)?)
                }
                ENV_MAX_RETRIES => {
                    config.max_retries =
                        value.parse().map_err(|_| CordonError::ConfigError {
                            reason: format!("{} is not a valid count: {:?}", key, value),
                        })?
                }
                _ => {}
            }
        }

        debug!(
            role = %config.role,
            workspace = %config.workspace.display(),
            timeout_ms = config.timeout.as_millis() as u64,
            policy_path = %config.policy_path.display(),
            "runtime configuration assembled"
        );
        Ok(config)
    }
}

fn parse_u64(key: &str, value: &str) -> CordonResult<u64> {
    value.parse().map_err(|_| CordonError::ConfigError {
        reason: format!("{} is not a valid millisecond value: {:?}", key, value),
    })
}
