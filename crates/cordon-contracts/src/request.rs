//! The run request: one bounded command invocation on behalf of a caller.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A request to run one OS binary. Immutable once submitted.
///
/// Arguments are carried as a vector and handed to the OS as an argument
/// vector — they are never concatenated into a shell string, which
/// forecloses injection through argument content.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRequest {
    /// The binary to invoke (resolved via PATH by the OS).
    pub binary: String,

    /// Ordered argument vector, exactly as it will be passed to the process.
    #[serde(default)]
    pub args: Vec<String>,

    /// Working directory for the process. Relative paths resolve against
    /// the workspace fence root.
    pub working_directory: PathBuf,

    /// The caller's role, looked up in the policy's role table.
    pub role: String,

    /// Extra environment variables for the child process. A `BTreeMap` so
    /// previews and audit records render them in a stable order.
    #[serde(default)]
    pub env_overrides: BTreeMap<String, String>,

    /// Fire-and-forget mode: spawn, confirm, detach, return immediately.
    #[serde(default)]
    pub background: bool,
}

impl RunRequest {
    /// Render the command line for previews and logs.
    ///
    /// Display only — this string is never executed.
    pub fn command_line(&self) -> String {
        std::iter::once(self.binary.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// The environment variable **names** this request would set.
    ///
    /// Values are intentionally not exposed — previews must never leak
    /// secrets that callers pass through the environment.
    pub fn env_keys(&self) -> Vec<String> {
        self.env_overrides.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> RunRequest {
        RunRequest {
            binary: "git".to_string(),
            args: vec!["push".to_string(), "origin".to_string()],
            working_directory: PathBuf::from("/work/repo"),
            role: "builder".to_string(),
            env_overrides: [
                ("GIT_TOKEN".to_string(), "hunter2".to_string()),
                ("CI".to_string(), "1".to_string()),
            ]
            .into_iter()
            .collect(),
            background: false,
        }
    }

    #[test]
    fn command_line_joins_binary_and_args() {
        assert_eq!(request().command_line(), "git push origin");
    }

    #[test]
    fn env_keys_exposes_names_only_in_stable_order() {
        let keys = request().env_keys();
        assert_eq!(keys, vec!["CI", "GIT_TOKEN"]);
        // The secret value must not appear anywhere in the keys.
        assert!(!keys.iter().any(|k| k.contains("hunter2")));
    }
}
