//! End-to-end pipeline tests: runtime config, file-backed policy,
//! orchestrator, resilience layer, process engine, and JSONL audit wired
//! together the way a deployment wires them.

use std::sync::Arc;
use std::time::Duration;

use cordon_audit::JsonlAuditSink;
use cordon_contracts::{
    audit::{AuditKind, AuditRecord},
    error::CordonError,
    outcome::ExecutionOutcome,
    request::RunRequest,
    verdict::DenyReason,
};
use cordon_core::{Orchestrator, RuntimeConfig};
use cordon_exec::{BreakerConfig, ProcessEngine, ResilientRunner, RetryPolicy};
use cordon_policy::JsonPolicySource;

struct Deployment {
    orchestrator: Orchestrator,
    policy_path: std::path::PathBuf,
    audit_path: std::path::PathBuf,
    workspace: std::path::PathBuf,
    _dir: tempfile::TempDir,
}

/// Wire the stack from a `RuntimeConfig`, exactly as a daemon main would.
fn deploy(binaries: &[&str]) -> Deployment {
    let dir = tempfile::tempdir().unwrap();
    let workspace = dir.path().to_path_buf();
    let policy_path = dir.path().join("policy.json");
    let audit_path = dir.path().join("audit.jsonl");
    std::fs::write(&policy_path, policy_body(&workspace, binaries)).unwrap();

    let config = RuntimeConfig::from_vars(vec![
        ("CORDON_TIMEOUT_MS".to_string(), "5000".to_string()),
        ("CORDON_MAX_RETRIES".to_string(), "0".to_string()),
        (
            "CORDON_POLICY_PATH".to_string(),
            policy_path.display().to_string(),
        ),
        (
            "CORDON_LOG_PATH".to_string(),
            audit_path.display().to_string(),
        ),
    ])
    .unwrap();

    let audit: Arc<JsonlAuditSink> = Arc::new(JsonlAuditSink::open(&config.log_path).unwrap());
    let engine = ProcessEngine::new(config.timeout, audit.clone());
    let runner = ResilientRunner::new(
        Box::new(engine),
        BreakerConfig::default(),
        RetryPolicy {
            max_retries: config.max_retries,
            base_delay: config.retry_base,
            retry_on_timeout: false,
        },
        audit.clone(),
    );
    let orchestrator = Orchestrator::new(
        Box::new(JsonPolicySource::new(&config.policy_path)),
        Box::new(runner),
        audit,
        config.plan_ttl,
    );

    Deployment { orchestrator, policy_path, audit_path, workspace, _dir: dir }
}

fn policy_body(workspace: &std::path::Path, binaries: &[&str]) -> String {
    let allowed: Vec<String> = binaries.iter().map(|b| format!("{:?}", b)).collect();
    format!(
        r#"{{
            "workspaceFence": {:?},
            "denyFlags": ["--force", "-rf"],
            "roles": {{ "builder": {{ "allowedBinaries": [{}] }} }}
        }}"#,
        workspace.display().to_string(),
        allowed.join(", ")
    )
}

fn request(workspace: &std::path::Path, binary: &str, args: &[&str]) -> RunRequest {
    RunRequest {
        binary: binary.to_string(),
        args: args.iter().map(|s| s.to_string()).collect(),
        working_directory: workspace.to_path_buf(),
        role: "builder".to_string(),
        env_overrides: Default::default(),
        background: false,
    }
}

fn audit_kinds(path: &std::path::Path) -> Vec<AuditKind> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str::<AuditRecord>(line).unwrap().kind)
        .collect()
}

#[tokio::test]
async fn plan_then_apply_runs_the_command_and_audits_every_stage() {
    let d = deploy(&["echo"]);

    let preview = d
        .orchestrator
        .plan(request(&d.workspace, "echo", &["hello"]), None)
        .unwrap();
    let token = preview.approval_token.as_str().to_string();

    let outcome = d.orchestrator.apply(&preview.plan_id, &token).await.unwrap();
    match outcome {
        ExecutionOutcome::Completed { exit_code, stdout, .. } => {
            assert_eq!(exit_code, 0);
            assert_eq!(stdout.trim(), "hello");
        }
        other => panic!("expected Completed, got {:?}", other),
    }

    // plan decision, apply decision, spawn, exit — in that order.
    assert_eq!(
        audit_kinds(&d.audit_path),
        vec![
            AuditKind::Decision,
            AuditKind::Decision,
            AuditKind::Spawn,
            AuditKind::Exit
        ]
    );
}

#[tokio::test]
async fn policy_edit_between_plan_and_apply_is_honored() {
    let d = deploy(&["echo"]);

    let preview = d
        .orchestrator
        .plan(request(&d.workspace, "echo", &["hello"]), None)
        .unwrap();
    let token = preview.approval_token.as_str().to_string();

    // Revoke echo while the plan is pending.
    std::fs::write(&d.policy_path, policy_body(&d.workspace, &[])).unwrap();

    let err = d.orchestrator.apply(&preview.plan_id, &token).await.unwrap_err();
    match err {
        CordonError::PolicyDenied { reason } => {
            assert_eq!(reason, DenyReason::BinaryNotAllowed);
        }
        other => panic!("expected PolicyDenied, got {:?}", other),
    }

    // Nothing was spawned after the revocation.
    let kinds = audit_kinds(&d.audit_path);
    assert!(!kinds.contains(&AuditKind::Spawn));
}

#[tokio::test]
async fn denied_flag_is_refused_and_audited_on_the_direct_path() {
    let d = deploy(&["echo"]);

    let err = d
        .orchestrator
        .run_now(request(&d.workspace, "echo", &["--force"]))
        .await
        .unwrap_err();
    match err {
        CordonError::PolicyDenied { reason } => {
            assert_eq!(reason, DenyReason::DeniedFlagsGlobal);
        }
        other => panic!("expected PolicyDenied, got {:?}", other),
    }

    let records: Vec<AuditRecord> = std::fs::read_to_string(&d.audit_path)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].kind, AuditKind::Decision);
    assert_eq!(records[0].reason.as_deref(), Some("denied flags (global)"));
}

#[tokio::test]
async fn background_start_detaches_through_the_whole_stack() {
    let d = deploy(&["sleep"]);

    let started = std::time::Instant::now();
    let outcome = d
        .orchestrator
        .start_background(request(&d.workspace, "sleep", &["0.2"]))
        .await
        .unwrap();
    assert!(started.elapsed() < Duration::from_millis(150));

    match outcome {
        ExecutionOutcome::Detached { pid } => assert!(pid.is_some()),
        other => panic!("expected Detached, got {:?}", other),
    }

    assert_eq!(
        audit_kinds(&d.audit_path),
        vec![AuditKind::Decision, AuditKind::Background]
    );
}
