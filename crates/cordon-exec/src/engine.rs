//! The process execution engine.
//!
//! Spawns exactly what the permitted request describes: the binary and its
//! argument vector go straight to the OS, never through a shell, so there
//! is no second command language to sanitize.
//!
//! Foreground runs capture both streams, race the child against a
//! wall-clock timeout, and always reach one of three terminal classes
//! (exited / spawn failed / timed out). Background runs confirm the spawn,
//! report the pid, and detach with all stdio nulled.
//!
//! Audit emission per execution, in causal order:
//!
//!   spawn|background → exit | error | timeout

use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, warn};

use cordon_contracts::{
    audit::{AuditKind, AuditRecord},
    error::CordonResult,
    outcome::{ExecutionOutcome, ExitClass},
    request::RunRequest,
};
use cordon_core::traits::{AuditSink, CommandRunner};

/// The real `CommandRunner`: spawns OS processes for permitted requests.
pub struct ProcessEngine {
    timeout: Duration,
    audit: Arc<dyn AuditSink>,
}

impl ProcessEngine {
    pub fn new(timeout: Duration, audit: Arc<dyn AuditSink>) -> Self {
        Self { timeout, audit }
    }

    fn command_for(&self, request: &RunRequest) -> Command {
        let mut command = Command::new(&request.binary);
        command
            .args(&request.args)
            .current_dir(&request.working_directory)
            .envs(&request.env_overrides);
        command
    }

    async fn run_foreground(&self, request: &RunRequest) -> CordonResult<ExecutionOutcome> {
        let started = Instant::now();

        let mut command = self.command_for(request);
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // If the timeout drops the wait future, the child dies with it.
            .kill_on_drop(true);

        let child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!(binary = %request.binary, error = %e, "spawn failed");
                let mut record = AuditRecord::for_request(AuditKind::Error, request);
                record.reason = Some(e.to_string());
                fill_terminal(&mut record, -1, None, elapsed_ms(started), 0, 0);
                self.audit.record(&record)?;
                return Ok(ExecutionOutcome::spawn_failure(e, elapsed_ms(started)));
            }
        };

        let pid = child.id();
        debug!(binary = %request.binary, pid = ?pid, "process spawned");
        let mut record = AuditRecord::for_request(AuditKind::Spawn, request);
        record.pid = pid;
        self.audit.record(&record)?;

        match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => {
                let duration_ms = elapsed_ms(started);
                let exit_code = output.status.code().unwrap_or(-1);
                let signal = exit_signal(&output.status);
                let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
                let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

                info!(
                    binary = %request.binary,
                    exit_code,
                    duration_ms,
                    "process exited"
                );
                let mut record = AuditRecord::for_request(AuditKind::Exit, request);
                fill_terminal(
                    &mut record,
                    exit_code,
                    signal,
                    duration_ms,
                    output.stdout.len() as u64,
                    output.stderr.len() as u64,
                );
                record.pid = pid;
                self.audit.record(&record)?;

                Ok(ExecutionOutcome::Completed {
                    exit_code,
                    signal,
                    duration_ms,
                    stdout,
                    stderr,
                    class: ExitClass::Exited,
                })
            }
            Ok(Err(e)) => {
                // The spawn succeeded but the wait itself failed.
                warn!(binary = %request.binary, error = %e, "wait failed");
                let mut record = AuditRecord::for_request(AuditKind::Error, request);
                record.reason = Some(e.to_string());
                fill_terminal(&mut record, -1, None, elapsed_ms(started), 0, 0);
                record.pid = pid;
                self.audit.record(&record)?;
                Ok(ExecutionOutcome::spawn_failure(e, elapsed_ms(started)))
            }
            Err(_elapsed) => {
                // Dropping the wait future killed the child (kill_on_drop).
                let duration_ms = elapsed_ms(started);
                warn!(
                    binary = %request.binary,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "process timed out and was killed"
                );
                let mut record = AuditRecord::for_request(AuditKind::Timeout, request);
                fill_terminal(&mut record, -1, Some(9), duration_ms, 0, 0);
                record.pid = pid;
                self.audit.record(&record)?;

                Ok(ExecutionOutcome::Completed {
                    exit_code: -1,
                    signal: Some(9),
                    duration_ms,
                    stdout: String::new(),
                    stderr: String::new(),
                    class: ExitClass::TimedOut,
                })
            }
        }
    }

    async fn run_background(&self, request: &RunRequest) -> CordonResult<ExecutionOutcome> {
        let started = Instant::now();

        let mut command = self.command_for(request);
        command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(false);

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!(binary = %request.binary, error = %e, "background spawn failed");
                let mut record = AuditRecord::for_request(AuditKind::Error, request);
                record.reason = Some(e.to_string());
                fill_terminal(&mut record, -1, None, elapsed_ms(started), 0, 0);
                self.audit.record(&record)?;
                return Ok(ExecutionOutcome::spawn_failure(e, elapsed_ms(started)));
            }
        };

        let pid = child.id();
        info!(binary = %request.binary, pid = ?pid, "background process detached");
        let mut record = AuditRecord::for_request(AuditKind::Background, request);
        record.pid = pid;
        self.audit.record(&record)?;

        // Reap the child when it eventually exits so it never lingers as a
        // zombie. Its outcome is nobody's business by then.
        tokio::spawn(async move {
            let _ = child.wait().await;
        });

        Ok(ExecutionOutcome::Detached { pid })
    }
}

#[async_trait]
impl CommandRunner for ProcessEngine {
    async fn run(&self, request: &RunRequest) -> CordonResult<ExecutionOutcome> {
        if request.background {
            self.run_background(request).await
        } else {
            self.run_foreground(request).await
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

/// Every terminal record (`exit`/`error`/`timeout`) carries the same field
/// set, so log consumers never branch on record kind to find a duration or
/// a byte count.
fn fill_terminal(
    record: &mut AuditRecord,
    exit_code: i32,
    signal: Option<i32>,
    duration_ms: u64,
    stdout_bytes: u64,
    stderr_bytes: u64,
) {
    record.exit_code = Some(exit_code);
    record.signal = signal;
    record.duration_ms = Some(duration_ms);
    record.stdout_bytes = Some(stdout_bytes);
    record.stderr_bytes = Some(stderr_bytes);
}

#[cfg(unix)]
fn exit_signal(status: &std::process::ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn exit_signal(_status: &std::process::ExitStatus) -> Option<i32> {
    None
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use cordon_audit::MemoryAuditSink;

    use super::*;

    fn request(binary: &str, args: &[&str]) -> RunRequest {
        RunRequest {
            binary: binary.to_string(),
            args: args.iter().map(|s| s.to_string()).collect(),
            working_directory: std::env::temp_dir(),
            role: "builder".to_string(),
            env_overrides: Default::default(),
            background: false,
        }
    }

    fn engine(timeout: Duration) -> (ProcessEngine, Arc<MemoryAuditSink>) {
        let audit = Arc::new(MemoryAuditSink::new());
        (ProcessEngine::new(timeout, audit.clone()), audit)
    }

    #[tokio::test]
    async fn clean_exit_captures_stdout() {
        let (engine, audit) = engine(Duration::from_secs(5));

        let outcome = engine.run(&request("echo", &["hello"])).await.unwrap();
        match outcome {
            ExecutionOutcome::Completed { exit_code, stdout, class, .. } => {
                assert_eq!(exit_code, 0);
                assert_eq!(stdout.trim(), "hello");
                assert_eq!(class, ExitClass::Exited);
            }
            other => panic!("expected Completed, got {:?}", other),
        }

        let kinds: Vec<AuditKind> = audit.snapshot().iter().map(|r| r.kind).collect();
        assert_eq!(kinds, vec![AuditKind::Spawn, AuditKind::Exit]);
    }

    #[tokio::test]
    async fn exit_record_carries_byte_counts_not_output() {
        let (engine, audit) = engine(Duration::from_secs(5));

        engine.run(&request("echo", &["hello"])).await.unwrap();

        let snapshot = audit.snapshot();
        let exit = snapshot.iter().find(|r| r.kind == AuditKind::Exit).unwrap();
        assert_eq!(exit.stdout_bytes, Some(6)); // "hello\n"
        assert_eq!(exit.stderr_bytes, Some(0));
        let json = serde_json::to_string(exit).unwrap();
        assert!(!json.contains("hello"));
    }

    #[tokio::test]
    async fn nonzero_exit_is_completed_not_an_error() {
        let (engine, _) = engine(Duration::from_secs(5));

        let outcome = engine.run(&request("sh", &["-c", "exit 3"])).await.unwrap();
        match outcome {
            ExecutionOutcome::Completed { exit_code, class, .. } => {
                assert_eq!(exit_code, 3);
                assert_eq!(class, ExitClass::Exited);
            }
            other => panic!("expected Completed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn missing_binary_is_a_spawn_failure() {
        let (engine, audit) = engine(Duration::from_secs(5));

        let outcome = engine
            .run(&request("cordon-test-no-such-binary", &[]))
            .await
            .unwrap();
        match outcome {
            ExecutionOutcome::Completed { exit_code, class, stderr, .. } => {
                assert_eq!(exit_code, -1);
                assert_eq!(class, ExitClass::SpawnFailed);
                assert!(!stderr.is_empty());
            }
            other => panic!("expected Completed, got {:?}", other),
        }

        let snapshot = audit.snapshot();
        assert_eq!(snapshot.len(), 1);
        let error = &snapshot[0];
        assert_eq!(error.kind, AuditKind::Error);
        // Terminal records share one field shape regardless of kind.
        assert_eq!(error.exit_code, Some(-1));
        assert_eq!(error.stdout_bytes, Some(0));
        assert_eq!(error.stderr_bytes, Some(0));
        assert!(error.duration_ms.is_some());
        assert!(error.reason.is_some());
    }

    #[tokio::test]
    async fn timeout_kills_the_process() {
        let (engine, audit) = engine(Duration::from_millis(100));

        let started = Instant::now();
        let outcome = engine.run(&request("sleep", &["30"])).await.unwrap();
        assert!(started.elapsed() < Duration::from_secs(5));

        match outcome {
            ExecutionOutcome::Completed { exit_code, signal, class, .. } => {
                assert_eq!(exit_code, -1);
                assert_eq!(signal, Some(9));
                assert_eq!(class, ExitClass::TimedOut);
            }
            other => panic!("expected Completed, got {:?}", other),
        }

        let snapshot = audit.snapshot();
        let kinds: Vec<AuditKind> = snapshot.iter().map(|r| r.kind).collect();
        assert_eq!(kinds, vec![AuditKind::Spawn, AuditKind::Timeout]);

        // The timeout record carries the full terminal field shape.
        let timeout = &snapshot[1];
        assert_eq!(timeout.exit_code, Some(-1));
        assert_eq!(timeout.signal, Some(9));
        assert_eq!(timeout.stdout_bytes, Some(0));
        assert_eq!(timeout.stderr_bytes, Some(0));
        assert!(timeout.duration_ms.is_some());
    }

    #[tokio::test]
    async fn background_request_detaches_with_a_pid() {
        let (engine, audit) = engine(Duration::from_millis(100));

        let mut req = request("sleep", &["0.1"]);
        req.background = true;

        // Completes immediately, well inside the foreground timeout.
        let started = Instant::now();
        let outcome = engine.run(&req).await.unwrap();
        assert!(started.elapsed() < Duration::from_millis(100));

        match outcome {
            ExecutionOutcome::Detached { pid } => assert!(pid.is_some()),
            other => panic!("expected Detached, got {:?}", other),
        }

        let snapshot = audit.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].kind, AuditKind::Background);
        assert!(snapshot[0].pid.is_some());
    }

    #[tokio::test]
    async fn env_overrides_reach_the_child() {
        let (engine, _) = engine(Duration::from_secs(5));

        let mut req = request("sh", &["-c", "printf %s \"$CORDON_TEST_MARKER\""]);
        req.env_overrides
            .insert("CORDON_TEST_MARKER".to_string(), "present".to_string());

        let outcome = engine.run(&req).await.unwrap();
        match outcome {
            ExecutionOutcome::Completed { stdout, .. } => assert_eq!(stdout, "present"),
            other => panic!("expected Completed, got {:?}", other),
        }
    }
}
