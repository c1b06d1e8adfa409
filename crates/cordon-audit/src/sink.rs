//! Audit sink implementations.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use tracing::debug;

use cordon_contracts::{
    audit::AuditRecord,
    error::{CordonError, CordonResult},
};
use cordon_core::traits::AuditSink;

/// File-backed JSONL sink: one serialized record per line, append-only.
///
/// The file handle is opened once in append mode and guarded by a mutex, so
/// concurrent records serialize into whole lines rather than interleaving.
/// Each write is flushed immediately — an audit record that only exists in
/// a userspace buffer at crash time was never really recorded.
pub struct JsonlAuditSink {
    file: Mutex<File>,
}

impl JsonlAuditSink {
    /// Open (or create) the audit log at `path` for appending.
    pub fn open(path: impl AsRef<Path>) -> CordonResult<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| CordonError::AuditWriteFailed {
                reason: format!("cannot open {}: {}", path.display(), e),
            })?;
        debug!(path = %path.display(), "audit log opened");
        Ok(Self { file: Mutex::new(file) })
    }
}

impl AuditSink for JsonlAuditSink {
    fn record(&self, record: &AuditRecord) -> CordonResult<()> {
        let line = serde_json::to_string(record).map_err(|e| CordonError::AuditWriteFailed {
            reason: format!("cannot serialize audit record: {}", e),
        })?;

        let mut file = self.file.lock().expect("audit sink lock poisoned");
        file.write_all(line.as_bytes())
            .and_then(|_| file.write_all(b"\n"))
            .and_then(|_| file.flush())
            .map_err(|e| CordonError::AuditWriteFailed {
                reason: format!("cannot append audit record: {}", e),
            })
    }
}

/// In-memory sink for tests and embedders.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    records: Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A point-in-time copy of every record seen so far.
    pub fn snapshot(&self) -> Vec<AuditRecord> {
        self.records.lock().expect("audit sink lock poisoned").clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().expect("audit sink lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, record: &AuditRecord) -> CordonResult<()> {
        self.records.lock().expect("audit sink lock poisoned").push(record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use cordon_contracts::audit::AuditKind;
    use cordon_contracts::request::RunRequest;

    use super::*;

    fn record(kind: AuditKind) -> AuditRecord {
        AuditRecord::for_request(
            kind,
            &RunRequest {
                binary: "git".to_string(),
                args: vec!["status".to_string()],
                working_directory: PathBuf::from("/work"),
                role: "builder".to_string(),
                env_overrides: Default::default(),
                background: false,
            },
        )
    }

    #[test]
    fn each_line_parses_independently() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");

        let sink = JsonlAuditSink::open(&path).unwrap();
        sink.record(&record(AuditKind::Decision)).unwrap();
        sink.record(&record(AuditKind::Spawn)).unwrap();
        sink.record(&record(AuditKind::Exit)).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let kinds: Vec<AuditKind> = contents
            .lines()
            .map(|line| serde_json::from_str::<AuditRecord>(line).unwrap().kind)
            .collect();
        assert_eq!(kinds, vec![AuditKind::Decision, AuditKind::Spawn, AuditKind::Exit]);
    }

    #[test]
    fn reopening_appends_rather_than_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");

        {
            let sink = JsonlAuditSink::open(&path).unwrap();
            sink.record(&record(AuditKind::Decision)).unwrap();
        }
        {
            let sink = JsonlAuditSink::open(&path).unwrap();
            sink.record(&record(AuditKind::Exit)).unwrap();
        }

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
    }

    #[test]
    fn a_torn_final_line_does_not_poison_earlier_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");

        let sink = JsonlAuditSink::open(&path).unwrap();
        sink.record(&record(AuditKind::Decision)).unwrap();

        // Simulate a crash mid-write: a partial trailing line.
        {
            use std::io::Write as _;
            let mut file = OpenOptions::new().append(true).open(&path).unwrap();
            file.write_all(b"{\"timestamp\":\"2026-01-").unwrap();
        }

        let contents = std::fs::read_to_string(&path).unwrap();
        let parsed: Vec<AuditRecord> = contents
            .lines()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].kind, AuditKind::Decision);
    }

    #[test]
    fn memory_sink_snapshots_in_order() {
        let sink = MemoryAuditSink::new();
        sink.record(&record(AuditKind::Decision)).unwrap();
        sink.record(&record(AuditKind::Spawn)).unwrap();

        let snapshot = sink.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].kind, AuditKind::Decision);
        assert_eq!(snapshot[1].kind, AuditKind::Spawn);
    }
}
