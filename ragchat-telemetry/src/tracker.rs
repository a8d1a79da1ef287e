//! Tracker backends: where telemetry records end up.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::error::{Result, TelemetryError};
use crate::record::TelemetryRecord;

/// An experiment-tracking backend that stores one record per run.
///
/// Implementations must accept concurrent calls for distinct run ids.
#[async_trait]
pub trait Tracker: Send + Sync {
    /// Short backend name used in logs.
    fn name(&self) -> &str;

    /// Persist a record.
    async fn log_run(&self, record: &TelemetryRecord) -> Result<()>;
}

/// Discards every record. Used when tracking is turned off.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullTracker;

#[async_trait]
impl Tracker for NullTracker {
    fn name(&self) -> &str {
        "none"
    }

    async fn log_run(&self, record: &TelemetryRecord) -> Result<()> {
        debug!(run.id = %record.run_id, status = %record.status, "tracking off; record discarded");
        Ok(())
    }
}

/// Keeps records in memory, keyed by run id.
///
/// Nothing is ever evicted, so this is meant for tests and short-lived
/// tools that read the records back.
///
/// Cloning shares the same storage. An optional artificial latency makes it
/// stand in for a slow remote backend.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTracker {
    runs: Arc<RwLock<HashMap<Uuid, TelemetryRecord>>>,
    latency: Option<Duration>,
}

impl InMemoryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep for `latency` before every write.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn get(&self, run_id: &Uuid) -> Option<TelemetryRecord> {
        self.runs.read().ok()?.get(run_id).cloned()
    }

    pub fn records(&self) -> Vec<TelemetryRecord> {
        self.runs.read().map(|runs| runs.values().cloned().collect()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.runs.read().map(|runs| runs.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Tracker for InMemoryTracker {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn log_run(&self, record: &TelemetryRecord) -> Result<()> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let mut runs = self.runs.write().map_err(|_| TelemetryError::Tracker {
            backend: "in_memory".into(),
            message: "run storage lock poisoned".into(),
        })?;
        if runs.contains_key(&record.run_id) {
            return Err(TelemetryError::DuplicateRun(record.run_id));
        }
        runs.insert(record.run_id, record.clone());
        Ok(())
    }
}

/// Appends one JSON line per run to `<directory>/<experiment>.jsonl`.
#[derive(Debug)]
pub struct JsonlTracker {
    directory: PathBuf,
    // Serialises appends so concurrent runs never interleave within a line.
    write_lock: Mutex<()>,
}

impl JsonlTracker {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self { directory: directory.into(), write_lock: Mutex::new(()) }
    }

    /// File that records for `experiment` are appended to.
    pub fn path_for(&self, experiment: &str) -> PathBuf {
        let file_name: String = experiment
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.directory.join(format!("{file_name}.jsonl"))
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }
}

#[async_trait]
impl Tracker for JsonlTracker {
    fn name(&self) -> &str {
        "jsonl"
    }

    async fn log_run(&self, record: &TelemetryRecord) -> Result<()> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');
        let path = self.path_for(&record.experiment);

        let _guard = self.write_lock.lock().await;
        tokio::fs::create_dir_all(&self.directory).await?;
        let mut file =
            tokio::fs::OpenOptions::new().create(true).append(true).open(&path).await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        debug!(path = %path.display(), run.id = %record.run_id, "appended telemetry record");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragchat_core::{GenerationResult, QueryStatus};

    use crate::record::{CostTable, RunContext};

    fn record(experiment: &str) -> TelemetryRecord {
        TelemetryRecord::from_run(
            experiment,
            RunContext {
                run_id: Uuid::new_v4(),
                query: "q".into(),
                prompt: "Question: q".into(),
                retrieved_source: None,
                similarity: 0.0,
                status: QueryStatus::Answered,
            },
            GenerationResult::fixed("m", "a"),
            &CostTable::default(),
        )
    }

    #[tokio::test]
    async fn in_memory_rejects_second_write_for_a_run() {
        let tracker = InMemoryTracker::new();
        let rec = record("exp");
        tracker.log_run(&rec).await.unwrap();
        let err = tracker.log_run(&rec).await.unwrap_err();
        assert!(matches!(err, TelemetryError::DuplicateRun(id) if id == rec.run_id));
        assert_eq!(tracker.get(&rec.run_id), Some(rec));
    }

    #[tokio::test]
    async fn null_tracker_accepts_repeated_runs() {
        let tracker = NullTracker;
        let rec = record("exp");
        tracker.log_run(&rec).await.unwrap();
        tracker.log_run(&rec).await.unwrap();
        assert_eq!(tracker.name(), "none");
    }

    #[tokio::test]
    async fn concurrent_runs_do_not_interfere() {
        let tracker = InMemoryTracker::new();
        let mut handles = Vec::new();
        for _ in 0..16 {
            let tracker = tracker.clone();
            handles.push(tokio::spawn(async move { tracker.log_run(&record("exp")).await }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(tracker.len(), 16);
    }

    #[tokio::test]
    async fn jsonl_appends_one_line_per_run() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = JsonlTracker::new(dir.path().join("runs"));
        let first = record("sports rag");
        let second = record("sports rag");
        tracker.log_run(&first).await.unwrap();
        tracker.log_run(&second).await.unwrap();

        let path = tracker.path_for("sports rag");
        assert!(path.ends_with("sports_rag.jsonl"));
        let contents = std::fs::read_to_string(path).unwrap();
        let lines: Vec<TelemetryRecord> =
            contents.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
        assert_eq!(lines, vec![first, second]);
    }
}
