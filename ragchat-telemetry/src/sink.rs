//! Non-blocking dispatch of telemetry records.
//!
//! The sink turns a finished query into a [`TelemetryRecord`] and writes it
//! through a [`Tracker`] on a background task. Callers never wait on the
//! tracker; failures are logged and dropped. Every dispatched task is owned
//! by the sink so that [`TelemetrySink::shutdown`] can give in-flight writes
//! a bounded grace period before the process exits.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ragchat_core::{Completion, GenerationResult};
use tokio::runtime::Handle;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::record::{CostTable, RunContext, TelemetryRecord};
use crate::tracker::Tracker;

/// Outcome of [`TelemetrySink::shutdown`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Writes that finished within the grace period.
    pub drained: usize,
    /// Writes still running when the grace period ran out; they were aborted.
    pub abandoned: usize,
}

/// Fire-and-forget telemetry front end.
///
/// Cheap to clone; clones share the same tracker and task set.
#[derive(Clone)]
pub struct TelemetrySink {
    inner: Arc<SinkInner>,
}

struct SinkInner {
    tracker: Arc<dyn Tracker>,
    experiment: String,
    costs: CostTable,
    tasks: Mutex<JoinSet<()>>,
    closed: AtomicBool,
    written: AtomicU64,
    failed: AtomicU64,
}

impl TelemetrySink {
    pub fn new(tracker: Arc<dyn Tracker>, experiment: impl Into<String>) -> Self {
        Self::with_cost_table(tracker, experiment, CostTable::default())
    }

    pub fn with_cost_table(
        tracker: Arc<dyn Tracker>,
        experiment: impl Into<String>,
        costs: CostTable,
    ) -> Self {
        Self {
            inner: Arc::new(SinkInner {
                tracker,
                experiment: experiment.into(),
                costs,
                tasks: Mutex::new(JoinSet::new()),
                closed: AtomicBool::new(false),
                written: AtomicU64::new(0),
                failed: AtomicU64::new(0),
            }),
        }
    }

    pub fn experiment(&self) -> &str {
        &self.inner.experiment
    }

    pub fn tracker_name(&self) -> &str {
        self.inner.tracker.name()
    }

    /// Dispatch a record for a query whose result is already known.
    ///
    /// Returns immediately.
    pub fn record(&self, context: RunContext, result: GenerationResult) {
        self.dispatch(context, Completion::ready(result));
    }

    /// Dispatch a record once `completion` settles.
    ///
    /// Used for streamed answers: the record is written after the stream is
    /// drained, fails, or is abandoned. A failed stream is recorded as
    /// `Failed`; an abandoned one keeps its status with `completed = false`.
    pub fn record_deferred(&self, context: RunContext, completion: Completion) {
        self.dispatch(context, completion);
    }

    /// Number of dispatched writes that have not finished yet.
    pub fn pending(&self) -> usize {
        match self.inner.tasks.lock() {
            Ok(mut tasks) => {
                reap(&mut tasks);
                tasks.len()
            }
            Err(_) => 0,
        }
    }

    /// Records written successfully so far.
    pub fn written(&self) -> u64 {
        self.inner.written.load(Ordering::Relaxed)
    }

    /// Records the tracker rejected so far.
    pub fn failed(&self) -> u64 {
        self.inner.failed.load(Ordering::Relaxed)
    }

    /// Stop accepting records and wait up to `grace` for in-flight writes.
    ///
    /// Writes still running at the deadline are aborted and counted as
    /// abandoned. Calling this more than once is harmless.
    pub async fn shutdown(&self, grace: Duration) -> ShutdownReport {
        self.inner.closed.store(true, Ordering::SeqCst);
        let mut tasks = match self.inner.tasks.lock() {
            Ok(mut guard) => std::mem::take(&mut *guard),
            Err(_) => return ShutdownReport::default(),
        };

        let deadline = Instant::now() + grace;
        let mut report = ShutdownReport::default();
        loop {
            match tokio::time::timeout_at(deadline, tasks.join_next()).await {
                Ok(Some(_)) => report.drained += 1,
                Ok(None) => break,
                Err(_) => {
                    report.abandoned = tasks.len();
                    tasks.abort_all();
                    break;
                }
            }
        }

        if report.abandoned > 0 {
            warn!(
                abandoned = report.abandoned,
                grace_ms = grace.as_millis() as u64,
                "telemetry writes did not finish before shutdown"
            );
        } else {
            info!(
                drained = report.drained,
                written = self.written(),
                failed = self.failed(),
                "telemetry sink shut down"
            );
        }
        report
    }

    fn dispatch(&self, context: RunContext, completion: Completion) {
        if self.inner.closed.load(Ordering::SeqCst) {
            warn!(run.id = %context.run_id, "telemetry sink is shut down; dropping record");
            return;
        }
        let Ok(handle) = Handle::try_current() else {
            warn!(run.id = %context.run_id, "no async runtime; dropping telemetry record");
            return;
        };

        let inner = Arc::clone(&self.inner);
        let task = async move {
            let run_id = context.run_id;
            let Some(result) = completion.wait().await else {
                warn!(run.id = %run_id, "generation vanished before settling; no record written");
                return;
            };
            let record = TelemetryRecord::from_run(&inner.experiment, context, result, &inner.costs);
            match inner.tracker.log_run(&record).await {
                Ok(()) => {
                    inner.written.fetch_add(1, Ordering::Relaxed);
                    debug!(run.id = %run_id, tracker = inner.tracker.name(), "telemetry recorded");
                }
                Err(e) => {
                    inner.failed.fetch_add(1, Ordering::Relaxed);
                    warn!(run.id = %run_id, tracker = inner.tracker.name(), error = %e, "failed to record telemetry");
                }
            }
        };

        match self.inner.tasks.lock() {
            Ok(mut tasks) => {
                reap(&mut tasks);
                tasks.spawn_on(task, &handle);
            }
            Err(_) => warn!("telemetry task set poisoned; dropping record"),
        }
    }
}

impl std::fmt::Debug for TelemetrySink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetrySink")
            .field("tracker", &self.inner.tracker.name())
            .field("experiment", &self.inner.experiment)
            .field("closed", &self.inner.closed.load(Ordering::Relaxed))
            .finish()
    }
}

/// Drop handles of tasks that already finished.
fn reap(tasks: &mut JoinSet<()>) {
    while tasks.try_join_next().is_some() {}
}
