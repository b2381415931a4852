//! Progress events for observers of a run.

use serde::Serialize;
use tokio::sync::mpsc;

/// Observational event emitted while a run progresses.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProgressUpdate {
    /// Both connections are open.
    Connected { source: String, target: String },
    /// The plan was built.
    PlanReady { tables: usize, padded: bool },
    /// A table task started.
    TableStarted { source: String, target: String },
    /// The target table was (re)created.
    TableProvisioned { table: String, dropped: bool },
    /// A batch was committed.
    RowsCommitted { table: String, rows_committed: u64, commits: usize },
    /// A table finished successfully.
    TableCompleted { table: String, rows: u64, commits: usize },
    /// A table failed in the given phase.
    TableFailed { table: String, phase: String, error: String },
    /// A non-fatal problem.
    Warning { message: String },
    /// The run finished.
    RunCompleted {
        status: String,
        tables_success: usize,
        tables_failed: usize,
        rows_transferred: u64,
    },
}

/// Optional channel to a progress observer.
#[derive(Debug, Clone, Default)]
pub struct ProgressSink {
    tx: Option<mpsc::Sender<ProgressUpdate>>,
}

impl ProgressSink {
    /// A sink that forwards to `tx`.
    pub fn new(tx: mpsc::Sender<ProgressUpdate>) -> Self {
        Self { tx: Some(tx) }
    }

    /// Send an update. A closed or absent receiver is ignored.
    pub async fn send(&self, update: ProgressUpdate) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(update).await;
        }
    }
}
