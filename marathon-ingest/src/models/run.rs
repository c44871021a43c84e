//! Run state machine and statistics
//!
//! Overall status: PENDING → RUNNING → COMPLETED | FAILED
//!
//! Pipeline stage: IDLE → READING → {PROCESSING, DRAINING} → COMPLETED | FAILED

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::batch::error::{ErrorKind, RowError};

/// Overall run status reported to pollers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RunState {
    /// Registered, pipeline not yet started
    Pending,
    /// Pipeline consuming rows
    Running,
    /// End of input reached
    Completed,
    /// Unrecoverable error
    Failed,
}

/// Pipeline stage (finer grained than `RunState`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PipelineStage {
    Idle,
    /// Pulling rows into the current chunk
    Reading,
    /// Writing a full chunk
    Processing,
    /// Writing the final partial chunk after end of input
    Draining,
    Completed,
    Failed,
}

/// A row dropped from the run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedRow {
    pub row_number: usize,
    pub bib_number: Option<String>,
    pub kind: ErrorKind,
    pub message: String,
    pub occurred_at: DateTime<Utc>,
}

impl From<&RowError> for SkippedRow {
    fn from(err: &RowError) -> Self {
        Self {
            row_number: err.row(),
            bib_number: err.bib().map(str::to_string),
            kind: err.kind(),
            message: err.to_string(),
            occurred_at: Utc::now(),
        }
    }
}

/// Counters and status of one run
///
/// Mutated only by the pipeline; pollers receive clones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunStatistics {
    pub run_id: Uuid,
    pub event_id: i64,
    pub file_path: String,
    pub state: RunState,
    pub stage: PipelineStage,
    pub rows_read: u64,
    pub rows_written: u64,
    pub rows_skipped: u64,
    pub commit_count: u64,
    pub skips_by_kind: BTreeMap<ErrorKind, u64>,
    pub skipped_rows: Vec<SkippedRow>,
    pub failure: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl RunStatistics {
    pub fn new(run_id: Uuid, event_id: i64, file_path: String) -> Self {
        Self {
            run_id,
            event_id,
            file_path,
            state: RunState::Pending,
            stage: PipelineStage::Idle,
            rows_read: 0,
            rows_written: 0,
            rows_skipped: 0,
            commit_count: 0,
            skips_by_kind: BTreeMap::new(),
            skipped_rows: Vec::new(),
            failure: None,
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    /// (written + skipped) / read × 100, rounded; 0 before anything is read
    pub fn progress_percentage(&self) -> u8 {
        if self.rows_read == 0 {
            return 0;
        }
        let processed = (self.rows_written + self.rows_skipped) as f64;
        let pct = (processed / self.rows_read as f64 * 100.0).round();
        pct.clamp(0.0, 100.0) as u8
    }

    pub fn enter_stage(&mut self, stage: PipelineStage) {
        if self.state == RunState::Pending {
            self.state = RunState::Running;
        }
        self.stage = stage;
    }

    pub fn record_skip(&mut self, err: &RowError) {
        self.rows_skipped += 1;
        *self.skips_by_kind.entry(err.kind()).or_insert(0) += 1;
        self.skipped_rows.push(SkippedRow::from(err));
    }

    /// Count rows that reached the store and the transactions that wrote them
    pub fn record_commits(&mut self, written: usize, commits: u64) {
        self.rows_written += written as u64;
        self.commit_count += commits;
    }

    pub fn complete(&mut self) {
        self.state = RunState::Completed;
        self.stage = PipelineStage::Completed;
        self.ended_at = Some(Utc::now());
    }

    pub fn fail(&mut self, reason: String) {
        self.state = RunState::Failed;
        self.stage = PipelineStage::Failed;
        self.failure = Some(reason);
        self.ended_at = Some(Utc::now());
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.state, RunState::Completed | RunState::Failed)
    }

    /// Human-readable status line
    pub fn message(&self) -> String {
        match self.state {
            RunState::Pending => "Job is starting...".to_string(),
            RunState::Running => "Job is running...".to_string(),
            RunState::Completed => "Job completed successfully".to_string(),
            RunState::Failed => format!(
                "Job failed: {}",
                self.failure.as_deref().unwrap_or("unknown error")
            ),
        }
    }

    pub fn duration_seconds(&self) -> u64 {
        let end = self.ended_at.unwrap_or_else(Utc::now);
        (end - self.started_at).num_seconds().max(0) as u64
    }
}
