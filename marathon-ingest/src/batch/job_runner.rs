//! Run launcher and status store
//!
//! `start` resolves reference data on the caller's task (so an unknown event
//! fails immediately), then spawns the pipeline and returns the run id.
//! Pollers read `RunStatistics` snapshots from the shared status store.

use chrono::{DateTime, Utc};
use marathon_common::events::{EventBus, IngestEvent};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinError;
use uuid::Uuid;

use super::error::{PipelineError, StartError};
use super::pipeline::{ChunkPipeline, RunContext};
use super::reference_cache::{load_snapshot, ReferenceCache};
use super::row_source::{open_row_source, MemoryRowSource};
use crate::models::{PipelinePolicy, RunStatistics, SnapshotPayload};
use crate::store::ResultStore;

/// Finished runs kept for polling; older ones are pruned on the next start
const MAX_FINISHED_RUNS: usize = 100;

/// Latest statistics per run id
pub type StatusStore = Arc<RwLock<HashMap<Uuid, RunStatistics>>>;

#[derive(Clone)]
pub struct JobRunner {
    store: Arc<dyn ResultStore>,
    policy: PipelinePolicy,
    statuses: StatusStore,
    event_bus: EventBus,
}

impl JobRunner {
    pub fn new(store: Arc<dyn ResultStore>, policy: PipelinePolicy, event_bus: EventBus) -> Self {
        Self {
            store,
            policy,
            statuses: Arc::new(RwLock::new(HashMap::new())),
            event_bus,
        }
    }

    pub fn store(&self) -> &Arc<dyn ResultStore> {
        &self.store
    }

    pub fn policy(&self) -> &PipelinePolicy {
        &self.policy
    }

    /// Launch a run for `event_id` over the file at `file_path`
    ///
    /// Does not wait for the run. Concurrent starts for the same event are
    /// not deduplicated here.
    pub async fn start(&self, event_id: i64, file_path: PathBuf) -> Result<Uuid, StartError> {
        let snapshot = load_snapshot(self.store.as_ref(), event_id).await?;
        let payload = snapshot.encode()?;

        let run_id = Uuid::new_v4();
        let stats = RunStatistics::new(run_id, event_id, file_path.display().to_string());
        {
            let mut statuses = self.statuses.write().await;
            let pruned = prune_finished(&mut statuses, MAX_FINISHED_RUNS);
            if pruned > 0 {
                tracing::debug!(pruned, "Pruned finished runs from status store");
            }
            statuses.insert(run_id, stats.clone());
        }

        tracing::info!(
            run_id = %run_id,
            event_id,
            file = %file_path.display(),
            chunk_size = self.policy.chunk_size,
            skip_limit = self.policy.skip_limit,
            retry_limit = self.policy.retry_limit,
            "Launching result ingestion run"
        );

        let runner = self.clone();
        let task = tokio::spawn(async move {
            tracing::info!(run_id = %run_id, "Background ingestion task started");
            runner.execute(stats, payload, file_path).await
        });

        let supervisor = self.clone();
        tokio::spawn(async move {
            match task.await {
                Ok(stats) => tracing::info!(
                    run_id = %run_id,
                    state = ?stats.state,
                    "Background ingestion task finished"
                ),
                Err(err) => supervisor.abort(run_id, err).await,
            }
        });

        Ok(run_id)
    }

    /// Latest statistics for a run, `None` for unknown ids
    pub async fn status(&self, run_id: Uuid) -> Option<RunStatistics> {
        self.statuses.read().await.get(&run_id).cloned()
    }

    pub async fn tracked_runs(&self) -> usize {
        self.statuses.read().await.len()
    }

    /// Drive one run to a terminal state
    async fn execute(
        &self,
        mut stats: RunStatistics,
        payload: SnapshotPayload,
        file_path: PathBuf,
    ) -> RunStatistics {
        let run_id = stats.run_id;
        self.event_bus.emit_lossy(IngestEvent::RunStarted {
            run_id,
            event_id: stats.event_id,
            file_path: stats.file_path.clone(),
            timestamp: Utc::now(),
        });

        let pipeline = ChunkPipeline::new(
            Arc::clone(&self.store),
            self.policy.clone(),
            Arc::clone(&self.statuses),
            self.event_bus.clone(),
        );

        let mut cache = ReferenceCache::new();
        let snapshot = match cache.ensure(&payload) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                self.finish(&mut stats, Err(err)).await;
                return stats;
            }
        };

        let mut ctx = RunContext::new(snapshot, stats);
        let result = match open_source(&file_path).await {
            Ok(mut source) => pipeline.run(&mut ctx, &mut source).await,
            Err(err) => Err(err),
        };

        self.finish(&mut ctx.stats, result).await;
        ctx.stats
    }

    /// Fail a run whose task died without reaching a terminal state
    async fn abort(&self, run_id: Uuid, err: JoinError) {
        let reason = format!("Run task aborted: {}", err);
        tracing::error!(run_id = %run_id, error = %reason, "Background ingestion task died");

        let mut statuses = self.statuses.write().await;
        let Some(stats) = statuses.get_mut(&run_id) else {
            return;
        };
        if stats.is_terminal() {
            return;
        }
        stats.fail(reason.clone());
        self.event_bus.emit_lossy(IngestEvent::RunFailed {
            run_id,
            reason,
            rows_written: stats.rows_written,
            timestamp: Utc::now(),
        });
    }

    /// Record the terminal state, publish it and announce it
    async fn finish(&self, stats: &mut RunStatistics, result: Result<(), PipelineError>) {
        match result {
            Ok(()) => {
                stats.complete();
                tracing::info!(
                    run_id = %stats.run_id,
                    rows_read = stats.rows_read,
                    rows_written = stats.rows_written,
                    rows_skipped = stats.rows_skipped,
                    commit_count = stats.commit_count,
                    duration_seconds = stats.duration_seconds(),
                    "Ingestion run completed"
                );
                if stats.rows_skipped > 0 {
                    tracing::warn!(
                        run_id = %stats.run_id,
                        rows_skipped = stats.rows_skipped,
                        skips_by_kind = ?stats.skips_by_kind,
                        "Ingestion run completed with skipped rows"
                    );
                }
                self.event_bus.emit_lossy(IngestEvent::RunCompleted {
                    run_id: stats.run_id,
                    rows_read: stats.rows_read,
                    rows_written: stats.rows_written,
                    rows_skipped: stats.rows_skipped,
                    duration_seconds: stats.duration_seconds(),
                    timestamp: Utc::now(),
                });
            }
            Err(err) => {
                let reason = err.to_string();
                tracing::error!(
                    run_id = %stats.run_id,
                    rows_read = stats.rows_read,
                    rows_written = stats.rows_written,
                    rows_skipped = stats.rows_skipped,
                    error = %reason,
                    "Ingestion run failed"
                );
                stats.fail(reason.clone());
                self.event_bus.emit_lossy(IngestEvent::RunFailed {
                    run_id: stats.run_id,
                    reason,
                    rows_written: stats.rows_written,
                    timestamp: Utc::now(),
                });
            }
        }

        self.statuses
            .write()
            .await
            .insert(stats.run_id, stats.clone());
    }
}

/// Drop the oldest finished runs so at most `keep` of them remain
///
/// Pending and running entries are never removed. Returns the number pruned.
fn prune_finished(statuses: &mut HashMap<Uuid, RunStatistics>, keep: usize) -> usize {
    let mut finished: Vec<(Uuid, Option<DateTime<Utc>>)> = statuses
        .values()
        .filter(|stats| stats.is_terminal())
        .map(|stats| (stats.run_id, stats.ended_at))
        .collect();
    if finished.len() <= keep {
        return 0;
    }

    finished.sort_by_key(|(_, ended_at)| *ended_at);
    let excess = finished.len() - keep;
    for (run_id, _) in finished.into_iter().take(excess) {
        statuses.remove(&run_id);
    }
    excess
}

/// Parse the uploaded file on the blocking pool
async fn open_source(path: &Path) -> Result<MemoryRowSource, PipelineError> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || open_row_source(&path))
        .await
        .map_err(|e| PipelineError::SourceRead(format!("Reader task failed: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn finished(minutes_ago: i64) -> RunStatistics {
        let mut stats = RunStatistics::new(Uuid::new_v4(), 1, "results.csv".to_string());
        stats.complete();
        stats.ended_at = Some(Utc::now() - Duration::minutes(minutes_ago));
        stats
    }

    #[test]
    fn test_prune_keeps_newest_finished_runs() {
        let oldest = finished(30);
        let middle = finished(20);
        let newest = finished(10);
        let running = RunStatistics::new(Uuid::new_v4(), 1, "results.csv".to_string());

        let mut statuses: HashMap<Uuid, RunStatistics> = [&oldest, &middle, &newest, &running]
            .into_iter()
            .map(|stats| (stats.run_id, stats.clone()))
            .collect();

        assert_eq!(prune_finished(&mut statuses, 2), 1);
        assert!(!statuses.contains_key(&oldest.run_id));
        assert!(statuses.contains_key(&middle.run_id));
        assert!(statuses.contains_key(&newest.run_id));
        assert!(statuses.contains_key(&running.run_id));
    }

    #[test]
    fn test_prune_never_removes_active_runs() {
        let mut statuses: HashMap<Uuid, RunStatistics> = (0..3)
            .map(|_| RunStatistics::new(Uuid::new_v4(), 1, "results.csv".to_string()))
            .map(|stats| (stats.run_id, stats))
            .collect();

        assert_eq!(prune_finished(&mut statuses, 0), 0);
        assert_eq!(statuses.len(), 3);
    }
}
