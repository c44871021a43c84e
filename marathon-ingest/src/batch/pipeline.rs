//! Chunked read → validate/assemble → write orchestration
//!
//! ```text
//! Idle → Reading ─┬→ Processing (full chunk) ─→ Reading ...
//!                 └→ Draining (end of input) ─→ Completed
//!        any fatal error ─→ Failed
//! ```
//!
//! Chunks run strictly one after another: chunk N is committed before the
//! first row of chunk N+1 is pulled. Status is published after every chunk.

use chrono::Utc;
use marathon_common::events::{EventBus, IngestEvent};
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

use super::assembler::assemble;
use super::error::{PipelineError, RowError};
use super::job_runner::StatusStore;
use super::row_parser::parse_row;
use super::row_source::RowSource;
use super::validator::validate;
use super::writer::{BatchWriter, ChunkItem};
use crate::models::{PipelineStage, PipelinePolicy, RawRow, ReferenceSnapshot, RunStatistics};
use crate::store::ResultStore;

/// Explicit per-run state threaded through every step
pub struct RunContext {
    pub run_id: Uuid,
    pub event_id: i64,
    pub snapshot: Arc<ReferenceSnapshot>,
    pub stats: RunStatistics,
    /// Bibs accepted so far in this run
    seen_bibs: HashSet<String>,
}

impl RunContext {
    pub fn new(snapshot: Arc<ReferenceSnapshot>, stats: RunStatistics) -> Self {
        Self {
            run_id: stats.run_id,
            event_id: snapshot.event_id(),
            snapshot,
            stats,
            seen_bibs: HashSet::new(),
        }
    }
}

pub struct ChunkPipeline {
    store: Arc<dyn ResultStore>,
    policy: PipelinePolicy,
    statuses: StatusStore,
    event_bus: EventBus,
}

impl ChunkPipeline {
    pub fn new(
        store: Arc<dyn ResultStore>,
        policy: PipelinePolicy,
        statuses: StatusStore,
        event_bus: EventBus,
    ) -> Self {
        Self {
            store,
            policy,
            statuses,
            event_bus,
        }
    }

    pub fn policy(&self) -> &PipelinePolicy {
        &self.policy
    }

    /// Consume the source chunk by chunk until end of input
    ///
    /// Leaves terminal bookkeeping (complete/fail) to the caller. Chunks
    /// committed before an error stay committed.
    pub async fn run(
        &self,
        ctx: &mut RunContext,
        source: &mut dyn RowSource,
    ) -> Result<(), PipelineError> {
        let writer = BatchWriter::new(self.store.as_ref(), &self.policy);
        let mut chunk_index: u64 = 0;

        loop {
            ctx.stats.enter_stage(PipelineStage::Reading);
            self.publish(ctx).await;

            let mut chunk: Vec<ChunkItem> = Vec::with_capacity(self.policy.chunk_size);
            let mut pulled = 0usize;
            let mut exhausted = false;

            while pulled < self.policy.chunk_size {
                let Some(row) = source.next_row()? else {
                    exhausted = true;
                    break;
                };
                pulled += 1;
                ctx.stats.rows_read += 1;

                match self.process_row(ctx, &row).await? {
                    Ok(item) => chunk.push(item),
                    Err(row_error) => self.skip(ctx, row_error)?,
                }
            }

            if pulled == 0 {
                break;
            }

            chunk_index += 1;
            let stage = if exhausted {
                PipelineStage::Draining
            } else {
                PipelineStage::Processing
            };
            ctx.stats.enter_stage(stage);

            tracing::debug!(
                run_id = %ctx.run_id,
                chunk = chunk_index,
                rows = pulled,
                records = chunk.len(),
                stage = ?stage,
                "Chunk assembled"
            );

            let outcome = match writer.write_chunk(&chunk).await {
                Ok(outcome) => outcome,
                Err(partial) => {
                    // Records committed before the failure stay committed
                    let committed = &partial.committed;
                    ctx.stats.record_commits(committed.written, committed.commits);
                    for rejected in &committed.rejected {
                        ctx.stats.record_skip(rejected);
                    }
                    return Err(partial.error);
                }
            };
            ctx.stats.record_commits(outcome.written, outcome.commits);
            for rejected in outcome.rejected {
                ctx.seen_bibs.remove(rejected.bib().unwrap_or_default());
                self.skip(ctx, rejected)?;
            }

            self.publish(ctx).await;
            if outcome.commits > 0 {
                self.event_bus.emit_lossy(IngestEvent::ChunkCommitted {
                    run_id: ctx.run_id,
                    rows_read: ctx.stats.rows_read,
                    rows_written: ctx.stats.rows_written,
                    rows_skipped: ctx.stats.rows_skipped,
                    commit_count: ctx.stats.commit_count,
                    progress_percentage: ctx.stats.progress_percentage(),
                    timestamp: Utc::now(),
                });
            }

            tracing::info!(
                run_id = %ctx.run_id,
                chunk = chunk_index,
                written = outcome.written,
                rows_read = ctx.stats.rows_read,
                rows_written = ctx.stats.rows_written,
                rows_skipped = ctx.stats.rows_skipped,
                commit_count = ctx.stats.commit_count,
                "Chunk written"
            );

            if exhausted {
                break;
            }
        }

        Ok(())
    }

    /// Parse, validate and assemble one row
    ///
    /// The outer error is fatal, the inner one is a row failure for the
    /// skip policy.
    async fn process_row(
        &self,
        ctx: &mut RunContext,
        row: &RawRow,
    ) -> Result<Result<ChunkItem, RowError>, PipelineError> {
        let candidate = match parse_row(row) {
            Ok(candidate) => candidate,
            Err(err) => return Ok(Err(err)),
        };

        let bib = candidate.bib_number.clone();
        let seen_in_run = ctx.seen_bibs.contains(&bib);
        let in_store = if bib.is_empty() || seen_in_run {
            false
        } else {
            // Reads are not retried; only chunk writes are
            self.store.exists_duplicate(ctx.event_id, &bib).await?
        };

        if let Err(err) = validate(&candidate, &ctx.snapshot, |_, _| seen_in_run || in_store) {
            return Ok(Err(err));
        }

        let row_number = candidate.row_number;
        match assemble(candidate, &ctx.snapshot) {
            Ok(record) => {
                ctx.seen_bibs.insert(bib);
                Ok(Ok(ChunkItem { row_number, record }))
            }
            Err(err) => Ok(Err(err)),
        }
    }

    /// Apply the skip policy to a row failure
    fn skip(&self, ctx: &mut RunContext, err: RowError) -> Result<(), PipelineError> {
        let kind = err.kind();
        if !self.policy.is_skippable(kind) {
            tracing::error!(
                run_id = %ctx.run_id,
                row = err.row(),
                kind = %kind,
                error = %err,
                "Row error is not skippable"
            );
            return Err(PipelineError::Unskippable { kind, error: err });
        }

        ctx.stats.record_skip(&err);
        tracing::warn!(
            run_id = %ctx.run_id,
            row = err.row(),
            bib = err.bib().unwrap_or(""),
            kind = %kind,
            skipped = ctx.stats.rows_skipped,
            "Skipping row: {}",
            err
        );

        if ctx.stats.rows_skipped > self.policy.skip_limit {
            return Err(PipelineError::SkipLimitExceeded {
                limit: self.policy.skip_limit,
                skipped: ctx.stats.rows_skipped,
                last: err,
            });
        }

        Ok(())
    }

    /// Copy the current statistics into the status store
    pub async fn publish(&self, ctx: &RunContext) {
        self.statuses
            .write()
            .await
            .insert(ctx.run_id, ctx.stats.clone());
    }
}
