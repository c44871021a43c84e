//! Chunk persistence
//!
//! A chunk is written in one transaction, retried on transient failures.
//! When the store rejects the chunk on a uniqueness constraint, the
//! transaction has already rolled back; the chunk is then rewritten one
//! record per transaction so only the offending records are dropped.

use std::slice;

use super::error::{ErrorKind, PipelineError, RowError, StoreError};
use super::retry::{retry_transient, RetryError};
use crate::models::{NewResult, PipelinePolicy};
use crate::store::ResultStore;

/// Assembled record plus the spreadsheet row it came from
#[derive(Debug, Clone)]
pub struct ChunkItem {
    pub row_number: usize,
    pub record: NewResult,
}

/// Outcome of writing one chunk
#[derive(Debug, Default)]
pub struct ChunkWrite {
    pub written: usize,
    pub commits: u64,
    /// Records rejected by the store constraint, in chunk order
    pub rejected: Vec<RowError>,
}

/// Write failure after part of the chunk was already committed
///
/// `committed` holds what reached the store before `error`, so the run can
/// still report it.
#[derive(Debug)]
pub struct PartialWrite {
    pub committed: ChunkWrite,
    pub error: PipelineError,
}

impl From<RetryError> for PartialWrite {
    fn from(err: RetryError) -> Self {
        Self {
            committed: ChunkWrite::default(),
            error: err.into(),
        }
    }
}

pub struct BatchWriter<'a> {
    store: &'a dyn ResultStore,
    policy: &'a PipelinePolicy,
}

impl<'a> BatchWriter<'a> {
    pub fn new(store: &'a dyn ResultStore, policy: &'a PipelinePolicy) -> Self {
        Self { store, policy }
    }

    /// Persist a chunk; an empty chunk is a no-op
    pub async fn write_chunk(&self, items: &[ChunkItem]) -> Result<ChunkWrite, PartialWrite> {
        if items.is_empty() {
            return Ok(ChunkWrite::default());
        }

        let records: Vec<NewResult> = items.iter().map(|item| item.record.clone()).collect();

        tracing::info!(records = records.len(), "Writing chunk");

        let store = self.store;
        let chunk = records.as_slice();
        match retry_transient("write chunk", self.policy, move || store.save_all(chunk)).await {
            Ok(_) => {
                tracing::debug!(records = records.len(), "Chunk committed");
                Ok(ChunkWrite {
                    written: records.len(),
                    commits: 1,
                    rejected: Vec::new(),
                })
            }
            Err(RetryError::NotRetryable(StoreError::ConstraintViolation(message)))
                if self.policy.is_skippable(ErrorKind::WriteConstraint) =>
            {
                tracing::warn!(
                    records = records.len(),
                    error = %message,
                    "Chunk rejected by constraint, rewriting record by record"
                );
                self.write_each(items).await
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn write_each(&self, items: &[ChunkItem]) -> Result<ChunkWrite, PartialWrite> {
        let mut outcome = ChunkWrite::default();
        let store = self.store;

        for item in items {
            let single = slice::from_ref(&item.record);
            match retry_transient("write record", self.policy, move || store.save_all(single)).await {
                Ok(_) => {
                    outcome.written += 1;
                    outcome.commits += 1;
                }
                Err(RetryError::NotRetryable(StoreError::ConstraintViolation(message))) => {
                    outcome.rejected.push(RowError::WriteConstraint {
                        row: item.row_number,
                        bib: item.record.bib_number.clone(),
                        message,
                    });
                }
                Err(err) => {
                    tracing::error!(
                        written = outcome.written,
                        error = %err,
                        "Record-by-record rewrite aborted"
                    );
                    return Err(PartialWrite {
                        committed: outcome,
                        error: err.into(),
                    });
                }
            }
        }

        tracing::info!(
            written = outcome.written,
            rejected = outcome.rejected.len(),
            "Record-by-record rewrite finished"
        );

        Ok(outcome)
    }
}
