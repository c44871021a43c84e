//! Fault-tolerance policy for a pipeline run
//!
//! Enumerated before the run starts and never changed during it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::batch::error::ErrorKind;

/// Chunking, skip and retry configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelinePolicy {
    /// Rows pulled per chunk (default: 1000)
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Maximum rows skipped in one run before it fails (default: 100)
    #[serde(default = "default_skip_limit")]
    pub skip_limit: u64,

    /// Write attempts per chunk for retryable errors (default: 3)
    #[serde(default = "default_retry_limit")]
    pub retry_limit: u32,

    /// Initial delay between write attempts, doubled per attempt (default: 100ms)
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Error kinds that drop the row and continue
    #[serde(default = "default_skippable_kinds")]
    pub skippable_kinds: BTreeSet<ErrorKind>,

    /// Error kinds that retry the chunk write
    #[serde(default = "default_retryable_kinds")]
    pub retryable_kinds: BTreeSet<ErrorKind>,
}

fn default_chunk_size() -> usize {
    1000
}

fn default_skip_limit() -> u64 {
    100
}

fn default_retry_limit() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    100
}

fn default_skippable_kinds() -> BTreeSet<ErrorKind> {
    [
        ErrorKind::Parse,
        ErrorKind::InvalidField,
        ErrorKind::DuplicateBib,
        ErrorKind::UnknownCategory,
        ErrorKind::WriteConstraint,
    ]
    .into_iter()
    .collect()
}

fn default_retryable_kinds() -> BTreeSet<ErrorKind> {
    [ErrorKind::TransientStore].into_iter().collect()
}

impl Default for PipelinePolicy {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            skip_limit: default_skip_limit(),
            retry_limit: default_retry_limit(),
            retry_backoff_ms: default_retry_backoff_ms(),
            skippable_kinds: default_skippable_kinds(),
            retryable_kinds: default_retryable_kinds(),
        }
    }
}

impl PipelinePolicy {
    pub fn is_skippable(&self, kind: ErrorKind) -> bool {
        self.skippable_kinds.contains(&kind)
    }

    pub fn is_retryable(&self, kind: ErrorKind) -> bool {
        self.retryable_kinds.contains(&kind)
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<(), String> {
        if self.chunk_size == 0 {
            return Err("chunk_size must be at least 1".to_string());
        }
        if self.retry_limit == 0 {
            return Err("retry_limit must be at least 1".to_string());
        }
        if let Some(kind) = self.skippable_kinds.intersection(&self.retryable_kinds).next() {
            return Err(format!("{} cannot be both skippable and retryable", kind));
        }
        Ok(())
    }
}
