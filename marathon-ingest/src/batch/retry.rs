//! Retry logic for transient store failures
//!
//! Exponential backoff: starts at the policy's `retry_backoff_ms`, doubles per
//! attempt, capped at 1000ms. Only error kinds listed as retryable in the
//! policy are retried; everything else is returned at once.

use std::time::{Duration, Instant};
use thiserror::Error;

use super::error::{PipelineError, StoreError};
use crate::models::PipelinePolicy;

const MAX_BACKOFF_MS: u64 = 1000;

/// Why a retried operation gave up
#[derive(Debug, Error)]
pub enum RetryError {
    #[error("gave up after {attempts} attempts: {source}")]
    Exhausted {
        attempts: u32,
        #[source]
        source: StoreError,
    },

    #[error(transparent)]
    NotRetryable(StoreError),
}

impl From<RetryError> for PipelineError {
    fn from(err: RetryError) -> Self {
        match err {
            RetryError::Exhausted { attempts, source } => {
                PipelineError::RetryLimitExhausted { attempts, source }
            }
            RetryError::NotRetryable(source) => PipelineError::Store(source),
        }
    }
}

/// Run a store operation, retrying retryable failures
///
/// Makes at most `policy.retry_limit` attempts in total.
pub async fn retry_transient<F, Fut, T>(
    operation_name: &str,
    policy: &PipelinePolicy,
    mut operation: F,
) -> Result<T, RetryError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, StoreError>>,
{
    let start_time = Instant::now();
    let mut attempt: u32 = 0;
    let mut backoff_ms = policy.retry_backoff_ms.min(MAX_BACKOFF_MS);

    loop {
        attempt += 1;

        if attempt > 1 {
            tracing::debug!(operation = operation_name, attempt, "Retrying store operation");
        }

        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(
                        operation = operation_name,
                        attempt,
                        elapsed_ms = start_time.elapsed().as_millis(),
                        "Store operation succeeded after retry"
                    );
                }
                return Ok(value);
            }
            Err(err) => {
                if !policy.is_retryable(err.kind()) {
                    return Err(RetryError::NotRetryable(err));
                }

                if attempt >= policy.retry_limit {
                    tracing::error!(
                        operation = operation_name,
                        attempt,
                        elapsed_ms = start_time.elapsed().as_millis(),
                        error = %err,
                        "Store operation failed: retry limit reached"
                    );
                    return Err(RetryError::Exhausted {
                        attempts: attempt,
                        source: err,
                    });
                }

                tracing::warn!(
                    operation = operation_name,
                    attempt,
                    backoff_ms,
                    error = %err,
                    "Transient store error, will retry after backoff"
                );

                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                backoff_ms = (backoff_ms * 2).min(MAX_BACKOFF_MS);
            }
        }
    }
}
