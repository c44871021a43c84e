//! Store wrapper with injected failures

use async_trait::async_trait;
use marathon_ingest::batch::StoreError;
use marathon_ingest::models::{Event, EventCategory, NewResult};
use marathon_ingest::store::{ResultStore, SqliteResultStore};
use std::sync::atomic::{AtomicU32, Ordering};

/// Delegates to SQLite with injected failures:
/// - transient `save_all` failures for a set number of calls
/// - fatal `save_all` failures once a call budget is spent
/// - panics inside `save_all`
/// - transient duplicate-check failures
/// - duplicate checks that never report existing bibs
pub struct FlakyStore {
    inner: SqliteResultStore,
    transient_failures: AtomicU32,
    fatal_after_calls: Option<u32>,
    panic_on_save: bool,
    duplicate_check_failures: AtomicU32,
    hide_duplicates: bool,
    save_calls: AtomicU32,
    duplicate_checks: AtomicU32,
}

impl FlakyStore {
    pub fn new(inner: SqliteResultStore) -> Self {
        Self {
            inner,
            transient_failures: AtomicU32::new(0),
            fatal_after_calls: None,
            panic_on_save: false,
            duplicate_check_failures: AtomicU32::new(0),
            hide_duplicates: false,
            save_calls: AtomicU32::new(0),
            duplicate_checks: AtomicU32::new(0),
        }
    }

    /// Fail the next `n` saves with a transient error
    pub fn failing_saves(self, n: u32) -> Self {
        self.transient_failures.store(n, Ordering::SeqCst);
        self
    }

    /// Saves after the first `calls` fail with a non-retryable database error
    pub fn failing_after_calls(mut self, calls: u32) -> Self {
        self.fatal_after_calls = Some(calls);
        self
    }

    /// Every save panics
    pub fn panicking_saves(mut self) -> Self {
        self.panic_on_save = true;
        self
    }

    /// Fail the next `n` duplicate checks with a transient error
    pub fn failing_duplicate_checks(self, n: u32) -> Self {
        self.duplicate_check_failures.store(n, Ordering::SeqCst);
        self
    }

    /// Pre-check never reports duplicates (simulates a lost insert race)
    pub fn hiding_duplicates(mut self) -> Self {
        self.hide_duplicates = true;
        self
    }

    pub fn save_calls(&self) -> u32 {
        self.save_calls.load(Ordering::SeqCst)
    }

    pub fn duplicate_checks(&self) -> u32 {
        self.duplicate_checks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ResultStore for FlakyStore {
    async fn find_event_by_id(&self, event_id: i64) -> Result<Option<Event>, StoreError> {
        self.inner.find_event_by_id(event_id).await
    }

    async fn categories_for_event(&self, event_id: i64) -> Result<Vec<EventCategory>, StoreError> {
        self.inner.categories_for_event(event_id).await
    }

    async fn exists_duplicate(&self, event_id: i64, bib_number: &str) -> Result<bool, StoreError> {
        self.duplicate_checks.fetch_add(1, Ordering::SeqCst);
        let failures = self.duplicate_check_failures.load(Ordering::SeqCst);
        if failures > 0 {
            self.duplicate_check_failures
                .store(failures - 1, Ordering::SeqCst);
            return Err(StoreError::Transient("database is locked".to_string()));
        }
        if self.hide_duplicates {
            return Ok(false);
        }
        self.inner.exists_duplicate(event_id, bib_number).await
    }

    async fn save_all(&self, records: &[NewResult]) -> Result<Vec<i64>, StoreError> {
        let call = self.save_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.panic_on_save {
            panic!("store crashed while saving {} records", records.len());
        }
        if self.fatal_after_calls.is_some_and(|limit| call > limit) {
            return Err(StoreError::Database(sqlx::Error::Protocol(
                "disk I/O error".to_string(),
            )));
        }
        let remaining = self.transient_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.transient_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(StoreError::Transient("database is locked".to_string()));
        }
        self.inner.save_all(records).await
    }

    async fn count_by_event(&self, event_id: i64) -> Result<i64, StoreError> {
        self.inner.count_by_event(event_id).await
    }

    async fn delete_all_by_event(&self, event_id: i64) -> Result<u64, StoreError> {
        self.inner.delete_all_by_event(event_id).await
    }
}
