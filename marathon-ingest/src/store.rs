//! Persistent store contract used by the batch core
//!
//! The pipeline only sees `ResultStore`; `SqliteResultStore` backs it with the
//! `db` module. Errors are classified into `StoreError` here so the pipeline
//! can route them (retry, skip, fail).

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::batch::error::StoreError;
use crate::db;
use crate::models::{Event, EventCategory, NewResult};

#[async_trait]
pub trait ResultStore: Send + Sync {
    async fn find_event_by_id(&self, event_id: i64) -> Result<Option<Event>, StoreError>;

    async fn categories_for_event(&self, event_id: i64) -> Result<Vec<EventCategory>, StoreError>;

    async fn exists_duplicate(&self, event_id: i64, bib_number: &str) -> Result<bool, StoreError>;

    /// Persist all records atomically; nothing is committed on error
    async fn save_all(&self, records: &[NewResult]) -> Result<Vec<i64>, StoreError>;

    async fn count_by_event(&self, event_id: i64) -> Result<i64, StoreError>;

    /// Returns the number of results removed
    async fn delete_all_by_event(&self, event_id: i64) -> Result<u64, StoreError>;
}

/// SQLite-backed store
#[derive(Clone)]
pub struct SqliteResultStore {
    pool: SqlitePool,
}

impl SqliteResultStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl ResultStore for SqliteResultStore {
    async fn find_event_by_id(&self, event_id: i64) -> Result<Option<Event>, StoreError> {
        Ok(db::events::find_event(&self.pool, event_id).await?)
    }

    async fn categories_for_event(&self, event_id: i64) -> Result<Vec<EventCategory>, StoreError> {
        Ok(db::events::categories_for_event(&self.pool, event_id).await?)
    }

    async fn exists_duplicate(&self, event_id: i64, bib_number: &str) -> Result<bool, StoreError> {
        Ok(db::results::exists_duplicate(&self.pool, event_id, bib_number).await?)
    }

    async fn save_all(&self, records: &[NewResult]) -> Result<Vec<i64>, StoreError> {
        Ok(db::results::save_all(&self.pool, records).await?)
    }

    async fn count_by_event(&self, event_id: i64) -> Result<i64, StoreError> {
        Ok(db::results::count_by_event(&self.pool, event_id).await?)
    }

    async fn delete_all_by_event(&self, event_id: i64) -> Result<u64, StoreError> {
        Ok(db::results::delete_all_by_event(&self.pool, event_id).await?)
    }
}
