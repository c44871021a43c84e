//! marathon-ingest library
//!
//! Bulk ingestion of marathon race results from uploaded spreadsheets into
//! SQLite, with an HTTP surface for upload, start and status polling.
//!
//! Exposed as a library so integration tests can build the router and drive
//! the batch core directly.

pub mod api;
pub mod batch;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod storage;
pub mod store;

pub use crate::error::{ApiError, ApiResult};

use axum::routing::get;
use axum::Router;
use chrono::{DateTime, Utc};
use marathon_common::events::EventBus;
use sqlx::SqlitePool;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::batch::JobRunner;
use crate::models::PipelinePolicy;
use crate::storage::FileStorage;
use crate::store::SqliteResultStore;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub runner: JobRunner,
    pub storage: FileStorage,
    pub event_bus: EventBus,
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        storage: FileStorage,
        policy: PipelinePolicy,
        event_bus: EventBus,
    ) -> Self {
        let store = Arc::new(SqliteResultStore::new(db.clone()));
        Self {
            runner: JobRunner::new(store, policy, event_bus.clone()),
            db,
            storage,
            event_bus,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::batch_routes())
        .route("/api/v1/batch/events", get(api::batch_event_stream))
        .merge(api::health_routes())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
