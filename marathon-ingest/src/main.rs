//! marathon-ingest - race results ingestion service
//!
//! Accepts results spreadsheets per event, loads them into the database in
//! chunks and reports run progress over HTTP and SSE.

use anyhow::{Context, Result};
use clap::Parser;
use marathon_common::config::ensure_root_folder;
use marathon_common::events::EventBus;
use tracing::info;
use tracing_subscriber::EnvFilter;

use marathon_ingest::config::{Args, IngestConfig};
use marathon_ingest::storage::FileStorage;
use marathon_ingest::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = IngestConfig::resolve(&args).context("Failed to load configuration")?;

    // RUST_LOG takes precedence over the configured level
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .context("Invalid log level")?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting marathon-ingest");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!("Root folder: {}", config.root().display());

    ensure_root_folder(config.root()).context("Failed to initialize root folder")?;

    let db_path = config.database_path();
    info!("Database: {}", db_path.display());
    let db_pool = marathon_ingest::db::init_database(&db_path).await?;
    info!("Database connection established");

    let event_bus = EventBus::new(100);
    let storage = FileStorage::new(config.uploads_dir());

    info!(
        chunk_size = config.policy.chunk_size,
        skip_limit = config.policy.skip_limit,
        retry_limit = config.policy.retry_limit,
        "Pipeline policy"
    );

    let state = AppState::new(db_pool, storage, config.policy.clone(), event_bus);
    let app = marathon_ingest::build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_address))?;
    info!("Listening on http://{}", config.bind_address);
    info!("Health check: http://{}/health", config.bind_address);

    axum::serve(listener, app).await?;

    Ok(())
}
