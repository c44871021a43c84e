//! Batch result upload endpoints
//!
//! Under `/api/v1/events/:event_id/results/batch`:
//! - `POST /upload`            store the results file for the event
//! - `POST /start`             purge existing results and launch a run
//! - `GET  /status/:run_id`    poll run progress
//! - `GET  /template`          CSV template with the expected columns

use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::batch::row_parser::TEMPLATE_HEADER;
use crate::models::{PipelineStage, RunState, SkippedRow};
use crate::storage::MAX_UPLOAD_BYTES;
use crate::{ApiError, ApiResult, AppState};

const BATCH_BASE: &str = "/api/v1/events/:event_id/results/batch";

/// Multipart overhead allowed on top of the file size limit
const MULTIPART_SLACK_BYTES: usize = 64 * 1024;

const TEMPLATE_SAMPLE_ROWS: [&str; 2] = [
    "M001,John Doe,M,Half Marathon,18-35,1,1,1,01:15:20,01:15:50,00:25:30,00:52:15,01:05:40",
    "F001,Jane Smith,F,Half Marathon,18-35,2,1,1,01:22:45,01:23:10,00:27:15,00:55:30,01:10:05",
];

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StartResponse {
    pub run_id: Uuid,
    pub message: String,
    pub status: RunState,
    pub deleted_results_count: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub run_id: Uuid,
    pub event_id: i64,
    pub state: RunState,
    pub stage: PipelineStage,
    pub rows_read: u64,
    pub rows_written: u64,
    pub rows_skipped: u64,
    pub commit_count: u64,
    pub progress_percentage: u8,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    pub skipped_rows: Vec<SkippedRow>,
}

fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(err.body_text())
    } else {
        ApiError::BadRequest(err.body_text())
    }
}

/// Map storage validation failures to 400
fn storage_error(err: marathon_common::Error) -> ApiError {
    match err {
        marathon_common::Error::InvalidInput(msg) => ApiError::BadRequest(msg),
        other => ApiError::Common(other),
    }
}

async fn require_event(state: &AppState, event_id: i64) -> ApiResult<()> {
    state
        .runner
        .store()
        .find_event_by_id(event_id)
        .await?
        .map(|_| ())
        .ok_or_else(|| ApiError::NotFound(format!("Event not found: {}", event_id)))
}

/// POST /upload (multipart field `file`)
pub async fn upload_file(
    State(state): State<AppState>,
    Path(event_id): Path<i64>,
    mut multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    require_event(&state, event_id).await?;

    let mut upload = None;
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() == Some("file") {
            let file_name = field.file_name().map(str::to_string);
            let data = field.bytes().await.map_err(multipart_error)?;
            upload = Some((file_name, data));
            break;
        }
    }

    let (file_name, data) =
        upload.ok_or_else(|| ApiError::BadRequest("Missing multipart field 'file'".to_string()))?;

    tracing::info!(
        event_id,
        file_name = file_name.as_deref().unwrap_or(""),
        bytes = data.len(),
        "File upload request"
    );

    let path = state
        .storage
        .save(event_id, file_name.as_deref(), &data)
        .await
        .map_err(storage_error)?;

    let existing = state.runner.store().count_by_event(event_id).await?;
    let warning = (existing > 0).then(|| {
        format!(
            "Event has {} existing results. They will be deleted when job starts.",
            existing
        )
    });

    tracing::info!(event_id, file = %path.display(), existing, "File uploaded");

    Ok(Json(UploadResponse {
        message: "File uploaded successfully".to_string(),
        warning,
    }))
}

/// POST /start
pub async fn start_job(
    State(state): State<AppState>,
    Path(event_id): Path<i64>,
) -> ApiResult<Json<StartResponse>> {
    tracing::info!(event_id, "Job start request");

    require_event(&state, event_id).await?;

    let file_path = state
        .storage
        .find(event_id)
        .ok_or_else(|| ApiError::NotFound(format!("No file found for event {}", event_id)))?;

    let store = state.runner.store();
    let existing = store.count_by_event(event_id).await?;
    let deleted = if existing > 0 {
        let deleted = store.delete_all_by_event(event_id).await?;
        tracing::info!(event_id, deleted, "Deleted existing results");
        deleted
    } else {
        tracing::info!(event_id, "No existing results found");
        0
    };

    let run_id = state.runner.start(event_id, file_path).await?;
    let status = state
        .runner
        .status(run_id)
        .await
        .map(|stats| stats.state)
        .unwrap_or(RunState::Pending);

    tracing::info!(
        event_id,
        run_id = %run_id,
        deleted,
        "Job started"
    );

    Ok(Json(StartResponse {
        run_id,
        message: "Job started successfully".to_string(),
        status,
        deleted_results_count: deleted,
    }))
}

/// GET /status/:run_id
pub async fn get_job_status(
    State(state): State<AppState>,
    Path((event_id, run_id)): Path<(i64, Uuid)>,
) -> ApiResult<Json<StatusResponse>> {
    let stats = state
        .runner
        .status(run_id)
        .await
        .filter(|stats| stats.event_id == event_id)
        .ok_or_else(|| ApiError::NotFound(format!("Job not found: {}", run_id)))?;

    tracing::debug!(run_id = %run_id, state = ?stats.state, "Status query");

    Ok(Json(StatusResponse {
        run_id,
        event_id: stats.event_id,
        state: stats.state,
        stage: stats.stage,
        rows_read: stats.rows_read,
        rows_written: stats.rows_written,
        rows_skipped: stats.rows_skipped,
        commit_count: stats.commit_count,
        progress_percentage: stats.progress_percentage(),
        message: stats.message(),
        failure: stats.failure.clone(),
        skipped_rows: stats.skipped_rows,
    }))
}

/// GET /template
pub async fn download_template() -> impl IntoResponse {
    let mut body = TEMPLATE_HEADER.join(",");
    for row in TEMPLATE_SAMPLE_ROWS {
        body.push('\n');
        body.push_str(row);
    }
    body.push('\n');

    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=results-template.csv",
            ),
        ],
        body,
    )
}

pub fn batch_routes() -> Router<AppState> {
    Router::new()
        .route(
            &format!("{}/upload", BATCH_BASE),
            post(upload_file).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES + MULTIPART_SLACK_BYTES)),
        )
        .route(&format!("{}/start", BATCH_BASE), post(start_job))
        .route(&format!("{}/status/:run_id", BATCH_BASE), get(get_job_status))
        .route(&format!("{}/template", BATCH_BASE), get(download_template))
}
