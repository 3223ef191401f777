//! Download record and statistics API handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokgrab_core::{DownloadRecord, Outcome, RecordFilter};
use tracing::error;

use crate::state::AppState;

/// Maximum allowed limit for record queries
const MAX_LIMIT: i64 = 1000;

/// Default limit for record queries
const DEFAULT_LIMIT: i64 = 100;

/// Query parameters for listing records
#[derive(Debug, Deserialize)]
pub struct ListDownloadsParams {
    /// Filter by status (`success` or `failed`)
    pub status: Option<String>,
    /// Filter by owner username
    pub username: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Response for listing records
#[derive(Debug, Serialize)]
pub struct ListDownloadsResponse {
    pub downloads: Vec<DownloadRecord>,
    pub limit: i64,
    pub offset: i64,
}

/// Aggregate counters
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub success_count: u64,
    pub failed_count: u64,
    pub total: u64,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct RecordErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, error: String) -> (StatusCode, Json<RecordErrorResponse>) {
    (status, Json(RecordErrorResponse { error }))
}

/// Get aggregate download counters
pub async fn get_stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StatsResponse>, impl IntoResponse> {
    match state.store().stats() {
        Ok(stats) => Ok(Json(StatsResponse {
            success_count: stats.success_count,
            failed_count: stats.failed_count,
            total: stats.total(),
        })),
        Err(e) => {
            error!("Failed to read stats: {}", e);
            Err(error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}

/// List stored download records
pub async fn list_downloads(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListDownloadsParams>,
) -> Result<Json<ListDownloadsResponse>, impl IntoResponse> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = params.offset.unwrap_or(0).max(0);

    let mut filter = RecordFilter::new().with_limit(limit).with_offset(offset);

    if let Some(status) = params.status.as_deref() {
        match Outcome::parse(status) {
            Some(outcome @ (Outcome::Success | Outcome::Failed)) => {
                filter = filter.with_status(outcome);
            }
            _ => {
                return Err(error_response(
                    StatusCode::BAD_REQUEST,
                    format!("Invalid status '{}', expected 'success' or 'failed'", status),
                ));
            }
        }
    }

    if let Some(username) = params.username {
        filter = filter.with_username(username);
    }

    match state.store().list(&filter) {
        Ok(downloads) => Ok(Json(ListDownloadsResponse {
            downloads,
            limit,
            offset,
        })),
        Err(e) => {
            error!("Failed to list downloads: {}", e);
            Err(error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}

/// Get one stored record by video id
pub async fn get_download(
    State(state): State<Arc<AppState>>,
    Path(video_id): Path<String>,
) -> Result<Json<DownloadRecord>, impl IntoResponse> {
    match state.store().get(&video_id) {
        Ok(Some(record)) => Ok(Json(record)),
        Ok(None) => Err(error_response(
            StatusCode::NOT_FOUND,
            format!("No record for video {}", video_id),
        )),
        Err(e) => {
            error!("Failed to get download {}: {}", video_id, e);
            Err(error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}
