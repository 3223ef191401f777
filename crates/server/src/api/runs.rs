//! Download run API handlers.

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokgrab_core::{DownloadOrchestrator, OrchestratorError, OrchestratorStatus, RunResult};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for starting a run
#[derive(Debug, Deserialize)]
pub struct StartRunBody {
    /// Raw links, in dispatch order
    pub links: Vec<String>,
}

/// Response for an accepted run
#[derive(Debug, Serialize)]
pub struct StartRunResponse {
    pub accepted: usize,
    pub message: String,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct RunErrorResponse {
    pub error: String,
}

/// Simple message response
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

fn error_response(status: StatusCode, error: impl Into<String>) -> (StatusCode, Json<RunErrorResponse>) {
    (
        status,
        Json(RunErrorResponse {
            error: error.into(),
        }),
    )
}

/// Start a run in the background and return its handle.
///
/// Shared by every front-end. The run itself may still be rejected with
/// `Busy` if another submission won the race.
pub fn spawn_run(
    orchestrator: Arc<DownloadOrchestrator>,
    links: Vec<String>,
) -> JoinHandle<Result<RunResult, OrchestratorError>> {
    tokio::spawn(async move {
        let result = orchestrator.run(links).await;
        if let Err(e) = &result {
            warn!("Background download run did not start: {}", e);
        }
        result
    })
}

// ============================================================================
// Handlers
// ============================================================================

/// Start a download run for a batch of links
pub async fn start_run(
    State(state): State<Arc<AppState>>,
    Json(body): Json<StartRunBody>,
) -> Result<(StatusCode, Json<StartRunResponse>), impl IntoResponse> {
    let links: Vec<String> = body
        .links
        .into_iter()
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .collect();

    if links.is_empty() {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "links must contain at least one non-empty link",
        ));
    }

    let orchestrator = state.orchestrator();
    if orchestrator.is_busy() {
        return Err(error_response(
            StatusCode::CONFLICT,
            OrchestratorError::Busy.to_string(),
        ));
    }

    let accepted = links.len();
    info!(links = accepted, "Run submitted over HTTP");
    spawn_run(Arc::clone(orchestrator), links);

    Ok((
        StatusCode::ACCEPTED,
        Json(StartRunResponse {
            accepted,
            message: "Download run started".to_string(),
        }),
    ))
}

/// Get the orchestrator status
pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<OrchestratorStatus> {
    Json(state.orchestrator().status().await)
}

/// Request cancellation of the current run
pub async fn cancel_run(
    State(state): State<Arc<AppState>>,
) -> Result<Json<MessageResponse>, impl IntoResponse> {
    let orchestrator = state.orchestrator();
    if !orchestrator.is_busy() {
        return Err(error_response(StatusCode::CONFLICT, "No download run in progress"));
    }

    orchestrator.cancel();
    Ok(Json(MessageResponse {
        message: "Cancellation requested".to_string(),
    }))
}

/// Get the summary of the most recent finished run
pub async fn get_last_result(
    State(state): State<Arc<AppState>>,
) -> Result<Json<RunResult>, impl IntoResponse> {
    match state.orchestrator().last_result().await {
        Some(result) => Ok(Json(result)),
        None => Err(error_response(StatusCode::NOT_FOUND, "No run has finished yet")),
    }
}
