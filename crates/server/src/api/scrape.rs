//! Profile discovery API handler.

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokgrab_core::ScrapeError;
use tracing::{info, warn};

use super::runs::spawn_run;
use crate::state::AppState;

/// Request body for scraping a profile
#[derive(Debug, Deserialize)]
pub struct ScrapeBody {
    pub username: String,
    /// Submit the discovered links as a run right away.
    #[serde(default)]
    pub download: bool,
}

/// Response for a scrape
#[derive(Debug, Serialize)]
pub struct ScrapeResponse {
    pub username: String,
    pub count: usize,
    pub links: Vec<String>,
    pub run_started: bool,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ScrapeErrorResponse {
    pub error: String,
}

/// Discover a profile's media links
pub async fn scrape_profile(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ScrapeBody>,
) -> Result<Json<ScrapeResponse>, impl IntoResponse> {
    let links = match state.scraper().scrape(&body.username).await {
        Ok(links) => links,
        Err(e) => {
            let status = match e {
                ScrapeError::InvalidUsername(_) => StatusCode::BAD_REQUEST,
                ScrapeError::Session(_) => StatusCode::BAD_GATEWAY,
            };
            warn!(username = %body.username, "Scrape failed: {}", e);
            return Err((
                status,
                Json(ScrapeErrorResponse {
                    error: e.to_string(),
                }),
            ));
        }
    };

    info!(username = %body.username, count = links.len(), "Profile scraped");

    let orchestrator = state.orchestrator();
    let run_started = body.download && !links.is_empty() && !orchestrator.is_busy();
    if run_started {
        spawn_run(Arc::clone(orchestrator), links.clone());
    }

    Ok(Json(ScrapeResponse {
        username: body.username,
        count: links.len(),
        links,
        run_started,
    }))
}
