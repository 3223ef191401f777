//! Types for the download orchestrator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::browser::SessionError;

/// Errors that end a run before any item is processed.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// A run is already in progress.
    #[error("a download run is already in progress")]
    Busy,

    /// The session pool could not be started.
    #[error("browser session startup failed: {0}")]
    SessionStartup(#[from] SessionError),
}

/// Summary of a finished run.
///
/// `success_count` includes items skipped because they were already
/// downloaded; `skipped_count` reports how many of them there were.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunResult {
    pub run_id: Uuid,
    pub success_count: usize,
    pub failed_count: usize,
    pub skipped_count: usize,
    /// Links that failed, in completion order, for manual resubmission.
    pub failed_links: Vec<String>,
    /// True if dispatch stopped early because of `cancel()`.
    pub cancelled: bool,
}

impl RunResult {
    pub fn empty(run_id: Uuid) -> Self {
        Self {
            run_id,
            success_count: 0,
            failed_count: 0,
            skipped_count: 0,
            failed_links: Vec::new(),
            cancelled: false,
        }
    }
}

/// Current status of the orchestrator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrchestratorStatus {
    /// Whether a run is in progress.
    pub running: bool,
    pub run_id: Option<Uuid>,
    pub started_at: Option<DateTime<Utc>>,
    /// Links in the current batch.
    pub total: usize,
    /// Links dispatched or skipped so far.
    pub processed: usize,
    /// Acquisitions currently in flight.
    pub in_flight: usize,
    pub success_count: usize,
    pub failed_count: usize,
    /// Whether cancellation has been requested for the current run.
    pub cancel_requested: bool,
}
