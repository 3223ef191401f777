//! Events emitted during a download run.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::link::{MediaKind, Outcome};
use crate::orchestrator::RunResult;

/// A run lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent {
    /// The pool is up and dispatch is about to begin.
    RunStarted { run_id: Uuid, total: usize },
    /// About to handle link number `current` (1-based) of `total`.
    Progress {
        run_id: Uuid,
        current: usize,
        total: usize,
    },
    /// An item reached a terminal outcome.
    ItemResult {
        run_id: Uuid,
        kind: MediaKind,
        owner: String,
        outcome: Outcome,
        link: String,
    },
    /// The run could not start. A `RunComplete` always follows.
    RunAborted { run_id: Uuid, reason: String },
    /// Final summary. Emitted exactly once per run.
    RunComplete { result: RunResult },
}

impl RunEvent {
    /// Event name as used in the serialized `type` tag.
    pub fn name(&self) -> &'static str {
        match self {
            RunEvent::RunStarted { .. } => "run_started",
            RunEvent::Progress { .. } => "progress",
            RunEvent::ItemResult { .. } => "item_result",
            RunEvent::RunAborted { .. } => "run_aborted",
            RunEvent::RunComplete { .. } => "run_complete",
        }
    }

    pub fn run_id(&self) -> Uuid {
        match self {
            RunEvent::RunStarted { run_id, .. }
            | RunEvent::Progress { run_id, .. }
            | RunEvent::ItemResult { run_id, .. }
            | RunEvent::RunAborted { run_id, .. } => *run_id,
            RunEvent::RunComplete { result } => result.run_id,
        }
    }
}
