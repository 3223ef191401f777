//! Download orchestrator.
//!
//! Takes a batch of raw links and drives each one through:
//! - **Dedup check**: already-downloaded items are skipped
//! - **Acquisition**: retry-wrapped, on a round-robin browser session
//! - **Record**: outcome persisted and reported as completions arrive

mod config;
mod runner;
mod types;

pub use config::OrchestratorConfig;
pub use runner::DownloadOrchestrator;
pub use types::{OrchestratorError, OrchestratorStatus, RunResult};
