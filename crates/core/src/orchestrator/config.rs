//! Orchestrator configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Configuration for the download orchestrator (`[downloads]` section).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Root directory; each item lands in `<download_path>/<owner>`.
    #[serde(default = "default_download_path")]
    pub download_path: PathBuf,

    /// Pause after each dispatch (seconds). Completions are still
    /// collected while waiting.
    #[serde(default = "default_delay")]
    pub delay_between_downloads: u64,

    /// Number of browser sessions, and so of concurrent acquisitions.
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
}

fn default_download_path() -> PathBuf {
    PathBuf::from("downloads")
}

fn default_delay() -> u64 {
    3
}

fn default_max_workers() -> usize {
    1 // one browser is all a small host can take
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            download_path: default_download_path(),
            delay_between_downloads: default_delay(),
            max_workers: default_max_workers(),
        }
    }
}
