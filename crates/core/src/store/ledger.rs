//! Fault-tolerant façade over a [`DownloadStore`].

use std::sync::Arc;

use tracing::error;

use crate::link::{DownloadItem, Outcome};

use super::traits::{DownloadStore, RunStats};

/// Wraps a store so that persistence faults never reach the caller.
///
/// Reads degrade to "not found" / zero stats, writes become no-ops. Every
/// swallowed error is logged at `error!`.
#[derive(Clone)]
pub struct DedupLedger {
    store: Arc<dyn DownloadStore>,
}

impl DedupLedger {
    pub fn new(store: Arc<dyn DownloadStore>) -> Self {
        Self { store }
    }

    /// The wrapped store, for front-ends that need the richer queries.
    pub fn store(&self) -> &Arc<dyn DownloadStore> {
        &self.store
    }

    pub fn is_already_succeeded(&self, video_id: &str) -> bool {
        match self.store.is_already_succeeded(video_id) {
            Ok(found) => found,
            Err(e) => {
                error!(video_id = %video_id, error = %e, "Dedup lookup failed, treating as not downloaded");
                false
            }
        }
    }

    /// Persist a terminal outcome. Outcomes other than success/failed are ignored.
    pub fn record(
        &self,
        item: &DownloadItem,
        outcome: Outcome,
        destination_path: Option<&str>,
        content_hash: Option<&str>,
    ) {
        if !matches!(outcome, Outcome::Success | Outcome::Failed) {
            return;
        }
        if let Err(e) = self
            .store
            .record_outcome(item, outcome, destination_path, content_hash)
        {
            error!(
                video_id = %item.video_id,
                outcome = %outcome,
                error = %e,
                "Failed to record download outcome"
            );
        }
    }

    pub fn stats(&self) -> RunStats {
        self.store.stats().unwrap_or_else(|e| {
            error!(error = %e, "Failed to read download stats");
            RunStats::default()
        })
    }
}
