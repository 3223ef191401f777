//! Testing utilities and mock implementations.
//!
//! This module provides mock implementations of the browser, acquisition,
//! scraping and notification seams, so the orchestrator and the front-ends
//! can be exercised without a browser or network access.
//!
//! # Example
//!
//! ```rust,ignore
//! use tokgrab_core::testing::{MockBackend, MockBehavior, MockSessionFactory, RecordingSink};
//!
//! let sessions = MockSessionFactory::new();
//! let backend = MockBackend::new();
//! let sink = RecordingSink::new();
//!
//! // Configure mock responses
//! backend.set_behavior("222", MockBehavior::NoNewFile).await;
//!
//! // Build a DownloadOrchestrator with them...
//! ```

mod mock_backend;
mod mock_scraper;
mod mock_session;
mod recording_sink;

pub use mock_backend::{MockBackend, MockBehavior, RecordedAcquisition};
pub use mock_scraper::MockScraper;
pub use mock_session::{MockSession, MockSessionFactory};
pub use recording_sink::RecordingSink;

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::path::Path;

    use crate::config::Config;

    /// A video link for `owner`.
    pub fn video_link(owner: &str, video_id: &str) -> String {
        format!("https://www.tiktok.com/@{}/video/{}", owner, video_id)
    }

    /// A photo slideshow link for `owner`.
    pub fn photo_link(owner: &str, video_id: &str) -> String {
        format!("https://www.tiktok.com/@{}/photo/{}", owner, video_id)
    }

    /// Config with no pacing and near-zero retry delays, downloading into `dir`.
    pub fn fast_config(dir: &Path) -> Config {
        let mut config = Config::default();
        config.downloads.download_path = dir.to_path_buf();
        config.downloads.delay_between_downloads = 0;
        config.retry.multiplier_secs = 0.0;
        config.retry.min_wait_secs = 0.01;
        config.retry.max_wait_secs = 0.01;
        config.acquisition.element_timeout_secs = 0;
        config.acquisition.settle_timeout_secs = 0;
        config.acquisition.poll_interval_ms = 5;
        config.scraper.scroll_pause_ms = 0;
        config
    }
}
