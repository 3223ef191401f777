use std::sync::Arc;

use tokgrab_core::{
    BroadcastSink, Config, DownloadOrchestrator, DownloadStore, ProfileScraper, SanitizedConfig,
};

/// Shared application state
pub struct AppState {
    config: Config,
    orchestrator: Arc<DownloadOrchestrator>,
    store: Arc<dyn DownloadStore>,
    scraper: Arc<dyn ProfileScraper>,
    events: BroadcastSink,
}

impl AppState {
    pub fn new(
        config: Config,
        orchestrator: Arc<DownloadOrchestrator>,
        store: Arc<dyn DownloadStore>,
        scraper: Arc<dyn ProfileScraper>,
        events: BroadcastSink,
    ) -> Self {
        Self {
            config,
            orchestrator,
            store,
            scraper,
            events,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn orchestrator(&self) -> &Arc<DownloadOrchestrator> {
        &self.orchestrator
    }

    pub fn store(&self) -> &dyn DownloadStore {
        self.store.as_ref()
    }

    pub fn scraper(&self) -> &Arc<dyn ProfileScraper> {
        &self.scraper
    }

    /// Run events republished for WebSocket clients.
    pub fn events(&self) -> &BroadcastSink {
        &self.events
    }
}
