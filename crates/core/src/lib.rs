pub mod acquisition;
pub mod browser;
pub mod config;
pub mod link;
pub mod metrics;
pub mod notify;
pub mod orchestrator;
pub mod retry;
pub mod scraper;
pub mod store;
pub mod testing;

pub use acquisition::{AcquisitionBackend, AcquisitionError, AcquisitionOutcome, SiteBackend};
pub use browser::{
    BrowserSession, SessionError, SessionFactory, SessionPool, WebDriverSessionFactory,
};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
pub use link::{classify, DownloadItem, MediaKind, Outcome};
pub use notify::{BroadcastSink, FanoutSink, NotificationSink, RunEvent, TracingSink};
pub use orchestrator::{
    DownloadOrchestrator, OrchestratorConfig, OrchestratorError, OrchestratorStatus, RunResult,
};
pub use retry::RetryPolicy;
pub use scraper::{ProfileScraper, ScrapeError, WebDriverProfileScraper};
pub use store::{
    BotUser, DedupLedger, DownloadRecord, DownloadStore, RecordFilter, RunStats,
    SqliteDownloadStore, StoreError,
};
