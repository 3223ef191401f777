use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

use crate::orchestrator::OrchestratorConfig;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub downloads: OrchestratorConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub acquisition: AcquisitionConfig,
    #[serde(default)]
    pub scraper: ScraperConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub telegram: TelegramConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([127, 0, 0, 1])
}

fn default_port() -> u16 {
    8080
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("downloads.db")
}

/// How eagerly the browser considers a navigation finished.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PageLoadStrategy {
    /// Return once the DOM is interactive.
    #[default]
    Eager,
    /// Wait for the full load event.
    Normal,
}

impl PageLoadStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            PageLoadStrategy::Eager => "eager",
            PageLoadStrategy::Normal => "normal",
        }
    }
}

/// Browser session configuration, applied to every session the pool creates.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BrowserConfig {
    /// Base URL of the chromedriver (or any W3C WebDriver) endpoint.
    #[serde(default = "default_webdriver_url")]
    pub webdriver_url: String,
    #[serde(default = "default_true")]
    pub headless_mode: bool,
    #[serde(default)]
    pub use_proxy: bool,
    /// Proxy as `host:port`, only applied when `use_proxy` is set.
    #[serde(default)]
    pub proxy_server: String,
    /// Page load timeout in seconds.
    #[serde(default = "default_page_timeout")]
    pub timeout: u64,
    #[serde(default)]
    pub page_load_strategy: PageLoadStrategy,
    #[serde(default = "default_true")]
    pub disable_images: bool,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            webdriver_url: default_webdriver_url(),
            headless_mode: true,
            use_proxy: false,
            proxy_server: String::new(),
            timeout: default_page_timeout(),
            page_load_strategy: PageLoadStrategy::default(),
            disable_images: true,
        }
    }
}

impl BrowserConfig {
    /// The proxy to use, if proxying is enabled and a server is set.
    pub fn effective_proxy(&self) -> Option<&str> {
        if self.use_proxy && !self.proxy_server.trim().is_empty() {
            Some(self.proxy_server.trim())
        } else {
            None
        }
    }
}

fn default_webdriver_url() -> String {
    "http://127.0.0.1:9515".to_string()
}

fn default_page_timeout() -> u64 {
    25
}

fn default_true() -> bool {
    true
}

/// Global retry settings for a single acquisition.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_multiplier")]
    pub multiplier_secs: f64,
    #[serde(default = "default_min_wait")]
    pub min_wait_secs: f64,
    #[serde(default = "default_max_wait")]
    pub max_wait_secs: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            multiplier_secs: default_multiplier(),
            min_wait_secs: default_min_wait(),
            max_wait_secs: default_max_wait(),
        }
    }
}

fn default_max_attempts() -> u32 {
    2
}

fn default_multiplier() -> f64 {
    1.0
}

fn default_min_wait() -> f64 {
    2.0
}

fn default_max_wait() -> f64 {
    5.0
}

/// Timing knobs for the site automation sequences.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AcquisitionConfig {
    /// How long to wait for an element to show up.
    #[serde(default = "default_element_timeout")]
    pub element_timeout_secs: u64,
    /// How long to wait for a new file to land in the destination directory.
    #[serde(default = "default_settle_timeout")]
    pub settle_timeout_secs: u64,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            element_timeout_secs: default_element_timeout(),
            settle_timeout_secs: default_settle_timeout(),
            poll_interval_ms: default_poll_interval(),
        }
    }
}

fn default_element_timeout() -> u64 {
    20
}

fn default_settle_timeout() -> u64 {
    8
}

fn default_poll_interval() -> u64 {
    500
}

/// Profile link discovery settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScraperConfig {
    #[serde(default = "default_scroll_count")]
    pub scrape_scroll_count: u32,
    #[serde(default = "default_scroll_pause")]
    pub scroll_pause_ms: u64,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            scrape_scroll_count: default_scroll_count(),
            scroll_pause_ms: default_scroll_pause(),
        }
    }
}

fn default_scroll_count() -> u32 {
    5
}

fn default_scroll_pause() -> u64 {
    3000
}

/// Telegram bot front-end configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub telegram_enabled: bool,
    #[serde(default)]
    pub bot_token: String,
    #[serde(default = "default_telegram_api")]
    pub api_url: String,
    /// Long-poll timeout for `getUpdates`, in seconds.
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_secs: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            telegram_enabled: false,
            bot_token: String::new(),
            api_url: default_telegram_api(),
            poll_timeout_secs: default_poll_timeout(),
        }
    }
}

fn default_telegram_api() -> String {
    "https://api.telegram.org".to_string()
}

fn default_poll_timeout() -> u64 {
    30
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub downloads: OrchestratorConfig,
    pub browser: SanitizedBrowserConfig,
    pub retry: RetryConfig,
    pub scraper: ScraperConfig,
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub telegram: SanitizedTelegramConfig,
}

/// Browser config with the proxy address hidden.
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedBrowserConfig {
    pub webdriver_url: String,
    pub headless_mode: bool,
    pub use_proxy: bool,
    pub proxy_configured: bool,
    pub timeout: u64,
    pub page_load_strategy: PageLoadStrategy,
    pub disable_images: bool,
}

/// Telegram config with the bot token hidden.
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedTelegramConfig {
    pub telegram_enabled: bool,
    pub bot_token_configured: bool,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            downloads: config.downloads.clone(),
            browser: SanitizedBrowserConfig {
                webdriver_url: config.browser.webdriver_url.clone(),
                headless_mode: config.browser.headless_mode,
                use_proxy: config.browser.use_proxy,
                proxy_configured: !config.browser.proxy_server.is_empty(),
                timeout: config.browser.timeout,
                page_load_strategy: config.browser.page_load_strategy,
                disable_images: config.browser.disable_images,
            },
            retry: config.retry.clone(),
            scraper: config.scraper.clone(),
            database: config.database.clone(),
            server: config.server.clone(),
            telegram: SanitizedTelegramConfig {
                telegram_enabled: config.telegram.telegram_enabled,
                bot_token_configured: !config.telegram.bot_token.is_empty(),
            },
        }
    }
}
