//! Profile link discovery.

mod webdriver;

use async_trait::async_trait;
use thiserror::Error;

use crate::browser::SessionError;

pub use webdriver::{normalize_username, WebDriverProfileScraper};

/// Errors from profile scraping.
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// Empty or otherwise unusable username.
    #[error("invalid username: {0:?}")]
    InvalidUsername(String),

    #[error("browser error: {0}")]
    Session(#[from] SessionError),
}

/// Discovers media links on a profile page.
#[async_trait]
pub trait ProfileScraper: Send + Sync {
    /// Return the distinct, query-stripped media links found for `username`,
    /// sorted.
    async fn scrape(&self, username: &str) -> Result<Vec<String>, ScrapeError>;
}
