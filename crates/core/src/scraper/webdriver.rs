//! Scroll-and-collect profile scraper over a browser session.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::browser::{BrowserSession, Locator, SessionFactory};
use crate::config::{BrowserConfig, ScraperConfig};

use super::{ProfileScraper, ScrapeError};

const PROFILE_BASE: &str = "https://www.tiktok.com/";
const MEDIA_ANCHORS: &str = "//a[contains(@href, '/video/') or contains(@href, '/photo/')]";
const SCROLL_SCRIPT: &str = "window.scrollTo(0, document.body.scrollHeight);";

/// Trim the input and make sure it starts with exactly one `@`.
pub fn normalize_username(raw: &str) -> Result<String, ScrapeError> {
    let handle = raw.trim().trim_start_matches('@');
    if handle.is_empty() || handle.contains(char::is_whitespace) || handle.contains('/') {
        return Err(ScrapeError::InvalidUsername(raw.to_string()));
    }
    Ok(format!("@{}", handle))
}

/// Opens the profile in a fresh session and collects media anchors while
/// scrolling. The session is closed afterwards whatever the outcome.
pub struct WebDriverProfileScraper {
    sessions: Arc<dyn SessionFactory>,
    browser: BrowserConfig,
    config: ScraperConfig,
}

impl WebDriverProfileScraper {
    pub fn new(
        sessions: Arc<dyn SessionFactory>,
        browser: BrowserConfig,
        config: ScraperConfig,
    ) -> Self {
        Self {
            sessions,
            browser,
            config,
        }
    }

    /// Collect links from an already-open session.
    pub async fn collect(
        &self,
        session: &mut dyn BrowserSession,
        handle: &str,
    ) -> Result<Vec<String>, ScrapeError> {
        session.navigate(&format!("{}{}", PROFILE_BASE, handle)).await?;

        let pause = Duration::from_millis(self.config.scroll_pause_ms);
        let anchors = Locator::xpath(MEDIA_ANCHORS);
        let mut found = BTreeSet::new();

        for round in 0..self.config.scrape_scroll_count.max(1) {
            for element in session.find_elements(&anchors).await? {
                if let Some(href) = session.attribute(&element, "href").await? {
                    let link = href.split('?').next().unwrap_or_default().trim();
                    if !link.is_empty() {
                        found.insert(link.to_string());
                    }
                }
            }
            debug!(round, found = found.len(), "Profile scroll");
            session.execute_script(SCROLL_SCRIPT, &[]).await?;
            tokio::time::sleep(pause).await;
        }

        Ok(found.into_iter().collect())
    }
}

#[async_trait]
impl ProfileScraper for WebDriverProfileScraper {
    async fn scrape(&self, username: &str) -> Result<Vec<String>, ScrapeError> {
        let handle = normalize_username(username)?;
        let mut session = self.sessions.create(&self.browser, 0).await?;

        let result = self.collect(session.as_mut(), &handle).await;

        if let Err(e) = session.close().await {
            warn!(error = %e, "Failed to close scrape session");
        }

        if let Ok(links) = &result {
            info!(username = %handle, count = links.len(), "Profile scraped");
        }
        result
    }
}
