//! Mock profile scraper for testing.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::browser::SessionError;
use crate::scraper::{normalize_username, ProfileScraper, ScrapeError};

/// Mock implementation of the ProfileScraper trait.
///
/// Returns canned links per username (with or without the leading `@`).
#[derive(Debug, Clone, Default)]
pub struct MockScraper {
    profiles: Arc<RwLock<HashMap<String, Vec<String>>>>,
    fail: Arc<RwLock<bool>>,
    requests: Arc<RwLock<Vec<String>>>,
}

impl MockScraper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Links returned for `username`.
    pub async fn set_links(&self, username: &str, links: Vec<String>) {
        let key = username.trim().trim_start_matches('@').to_string();
        self.profiles.write().await.insert(key, links);
    }

    /// Make every scrape fail with a session error.
    pub async fn set_fail(&self, fail: bool) {
        *self.fail.write().await = fail;
    }

    /// Normalized usernames that were scraped.
    pub async fn requests(&self) -> Vec<String> {
        self.requests.read().await.clone()
    }
}

#[async_trait]
impl ProfileScraper for MockScraper {
    async fn scrape(&self, username: &str) -> Result<Vec<String>, ScrapeError> {
        let handle = normalize_username(username)?;
        self.requests.write().await.push(handle.clone());

        if *self.fail.read().await {
            return Err(ScrapeError::Session(SessionError::Navigation(
                "mock scrape failure".to_string(),
            )));
        }

        let mut links = self
            .profiles
            .read()
            .await
            .get(handle.trim_start_matches('@'))
            .cloned()
            .unwrap_or_default();
        links.sort();
        links.dedup();
        Ok(links)
    }
}
