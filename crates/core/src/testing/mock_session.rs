//! Mock browser sessions for testing.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::browser::{BrowserSession, ElementRef, Locator, ScriptArg, SessionError, SessionFactory};
use crate::config::BrowserConfig;

/// A browser session that records what it was asked to do.
///
/// Elements are "found" immediately with the locator text as their id.
/// Clicking an element whose locator mentions "download" drops a file into
/// the download directory when `set_download_on_click(true)` was called.
#[derive(Debug)]
pub struct MockSession {
    slot: usize,
    visited: Vec<String>,
    typed: Vec<String>,
    scripts: Vec<String>,
    download_dir: Option<PathBuf>,
    download_on_click: bool,
    hide_elements: bool,
    fail_navigation: bool,
    page_links: Vec<String>,
    files_written: usize,
    closed: bool,
    close_log: Option<Arc<RwLock<Vec<usize>>>>,
}

impl MockSession {
    /// Create a standalone session for `slot`.
    pub fn new(slot: usize) -> Self {
        Self {
            slot,
            visited: Vec::new(),
            typed: Vec::new(),
            scripts: Vec::new(),
            download_dir: None,
            download_on_click: false,
            hide_elements: false,
            fail_navigation: false,
            page_links: Vec::new(),
            files_written: 0,
            closed: false,
            close_log: None,
        }
    }

    /// URLs navigated to, in order.
    pub fn visited(&self) -> Vec<String> {
        self.visited.clone()
    }

    /// Text sent with `send_keys`, in order.
    pub fn typed(&self) -> Vec<String> {
        self.typed.clone()
    }

    /// Scripts executed, in order.
    pub fn scripts(&self) -> Vec<String> {
        self.scripts.clone()
    }

    pub fn download_dir(&self) -> Option<PathBuf> {
        self.download_dir.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn set_download_on_click(&mut self, enabled: bool) {
        self.download_on_click = enabled;
    }

    /// Make every element lookup fail with "no such element".
    pub fn hide_elements(&mut self, hidden: bool) {
        self.hide_elements = hidden;
    }

    pub fn set_fail_navigation(&mut self, fail: bool) {
        self.fail_navigation = fail;
    }

    /// Anchors returned by `find_elements`, exposed through their `href`.
    pub fn set_page_links(&mut self, links: Vec<String>) {
        self.page_links = links;
    }

    fn ensure_open(&self) -> Result<(), SessionError> {
        if self.closed {
            Err(SessionError::Closed)
        } else {
            Ok(())
        }
    }

    fn maybe_download(&mut self, element: &ElementRef) -> Result<(), SessionError> {
        if !self.download_on_click || !element.0.to_lowercase().contains("download") {
            return Ok(());
        }
        let Some(dir) = self.download_dir.clone() else {
            return Ok(());
        };
        self.files_written += 1;
        let path = dir.join(format!("mock-{}-{}.mp4", self.slot, self.files_written));
        std::fs::write(&path, format!("mock media {} {}", self.slot, self.files_written))
            .map_err(|e| SessionError::Driver(e.to_string()))
    }
}

#[async_trait]
impl BrowserSession for MockSession {
    fn slot(&self) -> usize {
        self.slot
    }

    async fn navigate(&mut self, url: &str) -> Result<(), SessionError> {
        self.ensure_open()?;
        if self.fail_navigation {
            return Err(SessionError::Navigation(
                "net::ERR_CONNECTION_REFUSED".to_string(),
            ));
        }
        self.visited.push(url.to_string());
        Ok(())
    }

    async fn find_element(&mut self, locator: &Locator) -> Result<ElementRef, SessionError> {
        self.ensure_open()?;
        if self.hide_elements {
            return Err(SessionError::NoSuchElement(locator.to_string()));
        }
        Ok(ElementRef(locator.value().to_string()))
    }

    async fn find_elements(&mut self, _locator: &Locator) -> Result<Vec<ElementRef>, SessionError> {
        self.ensure_open()?;
        Ok((0..self.page_links.len())
            .map(|i| ElementRef(format!("link-{}", i)))
            .collect())
    }

    async fn attribute(
        &mut self,
        element: &ElementRef,
        name: &str,
    ) -> Result<Option<String>, SessionError> {
        self.ensure_open()?;
        if name != "href" {
            return Ok(None);
        }
        Ok(element
            .0
            .strip_prefix("link-")
            .and_then(|idx| idx.parse::<usize>().ok())
            .and_then(|idx| self.page_links.get(idx).cloned()))
    }

    async fn send_keys(&mut self, _element: &ElementRef, text: &str) -> Result<(), SessionError> {
        self.ensure_open()?;
        self.typed.push(text.to_string());
        Ok(())
    }

    async fn click(&mut self, element: &ElementRef) -> Result<(), SessionError> {
        self.ensure_open()?;
        self.maybe_download(element)
    }

    async fn execute_script(
        &mut self,
        script: &str,
        args: &[ScriptArg],
    ) -> Result<Value, SessionError> {
        self.ensure_open()?;
        self.scripts.push(script.to_string());
        if script.contains("click()") {
            if let Some(ScriptArg::Element(element)) = args.first() {
                self.maybe_download(element)?;
            }
        }
        Ok(Value::Null)
    }

    async fn set_download_dir(&mut self, dir: &Path) -> Result<(), SessionError> {
        self.ensure_open()?;
        self.download_dir = Some(dir.to_path_buf());
        Ok(())
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        if let Some(log) = &self.close_log {
            log.write().await.push(self.slot);
        }
        Ok(())
    }
}

/// Mock implementation of the SessionFactory trait.
///
/// Tracks how many sessions were created and which slots were closed.
///
/// # Example
///
/// ```rust,ignore
/// use tokgrab_core::testing::MockSessionFactory;
///
/// let factory = MockSessionFactory::new();
/// factory.fail_on_slot(1).await;
///
/// let result = SessionPool::start(&factory, &BrowserConfig::default(), 2).await;
/// assert!(result.is_err());
/// assert_eq!(factory.closed_slots().await, vec![0]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockSessionFactory {
    created: Arc<RwLock<usize>>,
    closed: Arc<RwLock<Vec<usize>>>,
    fail_slots: Arc<RwLock<HashSet<usize>>>,
    page_links: Arc<RwLock<Vec<String>>>,
    fail_navigation: Arc<RwLock<bool>>,
}

impl MockSessionFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make session creation fail for `slot`.
    pub async fn fail_on_slot(&self, slot: usize) {
        self.fail_slots.write().await.insert(slot);
    }

    /// Links every new session exposes as anchors.
    pub async fn set_page_links(&self, links: Vec<String>) {
        *self.page_links.write().await = links;
    }

    /// Make navigation fail in every new session.
    pub async fn fail_navigation(&self, fail: bool) {
        *self.fail_navigation.write().await = fail;
    }

    /// Number of sessions successfully created.
    pub async fn created_count(&self) -> usize {
        *self.created.read().await
    }

    /// Number of close calls that actually closed a session.
    pub async fn closed_count(&self) -> usize {
        self.closed.read().await.len()
    }

    /// Slots of closed sessions, in close order.
    pub async fn closed_slots(&self) -> Vec<usize> {
        self.closed.read().await.clone()
    }
}

#[async_trait]
impl SessionFactory for MockSessionFactory {
    async fn create(
        &self,
        _config: &BrowserConfig,
        slot: usize,
    ) -> Result<Box<dyn BrowserSession>, SessionError> {
        if self.fail_slots.read().await.contains(&slot) {
            return Err(SessionError::Startup(format!(
                "mock startup failure on slot {}",
                slot
            )));
        }

        *self.created.write().await += 1;

        let mut session = MockSession::new(slot);
        session.close_log = Some(Arc::clone(&self.closed));
        session.page_links = self.page_links.read().await.clone();
        session.fail_navigation = *self.fail_navigation.read().await;
        Ok(Box::new(session))
    }
}
