//! Third-party downloader site sequences.
//!
//! Videos go through tikwm's original-quality downloader, photo slideshows
//! through imaiger's slideshow downloader. The selectors track those pages
//! and break when they change.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::browser::wait::wait_for_element;
use crate::browser::{BrowserSession, ElementRef, Locator, ScriptArg, SessionError};
use crate::config::AcquisitionConfig;
use crate::link::{DownloadItem, MediaKind};

use super::probe;
use super::types::{AcquisitionBackend, AcquisitionError, AcquisitionOutcome};

const TIKWM_URL: &str = "https://www.tikwm.com/originalDownloader.html";
const IMAIGER_URL: &str = "https://imaiger.com/tool/tiktok-slideshow-downloader";

const TIKWM_INPUT: &str = "input#url, .form-control";
const TIKWM_SUBMIT: &str = "button#search_btn";
const TIKWM_DOWNLOAD: &str = "//a[contains(@class, 'download') and contains(@href, 'tikwm.com')]";

const IMAIGER_INPUT: &str = "input";
const IMAIGER_LOAD: &str = "//button[contains(., 'Load')]";
const IMAIGER_DOWNLOAD_ALL: &str = "//button[contains(text(), 'Download All')]";

/// WebDriver key code for Enter.
const KEY_ENTER: &str = "\u{E007}";

const SET_VALUE_SCRIPT: &str = "arguments[0].value = arguments[1]; \
     arguments[0].dispatchEvent(new Event('input', { bubbles: true })); \
     arguments[0].dispatchEvent(new Event('change', { bubbles: true }));";
const CLEAR_FOCUS_SCRIPT: &str = "arguments[0].value = ''; arguments[0].focus();";
const CLICK_SCRIPT: &str = "arguments[0].click();";

/// Routes each item to the tool that handles its media kind.
pub struct SiteBackend {
    config: AcquisitionConfig,
}

impl SiteBackend {
    pub fn new(config: AcquisitionConfig) -> Self {
        Self { config }
    }

    fn element_timeout(&self) -> Duration {
        Duration::from_secs(self.config.element_timeout_secs)
    }

    fn settle_timeout(&self) -> Duration {
        Duration::from_secs(self.config.settle_timeout_secs)
    }

    fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.config.poll_interval_ms.max(1))
    }

    async fn wait(
        &self,
        session: &mut dyn BrowserSession,
        locator: Locator,
    ) -> Result<ElementRef, SessionError> {
        wait_for_element(session, &locator, self.element_timeout(), self.poll_interval()).await
    }

    async fn js_click(
        session: &mut dyn BrowserSession,
        element: &ElementRef,
    ) -> Result<(), SessionError> {
        session
            .execute_script(CLICK_SCRIPT, &[ScriptArg::from(element)])
            .await?;
        Ok(())
    }

    async fn video_sequence(
        &self,
        session: &mut dyn BrowserSession,
        link: &str,
    ) -> Result<(), SessionError> {
        session.navigate(TIKWM_URL).await?;

        let input = self.wait(session, Locator::css(TIKWM_INPUT)).await?;
        session
            .execute_script(SET_VALUE_SCRIPT, &[ScriptArg::from(&input), ScriptArg::from(link)])
            .await?;

        let submit = self.wait(session, Locator::css(TIKWM_SUBMIT)).await?;
        Self::js_click(session, &submit).await?;

        let download = self.wait(session, Locator::xpath(TIKWM_DOWNLOAD)).await?;
        Self::js_click(session, &download).await
    }

    async fn photo_sequence(
        &self,
        session: &mut dyn BrowserSession,
        link: &str,
    ) -> Result<(), SessionError> {
        session.navigate(IMAIGER_URL).await?;

        let input = self.wait(session, Locator::css(IMAIGER_INPUT)).await?;
        session
            .execute_script(CLEAR_FOCUS_SCRIPT, &[ScriptArg::from(&input)])
            .await?;
        session.send_keys(&input, link).await?;

        match session.find_element(&Locator::xpath(IMAIGER_LOAD)).await {
            Ok(load) => Self::js_click(session, &load).await?,
            Err(SessionError::NoSuchElement(_)) => session.send_keys(&input, KEY_ENTER).await?,
            Err(e) => return Err(e),
        }

        let download_all = self.wait(session, Locator::xpath(IMAIGER_DOWNLOAD_ALL)).await?;
        Self::js_click(session, &download_all).await
    }
}

#[async_trait]
impl AcquisitionBackend for SiteBackend {
    async fn acquire(
        &self,
        session: &mut dyn BrowserSession,
        item: &DownloadItem,
        dest_dir: &Path,
    ) -> Result<AcquisitionOutcome, AcquisitionError> {
        let before = probe::snapshot(dest_dir).await?;

        session.set_download_dir(dest_dir).await?;

        debug!(
            video_id = %item.video_id,
            kind = item.kind().as_str(),
            slot = session.slot(),
            "Running site sequence"
        );

        match item.kind() {
            MediaKind::Video => self.video_sequence(session, &item.source_url).await?,
            MediaKind::Photo => self.photo_sequence(session, &item.source_url).await?,
        }

        probe::wait_for_new_entries(dest_dir, &before, self.settle_timeout(), self.poll_interval())
            .await
    }
}
