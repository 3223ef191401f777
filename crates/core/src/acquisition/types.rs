//! Acquisition backend trait and types.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

use crate::browser::{BrowserSession, SessionError};
use crate::link::DownloadItem;

/// Files that appeared in the destination directory during one attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AcquisitionOutcome {
    pub new_file_count: usize,
    /// Sorted paths of the new entries.
    pub new_files: Vec<PathBuf>,
}

/// Errors from a single acquisition attempt.
#[derive(Debug, Error)]
pub enum AcquisitionError {
    /// Session-level failure that doesn't fit a narrower variant.
    #[error("session error: {0}")]
    Session(SessionError),

    /// A page element never showed up.
    #[error("element not found: {0}")]
    ElementNotFound(String),

    /// The tool page could not be loaded.
    #[error("navigation failed: {0}")]
    Navigation(String),

    /// The automation ran but the directory entry count did not grow.
    #[error("no new file appeared (entries before: {before}, after: {after})")]
    NoNewFile { before: usize, after: usize },

    /// Destination directory could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<SessionError> for AcquisitionError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::NoSuchElement(locator) => AcquisitionError::ElementNotFound(locator),
            SessionError::Navigation(msg) => AcquisitionError::Navigation(msg),
            other => AcquisitionError::Session(other),
        }
    }
}

impl AcquisitionError {
    /// Short label used for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            AcquisitionError::Session(_) => "session",
            AcquisitionError::ElementNotFound(_) => "element_not_found",
            AcquisitionError::Navigation(_) => "navigation",
            AcquisitionError::NoNewFile { .. } => "no_new_file",
            AcquisitionError::Io(_) => "io",
        }
    }
}

/// Performs the site-specific automation for one item.
///
/// `dest_dir` must already exist. Success means the directory's entry count
/// grew during the call; a call that adds nothing returns
/// [`AcquisitionError::NoNewFile`].
#[async_trait]
pub trait AcquisitionBackend: Send + Sync {
    async fn acquire(
        &self,
        session: &mut dyn BrowserSession,
        item: &DownloadItem,
        dest_dir: &Path,
    ) -> Result<AcquisitionOutcome, AcquisitionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_error_conversion() {
        let err: AcquisitionError = SessionError::NoSuchElement("css selector=input".into()).into();
        assert!(matches!(err, AcquisitionError::ElementNotFound(_)));

        let err: AcquisitionError = SessionError::Navigation("net::ERR_TIMED_OUT".into()).into();
        assert!(matches!(err, AcquisitionError::Navigation(_)));

        let err: AcquisitionError = SessionError::Closed.into();
        assert_eq!(err.label(), "session");
    }

    #[test]
    fn test_no_new_file_display() {
        let err = AcquisitionError::NoNewFile { before: 3, after: 3 };
        assert_eq!(
            err.to_string(),
            "no new file appeared (entries before: 3, after: 3)"
        );
    }
}
