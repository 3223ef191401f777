//! Types for classified download items.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Final (or pending) disposition of a single item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Pending,
    Success,
    Failed,
    Skipped,
}

impl Outcome {
    /// Returns the string stored in the `status` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Pending => "pending",
            Outcome::Success => "success",
            Outcome::Failed => "failed",
            Outcome::Skipped => "skipped",
        }
    }

    /// Parse a stored status string.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Outcome::Pending),
            "success" => Some(Outcome::Success),
            "failed" => Some(Outcome::Failed),
            "skipped" => Some(Outcome::Skipped),
            _ => None,
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of media behind a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Video,
    Photo,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Video => "video",
            MediaKind::Photo => "photo",
        }
    }
}

/// One classified unit of download work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadItem {
    /// Last path segment of the canonical URL; unique key in the store.
    pub video_id: String,
    /// Handle from the `@handle` segment, or `"user"` when absent.
    pub owner_username: String,
    pub is_photo: bool,
    /// Link with the query string stripped.
    pub source_url: String,
    pub outcome: Outcome,
    /// Set when an outcome is stamped; `None` while pending.
    pub recorded_at: Option<DateTime<Utc>>,
    pub destination_path: Option<PathBuf>,
}

impl DownloadItem {
    pub fn kind(&self) -> MediaKind {
        if self.is_photo {
            MediaKind::Photo
        } else {
            MediaKind::Video
        }
    }

    /// Returns a copy of this item with the given outcome stamped now.
    pub fn with_outcome(&self, outcome: Outcome, destination_path: Option<PathBuf>) -> Self {
        Self {
            outcome,
            recorded_at: Some(Utc::now()),
            destination_path,
            ..self.clone()
        }
    }
}
