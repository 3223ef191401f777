//! Download store trait and types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::link::{DownloadItem, Outcome};

/// Error type for store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error.
    #[error("Database error: {0}")]
    Database(String),

    /// Outcome that can't be persisted.
    #[error("Outcome {0} is not persisted")]
    NotPersisted(Outcome),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

/// A stored download row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadRecord {
    pub video_id: String,
    pub username: String,
    pub url: String,
    pub status: Outcome,
    pub download_date: DateTime<Utc>,
    /// Empty when the item failed or the file could not be identified.
    pub file_path: String,
    /// SHA-256 of the first new file, when one was identified.
    pub content_hash: Option<String>,
}

/// Aggregate counters over the whole store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    pub success_count: u64,
    pub failed_count: u64,
}

impl RunStats {
    pub fn total(&self) -> u64 {
        self.success_count + self.failed_count
    }
}

/// A registered chat user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotUser {
    pub user_id: i64,
    pub username: String,
    pub downloads_count: u64,
    pub join_date: DateTime<Utc>,
}

/// Filter for listing download records.
#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    /// Filter by status.
    pub status: Option<Outcome>,
    /// Filter by owner username.
    pub username: Option<String>,
    /// Maximum number of results.
    pub limit: i64,
    /// Offset for pagination.
    pub offset: i64,
}

impl RecordFilter {
    /// Create a new filter with defaults.
    pub fn new() -> Self {
        Self {
            status: None,
            username: None,
            limit: 100,
            offset: 0,
        }
    }

    /// Filter by status.
    pub fn with_status(mut self, status: Outcome) -> Self {
        self.status = Some(status);
        self
    }

    /// Filter by owner username.
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Set limit.
    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    /// Set offset.
    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }
}

/// Trait for download store backends.
///
/// Implementations must be safe to call from concurrent callers and must
/// serialize conflicting writes per `video_id`.
pub trait DownloadStore: Send + Sync {
    /// True only if a row exists for `video_id` with status `success`.
    fn is_already_succeeded(&self, video_id: &str) -> Result<bool, StoreError>;

    /// Upsert the row for `item.video_id`, replacing any earlier row.
    ///
    /// Only `success` and `failed` are persisted.
    fn record_outcome(
        &self,
        item: &DownloadItem,
        outcome: Outcome,
        destination_path: Option<&str>,
        content_hash: Option<&str>,
    ) -> Result<(), StoreError>;

    /// Count rows per status.
    fn stats(&self) -> Result<RunStats, StoreError>;

    /// Get a single row.
    fn get(&self, video_id: &str) -> Result<Option<DownloadRecord>, StoreError>;

    /// List rows matching the filter, newest first.
    fn list(&self, filter: &RecordFilter) -> Result<Vec<DownloadRecord>, StoreError>;

    /// Register a chat user; existing users are left untouched.
    fn add_user(&self, user_id: i64, username: &str) -> Result<(), StoreError>;

    /// Add `count` to a user's download counter.
    fn increment_user_downloads(&self, user_id: i64, count: u64) -> Result<(), StoreError>;

    /// All registered chat users.
    fn list_users(&self) -> Result<Vec<BotUser>, StoreError>;
}
