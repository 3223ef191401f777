//! Dedup & stats store.
//!
//! Durable record of item outcomes keyed by `video_id`, aggregate counts, and
//! the registry of chat users that receive notifications.

mod ledger;
mod sqlite;
mod traits;

pub use ledger::DedupLedger;
pub use sqlite::SqliteDownloadStore;
pub use traits::{BotUser, DownloadRecord, DownloadStore, RecordFilter, RunStats, StoreError};
