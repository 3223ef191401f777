//! SQLite-backed download store implementation.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::link::{DownloadItem, Outcome};

use super::traits::{BotUser, DownloadRecord, DownloadStore, RecordFilter, RunStats, StoreError};

/// SQLite-backed download store.
pub struct SqliteDownloadStore {
    conn: Mutex<Connection>,
}

impl SqliteDownloadStore {
    /// Create a new SQLite store, creating the database file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| StoreError::Database(e.to_string()))?;
            }
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite store (useful for testing).
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), StoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS downloads (
                id INTEGER PRIMARY KEY,
                video_id TEXT UNIQUE,
                username TEXT,
                url TEXT,
                status TEXT,
                download_date TIMESTAMP,
                file_path TEXT
            );

            CREATE TABLE IF NOT EXISTS telegram_users (
                user_id INTEGER PRIMARY KEY,
                username TEXT,
                downloads_count INTEGER DEFAULT 0,
                join_date TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_downloads_status ON downloads(status);
            CREATE INDEX IF NOT EXISTS idx_downloads_username ON downloads(username);
            "#,
        )?;

        // Migration: add content_hash column if it doesn't exist
        let _ = conn.execute("ALTER TABLE downloads ADD COLUMN content_hash TEXT", []);

        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Database("connection mutex poisoned".to_string()))
    }

    fn parse_timestamp(raw: Option<String>) -> DateTime<Utc> {
        raw.and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(Utc::now)
    }

    fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<DownloadRecord> {
        let video_id: String = row.get(0)?;
        let username: Option<String> = row.get(1)?;
        let url: Option<String> = row.get(2)?;
        let status: Option<String> = row.get(3)?;
        let download_date: Option<String> = row.get(4)?;
        let file_path: Option<String> = row.get(5)?;
        let content_hash: Option<String> = row.get(6)?;

        Ok(DownloadRecord {
            video_id,
            username: username.unwrap_or_default(),
            url: url.unwrap_or_default(),
            status: status
                .as_deref()
                .and_then(Outcome::parse)
                .unwrap_or(Outcome::Failed),
            download_date: Self::parse_timestamp(download_date),
            file_path: file_path.unwrap_or_default(),
            content_hash,
        })
    }

    fn build_where_clause(filter: &RecordFilter) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(status) = filter.status {
            conditions.push("status = ?");
            params.push(Box::new(status.as_str()));
        }

        if let Some(ref username) = filter.username {
            conditions.push("username = ?");
            params.push(Box::new(username.clone()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        (where_clause, params)
    }
}

impl DownloadStore for SqliteDownloadStore {
    fn is_already_succeeded(&self, video_id: &str) -> Result<bool, StoreError> {
        let conn = self.lock()?;
        let found: Option<i64> = conn
            .query_row(
                "SELECT id FROM downloads WHERE video_id = ? AND status = 'success'",
                params![video_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn record_outcome(
        &self,
        item: &DownloadItem,
        outcome: Outcome,
        destination_path: Option<&str>,
        content_hash: Option<&str>,
    ) -> Result<(), StoreError> {
        if !matches!(outcome, Outcome::Success | Outcome::Failed) {
            return Err(StoreError::NotPersisted(outcome));
        }

        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO downloads (video_id, username, url, status, download_date, file_path, content_hash) VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                item.video_id,
                item.owner_username,
                item.source_url,
                outcome.as_str(),
                Utc::now().to_rfc3339(),
                destination_path.unwrap_or_default(),
                content_hash,
            ],
        )?;
        Ok(())
    }

    fn stats(&self) -> Result<RunStats, StoreError> {
        let conn = self.lock()?;
        let (success, failed): (i64, i64) = conn.query_row(
            "SELECT \
                COALESCE(SUM(CASE WHEN status = 'success' THEN 1 ELSE 0 END), 0), \
                COALESCE(SUM(CASE WHEN status = 'failed' THEN 1 ELSE 0 END), 0) \
             FROM downloads",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        Ok(RunStats {
            success_count: success.max(0) as u64,
            failed_count: failed.max(0) as u64,
        })
    }

    fn get(&self, video_id: &str) -> Result<Option<DownloadRecord>, StoreError> {
        let conn = self.lock()?;
        let record = conn
            .query_row(
                "SELECT video_id, username, url, status, download_date, file_path, content_hash FROM downloads WHERE video_id = ?",
                params![video_id],
                Self::row_to_record,
            )
            .optional()?;
        Ok(record)
    }

    fn list(&self, filter: &RecordFilter) -> Result<Vec<DownloadRecord>, StoreError> {
        let conn = self.lock()?;

        let (where_clause, params) = Self::build_where_clause(filter);
        let sql = format!(
            "SELECT video_id, username, url, status, download_date, file_path, content_hash FROM downloads {} ORDER BY download_date DESC, id DESC LIMIT ? OFFSET ?",
            where_clause
        );

        let mut stmt = conn.prepare(&sql)?;

        let mut all_params: Vec<Box<dyn rusqlite::ToSql>> = params;
        all_params.push(Box::new(filter.limit));
        all_params.push(Box::new(filter.offset));

        let param_refs: Vec<&dyn rusqlite::ToSql> = all_params.iter().map(|p| p.as_ref()).collect();

        let rows = stmt.query_map(param_refs.as_slice(), Self::row_to_record)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    fn add_user(&self, user_id: i64, username: &str) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR IGNORE INTO telegram_users (user_id, username, join_date) VALUES (?, ?, ?)",
            params![user_id, username, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn increment_user_downloads(&self, user_id: i64, count: u64) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE telegram_users SET downloads_count = COALESCE(downloads_count, 0) + ? WHERE user_id = ?",
            params![count as i64, user_id],
        )?;
        Ok(())
    }

    fn list_users(&self) -> Result<Vec<BotUser>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT user_id, username, downloads_count, join_date FROM telegram_users ORDER BY join_date ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            let user_id: i64 = row.get(0)?;
            let username: Option<String> = row.get(1)?;
            let downloads_count: Option<i64> = row.get(2)?;
            let join_date: Option<String> = row.get(3)?;
            Ok(BotUser {
                user_id,
                username: username.unwrap_or_default(),
                downloads_count: downloads_count.unwrap_or(0).max(0) as u64,
                join_date: Self::parse_timestamp(join_date),
            })
        })?;

        let mut users = Vec::new();
        for row in rows {
            users.push(row?);
        }
        Ok(users)
    }
}
