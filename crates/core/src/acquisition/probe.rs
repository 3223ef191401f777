//! Destination directory probing.
//!
//! Success is judged by entry count, once at least one new entry is a
//! finished file. In-progress browser downloads (`.crdownload` and friends)
//! do not settle an attempt. An unrelated file dropped into the directory
//! still counts.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use sha2::{Digest, Sha256};
use tokio::fs::{self, File};
use tokio::io::{AsyncReadExt, BufReader};

use crate::browser::wait::poll_until;

use super::types::{AcquisitionError, AcquisitionOutcome};

const HASH_BUFFER_SIZE: usize = 64 * 1024;

/// Suffixes browsers use for in-progress downloads.
const PARTIAL_SUFFIXES: &[&str] = &["crdownload", "part", "tmp"];

/// Entries currently in `dir`.
pub async fn snapshot(dir: &Path) -> std::io::Result<BTreeSet<PathBuf>> {
    let mut entries = BTreeSet::new();
    let mut read_dir = fs::read_dir(dir).await?;
    while let Some(entry) = read_dir.next_entry().await? {
        entries.insert(entry.path());
    }
    Ok(entries)
}

/// Poll `dir` until it holds more entries than `before` and one of the new
/// entries is a finished file, or `timeout` passes.
pub async fn wait_for_new_entries(
    dir: &Path,
    before: &BTreeSet<PathBuf>,
    timeout: Duration,
    interval: Duration,
) -> Result<AcquisitionOutcome, AcquisitionError> {
    let grown = poll_until(timeout, interval, move || async move {
        match snapshot(dir).await {
            Ok(after) if is_settled(before, &after) => Some(after),
            _ => None,
        }
    })
    .await;

    match grown {
        Some(after) => Ok(diff(before, &after)),
        None => {
            let after = snapshot(dir).await?;
            Err(AcquisitionError::NoNewFile {
                before: before.len(),
                after: after.len(),
            })
        }
    }
}

fn is_settled(before: &BTreeSet<PathBuf>, after: &BTreeSet<PathBuf>) -> bool {
    after.len() > before.len() && after.difference(before).any(|path| !is_partial(path))
}

/// Finished entries in `after` that are not in `before`.
///
/// `new_file_count` is the raw growth in entry count.
pub fn diff(before: &BTreeSet<PathBuf>, after: &BTreeSet<PathBuf>) -> AcquisitionOutcome {
    let new_files: Vec<PathBuf> = after
        .difference(before)
        .filter(|path| !is_partial(path))
        .cloned()
        .collect();
    AcquisitionOutcome {
        new_file_count: after.len().saturating_sub(before.len()),
        new_files,
    }
}

fn is_partial(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| PARTIAL_SUFFIXES.contains(&ext))
        .unwrap_or(false)
}

/// SHA-256 of a file as lowercase hex.
pub async fn fingerprint(path: &Path) -> std::io::Result<String> {
    let file = File::open(path).await?;
    let mut reader = BufReader::with_capacity(HASH_BUFFER_SIZE, file);
    let mut buffer = vec![0u8; HASH_BUFFER_SIZE];
    let mut hasher = Sha256::new();
    loop {
        let bytes_read = reader.read(&mut buffer).await?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Fingerprint of the first complete regular file among `new_files`.
pub async fn first_fingerprint(new_files: &[PathBuf]) -> Option<String> {
    for path in new_files {
        if is_partial(path) {
            continue;
        }
        match fs::metadata(path).await {
            Ok(meta) if meta.is_file() => {}
            _ => continue,
        }
        if let Ok(hash) = fingerprint(path).await {
            return Some(hash);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_snapshot_and_diff() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.mp4"), b"a").unwrap();
        let before = snapshot(dir.path()).await.unwrap();
        assert_eq!(before.len(), 1);

        std::fs::write(dir.path().join("b.mp4"), b"b").unwrap();
        let after = snapshot(dir.path()).await.unwrap();
        let outcome = diff(&before, &after);

        assert_eq!(outcome.new_file_count, 1);
        assert_eq!(outcome.new_files, vec![dir.path().join("b.mp4")]);
    }

    #[tokio::test]
    async fn test_wait_for_new_entries_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let before = snapshot(dir.path()).await.unwrap();

        let result = wait_for_new_entries(
            dir.path(),
            &before,
            Duration::from_millis(30),
            Duration::from_millis(10),
        )
        .await;

        assert!(matches!(
            result,
            Err(AcquisitionError::NoNewFile { before: 0, after: 0 })
        ));
    }

    #[tokio::test]
    async fn test_wait_for_new_entries_sees_late_file() {
        let dir = tempfile::tempdir().unwrap();
        let before = snapshot(dir.path()).await.unwrap();

        let path = dir.path().join("late.mp4");
        let writer = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            tokio::fs::write(path, b"late").await.unwrap();
        });

        let outcome = wait_for_new_entries(
            dir.path(),
            &before,
            Duration::from_secs(2),
            Duration::from_millis(5),
        )
        .await
        .unwrap();
        writer.await.unwrap();

        assert_eq!(outcome.new_file_count, 1);
    }

    #[tokio::test]
    async fn test_partial_download_does_not_settle() {
        let dir = tempfile::tempdir().unwrap();
        let before = snapshot(dir.path()).await.unwrap();
        std::fs::write(dir.path().join("v.mp4.crdownload"), b"half").unwrap();

        let result = wait_for_new_entries(
            dir.path(),
            &before,
            Duration::from_millis(40),
            Duration::from_millis(5),
        )
        .await;
        assert!(matches!(
            result,
            Err(AcquisitionError::NoNewFile { before: 0, after: 1 })
        ));
    }

    #[tokio::test]
    async fn test_waits_for_partial_to_finish() {
        let dir = tempfile::tempdir().unwrap();
        let before = snapshot(dir.path()).await.unwrap();
        let partial = dir.path().join("v.mp4.crdownload");
        let finished = dir.path().join("v.mp4");
        std::fs::write(&partial, b"half").unwrap();

        let writer = {
            let finished = finished.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(30)).await;
                tokio::fs::rename(partial, finished).await.unwrap();
            })
        };

        let outcome = wait_for_new_entries(
            dir.path(),
            &before,
            Duration::from_secs(2),
            Duration::from_millis(5),
        )
        .await
        .unwrap();
        writer.await.unwrap();

        assert_eq!(outcome.new_file_count, 1);
        assert_eq!(outcome.new_files, vec![finished]);
    }

    #[tokio::test]
    async fn test_fingerprint_known_value() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hello.txt");
        std::fs::write(&path, b"hello").unwrap();

        assert_eq!(
            fingerprint(&path).await.unwrap(),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[tokio::test]
    async fn test_first_fingerprint_skips_partial_downloads() {
        let dir = tempfile::tempdir().unwrap();
        let partial = dir.path().join("a.mp4.crdownload");
        let done = dir.path().join("b.mp4");
        std::fs::write(&partial, b"partial").unwrap();
        std::fs::write(&done, b"hello").unwrap();

        let hash = first_fingerprint(&[partial.clone()]).await;
        assert!(hash.is_none());

        let hash = first_fingerprint(&[partial, done]).await.unwrap();
        assert!(hash.starts_with("2cf24dba"));
    }
}
