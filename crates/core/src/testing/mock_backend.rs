//! Mock acquisition backend for testing.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::acquisition::{AcquisitionBackend, AcquisitionError, AcquisitionOutcome};
use crate::browser::BrowserSession;
use crate::link::DownloadItem;

/// Scripted behavior for one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockBehavior {
    /// Write one new file and succeed.
    Succeed,
    /// Run without producing a file.
    NoNewFile,
    /// Fail with "element not found".
    Fail,
    /// Fail this many times, then succeed.
    FailTimes(u32),
}

/// A recorded acquisition call for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedAcquisition {
    pub video_id: String,
    pub slot: usize,
    pub is_photo: bool,
}

/// Mock implementation of the AcquisitionBackend trait.
///
/// Provides controllable behavior for testing:
/// - Per-item success / no-new-file / failure scripts
/// - Simulated acquisition duration
/// - Call recording, including per-slot concurrency
///
/// # Example
///
/// ```rust,ignore
/// use tokgrab_core::testing::{MockBackend, MockBehavior};
///
/// let backend = MockBackend::new();
/// backend.set_behavior("222", MockBehavior::NoNewFile).await;
///
/// // Run the orchestrator...
///
/// assert_eq!(backend.calls_for("222").await, 2);
/// ```
#[derive(Debug, Clone)]
pub struct MockBackend {
    behaviors: Arc<RwLock<HashMap<String, MockBehavior>>>,
    default_behavior: Arc<RwLock<MockBehavior>>,
    calls: Arc<RwLock<Vec<RecordedAcquisition>>>,
    delay: Arc<RwLock<Duration>>,
    in_flight: Arc<RwLock<HashMap<usize, usize>>>,
    max_in_flight_per_slot: Arc<RwLock<usize>>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            behaviors: Arc::new(RwLock::new(HashMap::new())),
            default_behavior: Arc::new(RwLock::new(MockBehavior::Succeed)),
            calls: Arc::new(RwLock::new(Vec::new())),
            delay: Arc::new(RwLock::new(Duration::ZERO)),
            in_flight: Arc::new(RwLock::new(HashMap::new())),
            max_in_flight_per_slot: Arc::new(RwLock::new(0)),
        }
    }

    /// Script the behavior for one `video_id`.
    pub async fn set_behavior(&self, video_id: &str, behavior: MockBehavior) {
        self.behaviors
            .write()
            .await
            .insert(video_id.to_string(), behavior);
    }

    /// Behavior for items without a script.
    pub async fn set_default_behavior(&self, behavior: MockBehavior) {
        *self.default_behavior.write().await = behavior;
    }

    /// Simulated duration of every call.
    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.write().await = delay;
    }

    pub async fn recorded_calls(&self) -> Vec<RecordedAcquisition> {
        self.calls.read().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.calls.read().await.len()
    }

    /// Number of attempts made for `video_id`.
    pub async fn calls_for(&self, video_id: &str) -> usize {
        self.calls
            .read()
            .await
            .iter()
            .filter(|c| c.video_id == video_id)
            .count()
    }

    /// Highest number of simultaneous calls seen on any one slot.
    pub async fn max_in_flight_per_slot(&self) -> usize {
        *self.max_in_flight_per_slot.read().await
    }

    async fn enter(&self, slot: usize) {
        let mut in_flight = self.in_flight.write().await;
        let count = in_flight.entry(slot).or_insert(0);
        *count += 1;
        let mut max = self.max_in_flight_per_slot.write().await;
        *max = (*max).max(*count);
    }

    async fn leave(&self, slot: usize) {
        if let Some(count) = self.in_flight.write().await.get_mut(&slot) {
            *count = count.saturating_sub(1);
        }
    }
}

#[async_trait]
impl AcquisitionBackend for MockBackend {
    async fn acquire(
        &self,
        session: &mut dyn BrowserSession,
        item: &DownloadItem,
        dest_dir: &Path,
    ) -> Result<AcquisitionOutcome, AcquisitionError> {
        let slot = session.slot();
        let attempt = {
            let mut calls = self.calls.write().await;
            calls.push(RecordedAcquisition {
                video_id: item.video_id.clone(),
                slot,
                is_photo: item.is_photo,
            });
            calls.iter().filter(|c| c.video_id == item.video_id).count() as u32
        };

        self.enter(slot).await;
        let delay = *self.delay.read().await;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.leave(slot).await;

        let behavior = match self.behaviors.read().await.get(&item.video_id) {
            Some(behavior) => *behavior,
            None => *self.default_behavior.read().await,
        };

        let succeed = match behavior {
            MockBehavior::Succeed => true,
            MockBehavior::NoNewFile => false,
            MockBehavior::Fail => {
                return Err(AcquisitionError::ElementNotFound(
                    "css selector=input#url".to_string(),
                ))
            }
            MockBehavior::FailTimes(n) if attempt <= n => {
                return Err(AcquisitionError::ElementNotFound(
                    "css selector=button#search_btn".to_string(),
                ))
            }
            MockBehavior::FailTimes(_) => true,
        };

        let before = std::fs::read_dir(dest_dir)?.count();
        if !succeed {
            return Err(AcquisitionError::NoNewFile {
                before,
                after: before,
            });
        }

        let ext = if item.is_photo { "jpg" } else { "mp4" };
        let path = dest_dir.join(format!("{}-{}.{}", item.video_id, attempt, ext));
        std::fs::write(&path, format!("{}:{}", item.video_id, attempt))?;

        Ok(AcquisitionOutcome {
            new_file_count: 1,
            new_files: vec![path],
        })
    }
}
