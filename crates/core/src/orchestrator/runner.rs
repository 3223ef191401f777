//! Download orchestrator implementation.
//!
//! Drives one batch of links through the per-item state machine:
//! - Dispatch: sequential, in batch order, on the calling task
//! - Acquisition: concurrent, one in-flight item per pool slot, retries included
//! - Bookkeeping: only on the calling task, as completions arrive

use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::{Notify, RwLock};
use tokio::task::{Id, JoinError, JoinSet};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::acquisition::{probe, AcquisitionBackend, AcquisitionError, AcquisitionOutcome};
use crate::browser::{SessionError, SessionFactory, SessionPool, SessionSlot};
use crate::config::{BrowserConfig, Config};
use crate::link::{classify_checked, DownloadItem, Outcome};
use crate::metrics;
use crate::notify::{NotificationSink, RunEvent};
use crate::retry::RetryPolicy;
use crate::store::{DedupLedger, DownloadStore};

use super::config::OrchestratorConfig;
use super::types::{OrchestratorError, OrchestratorStatus, RunResult};

/// A file that was acquired for an item.
#[derive(Debug)]
struct Acquired {
    outcome: AcquisitionOutcome,
    content_hash: Option<String>,
}

/// What a worker hands back to the coordinating task.
struct Completion {
    link: String,
    item: DownloadItem,
    dest_dir: PathBuf,
    result: Result<Acquired, AcquisitionError>,
    elapsed: Duration,
}

/// Item data kept by the coordinator while the worker runs, so a panicked
/// worker can still be accounted for.
struct Dispatched {
    link: String,
    item: DownloadItem,
}

/// Clears the busy flag when a run ends, however it ends.
struct BusyGuard(Arc<AtomicBool>);

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// The download orchestrator.
///
/// Only one run may be active at a time; a concurrent `run` is rejected
/// with [`OrchestratorError::Busy`].
pub struct DownloadOrchestrator {
    config: OrchestratorConfig,
    browser: BrowserConfig,
    retry: RetryPolicy,
    ledger: DedupLedger,
    sessions: Arc<dyn SessionFactory>,
    backend: Arc<dyn AcquisitionBackend>,
    sink: Arc<dyn NotificationSink>,

    // Runtime state
    busy: Arc<AtomicBool>,
    keep_running: Arc<AtomicBool>,
    cancelled: Arc<Notify>,
    status: Arc<RwLock<OrchestratorStatus>>,
    last_result: Arc<RwLock<Option<RunResult>>>,
}

impl DownloadOrchestrator {
    /// Create a new orchestrator.
    pub fn new(
        config: &Config,
        store: Arc<dyn DownloadStore>,
        sessions: Arc<dyn SessionFactory>,
        backend: Arc<dyn AcquisitionBackend>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            config: config.downloads.clone(),
            browser: config.browser.clone(),
            retry: RetryPolicy::from(&config.retry),
            ledger: DedupLedger::new(store),
            sessions,
            backend,
            sink,
            busy: Arc::new(AtomicBool::new(false)),
            keep_running: Arc::new(AtomicBool::new(false)),
            cancelled: Arc::new(Notify::new()),
            status: Arc::new(RwLock::new(OrchestratorStatus::default())),
            last_result: Arc::new(RwLock::new(None)),
        }
    }

    /// The dedup ledger this orchestrator records into.
    pub fn ledger(&self) -> &DedupLedger {
        &self.ledger
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Ask the current run to stop dispatching.
    ///
    /// Takes effect at the next dispatch boundary. In-flight acquisitions
    /// finish and are recorded.
    pub fn cancel(&self) {
        if self.is_busy() {
            info!("Cancellation requested");
        }
        self.keep_running.store(false, Ordering::SeqCst);
        self.cancelled.notify_one();
    }

    /// Get current orchestrator status.
    pub async fn status(&self) -> OrchestratorStatus {
        let mut status = self.status.read().await.clone();
        status.running = self.is_busy();
        status.cancel_requested = status.running && !self.keep_running.load(Ordering::SeqCst);
        status
    }

    /// Result of the most recent finished run.
    pub async fn last_result(&self) -> Option<RunResult> {
        self.last_result.read().await.clone()
    }

    /// Process a batch of raw links.
    ///
    /// Per-item failures never fail the run; they are counted and returned
    /// in `failed_links`. An error is returned only if the run could not
    /// start.
    pub async fn run(&self, batch: Vec<String>) -> Result<RunResult, OrchestratorError> {
        self.run_with(batch, |_| async {}).await
    }

    /// Like [`run`](Self::run), calling `on_accepted` once the run has been
    /// admitted and before any event for it is emitted.
    ///
    /// `on_accepted` is not called when the run is rejected as busy.
    pub async fn run_with<F, Fut>(
        &self,
        batch: Vec<String>,
        on_accepted: F,
    ) -> Result<RunResult, OrchestratorError>
    where
        F: FnOnce(Uuid) -> Fut,
        Fut: Future<Output = ()>,
    {
        if self.busy.swap(true, Ordering::SeqCst) {
            warn!("Download run rejected, orchestrator busy");
            return Err(OrchestratorError::Busy);
        }
        let _busy = BusyGuard(Arc::clone(&self.busy));
        self.keep_running.store(true, Ordering::SeqCst);

        let run_id = Uuid::new_v4();
        on_accepted(run_id).await;
        let started = Instant::now();
        let total = batch.len();

        {
            let mut status = self.status.write().await;
            *status = OrchestratorStatus {
                running: true,
                run_id: Some(run_id),
                started_at: Some(Utc::now()),
                total,
                ..Default::default()
            };
        }

        info!(run_id = %run_id, total, workers = self.config.max_workers, "Starting download run");

        let pool =
            match SessionPool::start(self.sessions.as_ref(), &self.browser, self.config.max_workers)
                .await
            {
                Ok(pool) => pool,
                Err(e) => return Err(self.abort(run_id, started, e).await),
            };

        self.sink
            .notify(&RunEvent::RunStarted { run_id, total })
            .await;

        let result = self.dispatch_all(run_id, batch, &pool).await;

        pool.release_all().await;

        let outcome_label = if result.cancelled { "cancelled" } else { "completed" };
        metrics::RUNS_TOTAL.with_label_values(&[outcome_label]).inc();
        metrics::RUN_DURATION
            .with_label_values(&[outcome_label])
            .observe(started.elapsed().as_secs_f64());

        info!(
            run_id = %run_id,
            success = result.success_count,
            failed = result.failed_count,
            skipped = result.skipped_count,
            cancelled = result.cancelled,
            elapsed_secs = started.elapsed().as_secs(),
            "Download run finished"
        );

        self.finish(result.clone()).await;
        Ok(result)
    }

    /// Startup failure: report, emit the final summary, return to idle.
    async fn abort(&self, run_id: Uuid, started: Instant, e: SessionError) -> OrchestratorError {
        error!(run_id = %run_id, error = %e, "Download run aborted, sessions could not start");

        self.sink
            .notify(&RunEvent::RunAborted {
                run_id,
                reason: e.to_string(),
            })
            .await;

        metrics::RUNS_TOTAL.with_label_values(&["aborted"]).inc();
        metrics::RUN_DURATION
            .with_label_values(&["aborted"])
            .observe(started.elapsed().as_secs_f64());

        self.finish(RunResult::empty(run_id)).await;
        OrchestratorError::SessionStartup(e)
    }

    async fn finish(&self, result: RunResult) {
        self.sink
            .notify(&RunEvent::RunComplete {
                result: result.clone(),
            })
            .await;
        *self.last_result.write().await = Some(result);
        let mut status = self.status.write().await;
        status.running = false;
        status.in_flight = 0;
    }

    async fn dispatch_all(&self, run_id: Uuid, batch: Vec<String>, pool: &SessionPool) -> RunResult {
        let total = batch.len();
        let delay = Duration::from_secs(self.config.delay_between_downloads);
        let mut result = RunResult::empty(run_id);
        let mut in_flight: JoinSet<Completion> = JoinSet::new();
        let mut dispatched: HashMap<Id, Dispatched> = HashMap::new();

        for (index, link) in batch.into_iter().enumerate() {
            if !self.keep_running.load(Ordering::SeqCst) {
                info!(run_id = %run_id, dispatched = index, total, "Dispatch stopped by cancellation");
                result.cancelled = true;
                break;
            }

            self.sink
                .notify(&RunEvent::Progress {
                    run_id,
                    current: index + 1,
                    total,
                })
                .await;
            self.status.write().await.processed = index + 1;

            let (item, anomalies) = classify_checked(&link);
            for anomaly in &anomalies {
                warn!(link = %link, "{}", anomaly);
            }

            if self.ledger.is_already_succeeded(&item.video_id) {
                debug!(video_id = %item.video_id, "Already downloaded, skipping");
                result.success_count += 1;
                result.skipped_count += 1;
                self.report_item(run_id, &item, Outcome::Skipped, &link).await;
                self.sync_counters(&result).await;
                continue;
            }

            let dest_dir = self.config.download_path.join(&item.owner_username);
            if let Err(e) = tokio::fs::create_dir_all(&dest_dir).await {
                error!(dir = %dest_dir.display(), error = %e, "Failed to create destination directory");
                let failed = Completion {
                    link,
                    item,
                    dest_dir,
                    result: Err(AcquisitionError::Io(e)),
                    elapsed: Duration::ZERO,
                };
                self.complete(run_id, failed, &mut result).await;
                continue;
            }

            let slot = pool.slot_for(index);
            debug!(video_id = %item.video_id, slot = slot.index(), "Dispatching");
            let handle = in_flight.spawn(acquire_item(
                slot,
                Arc::clone(&self.backend),
                self.retry.clone(),
                link.clone(),
                item.clone(),
                dest_dir,
            ));
            dispatched.insert(handle.id(), Dispatched { link, item });
            self.status.write().await.in_flight = in_flight.len();

            // Pace dispatches, collecting whatever finishes meanwhile.
            // Cancellation cuts the pause short.
            let pause = tokio::time::sleep(delay);
            tokio::pin!(pause);
            loop {
                tokio::select! {
                    _ = &mut pause => break,
                    _ = self.cancelled.notified() => {
                        // A permit left over from an idle cancel() is ignored
                        if !self.keep_running.load(Ordering::SeqCst) {
                            break;
                        }
                    }
                    Some(joined) = in_flight.join_next_with_id(), if !in_flight.is_empty() => {
                        self.collect(run_id, joined, &mut dispatched, &mut result).await;
                        self.status.write().await.in_flight = in_flight.len();
                    }
                }
            }
        }

        // In-flight work is never cancelled, only awaited
        while let Some(joined) = in_flight.join_next_with_id().await {
            self.collect(run_id, joined, &mut dispatched, &mut result).await;
            self.status.write().await.in_flight = in_flight.len();
        }

        result
    }

    async fn collect(
        &self,
        run_id: Uuid,
        joined: Result<(Id, Completion), JoinError>,
        dispatched: &mut HashMap<Id, Dispatched>,
        result: &mut RunResult,
    ) {
        match joined {
            Ok((id, completion)) => {
                dispatched.remove(&id);
                self.complete(run_id, completion, result).await;
            }
            Err(join_error) => {
                let Some(Dispatched { link, item }) = dispatched.remove(&join_error.id()) else {
                    error!(error = %join_error, "Acquisition task failed for an unknown item");
                    return;
                };
                error!(video_id = %item.video_id, error = %join_error, "Acquisition task panicked");
                let dest_dir = self.config.download_path.join(&item.owner_username);
                let failed = Completion {
                    link,
                    item,
                    dest_dir,
                    result: Err(AcquisitionError::Session(SessionError::Driver(
                        join_error.to_string(),
                    ))),
                    elapsed: Duration::ZERO,
                };
                self.complete(run_id, failed, result).await;
            }
        }
    }

    /// Record a terminal outcome. Runs on the coordinating task only.
    async fn complete(&self, run_id: Uuid, completion: Completion, result: &mut RunResult) {
        let Completion {
            link,
            item,
            dest_dir,
            result: acquired,
            elapsed,
        } = completion;

        metrics::ACQUISITION_DURATION
            .with_label_values(&[item.kind().as_str()])
            .observe(elapsed.as_secs_f64());

        match acquired {
            Ok(acquired) => {
                let file_path = acquired
                    .outcome
                    .new_files
                    .first()
                    .cloned()
                    .unwrap_or_else(|| dest_dir.clone());
                let file_path_str = file_path.to_string_lossy().into_owned();
                let item = item.with_outcome(Outcome::Success, Some(file_path));

                result.success_count += 1;
                self.ledger.record(
                    &item,
                    Outcome::Success,
                    Some(&file_path_str),
                    acquired.content_hash.as_deref(),
                );
                info!(
                    video_id = %item.video_id,
                    new_files = acquired.outcome.new_file_count,
                    "Downloaded"
                );
                self.report_item(run_id, &item, Outcome::Success, &link).await;
            }
            Err(e) => {
                let item = item.with_outcome(Outcome::Failed, None);

                result.failed_count += 1;
                result.failed_links.push(link.clone());
                self.ledger.record(&item, Outcome::Failed, None, None);
                warn!(video_id = %item.video_id, link = %link, error = %e, "Download failed");
                self.report_item(run_id, &item, Outcome::Failed, &link).await;
            }
        }

        self.sync_counters(result).await;
    }

    async fn report_item(&self, run_id: Uuid, item: &DownloadItem, outcome: Outcome, link: &str) {
        metrics::ITEMS_PROCESSED
            .with_label_values(&[item.kind().as_str(), outcome.as_str()])
            .inc();
        self.sink
            .notify(&RunEvent::ItemResult {
                run_id,
                kind: item.kind(),
                owner: item.owner_username.clone(),
                outcome,
                link: link.to_string(),
            })
            .await;
    }

    async fn sync_counters(&self, result: &RunResult) {
        let mut status = self.status.write().await;
        status.success_count = result.success_count;
        status.failed_count = result.failed_count;
    }
}

/// Retry-wrapped acquisition of one item on its slot.
///
/// The slot stays locked across every attempt and backoff, so the next item
/// routed to it starts only once this one has finished.
async fn acquire_item(
    slot: SessionSlot,
    backend: Arc<dyn AcquisitionBackend>,
    retry: RetryPolicy,
    link: String,
    item: DownloadItem,
    dest_dir: PathBuf,
) -> Completion {
    let started = Instant::now();

    let mut guard = slot.lock().await;
    let attempt_result = match guard.as_deref_mut() {
        None => Err(AcquisitionError::Session(SessionError::Closed)),
        Some(session) => {
            let mut attempt = 1;
            loop {
                debug!(video_id = %item.video_id, slot = slot.index(), attempt, "Acquisition attempt");
                let attempt_result = backend.acquire(session, &item, &dest_dir).await;

                let label = match &attempt_result {
                    Ok(_) => "success",
                    Err(e) => e.label(),
                };
                metrics::ACQUISITION_ATTEMPTS
                    .with_label_values(&[item.kind().as_str(), label])
                    .inc();

                match attempt_result {
                    Ok(outcome) => break Ok(outcome),
                    Err(e) if !retry.has_attempts_left(attempt) => break Err(e),
                    Err(e) => {
                        retry.backoff(attempt, &e).await;
                        attempt += 1;
                    }
                }
            }
        }
    };
    drop(guard);

    let result = match attempt_result {
        Ok(outcome) => {
            let content_hash = probe::first_fingerprint(&outcome.new_files).await;
            Ok(Acquired {
                outcome,
                content_hash,
            })
        }
        Err(e) => Err(e),
    };

    Completion {
        link,
        item,
        dest_dir,
        result,
        elapsed: started.elapsed(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteDownloadStore;
    use crate::testing::{MockBackend, MockSessionFactory, RecordingSink};

    fn test_config(download_path: PathBuf) -> Config {
        let mut config = Config::default();
        config.downloads.download_path = download_path;
        config.downloads.delay_between_downloads = 0;
        config.retry.min_wait_secs = 0.0;
        config.retry.max_wait_secs = 0.01;
        config.retry.multiplier_secs = 0.0;
        config
    }

    #[tokio::test]
    async fn test_status_idle() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = DownloadOrchestrator::new(
            &test_config(dir.path().to_path_buf()),
            Arc::new(SqliteDownloadStore::in_memory().unwrap()),
            Arc::new(MockSessionFactory::new()),
            Arc::new(MockBackend::new()),
            Arc::new(RecordingSink::new()),
        );

        let status = orchestrator.status().await;
        assert!(!status.running);
        assert!(!orchestrator.is_busy());
        assert!(orchestrator.last_result().await.is_none());
    }

    #[tokio::test]
    async fn test_run_with_calls_hook_only_when_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(MockBackend::new());
        backend.set_delay(Duration::from_millis(200)).await;
        let orchestrator = Arc::new(DownloadOrchestrator::new(
            &test_config(dir.path().to_path_buf()),
            Arc::new(SqliteDownloadStore::in_memory().unwrap()),
            Arc::new(MockSessionFactory::new()),
            backend,
            Arc::new(RecordingSink::new()),
        ));

        let accepted = Arc::new(RwLock::new(Vec::new()));
        let runner = {
            let orchestrator = Arc::clone(&orchestrator);
            let accepted = Arc::clone(&accepted);
            tokio::spawn(async move {
                orchestrator
                    .run_with(
                        vec!["https://www.tiktok.com/@amy/video/1".to_string()],
                        |run_id| async move { accepted.write().await.push(run_id) },
                    )
                    .await
            })
        };
        while !orchestrator.is_busy() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let hook_called = AtomicBool::new(false);
        let rejected = orchestrator
            .run_with(vec!["https://www.tiktok.com/@amy/video/2".to_string()], |_| {
                hook_called.store(true, Ordering::SeqCst);
                async {}
            })
            .await;
        assert!(matches!(rejected, Err(OrchestratorError::Busy)));
        assert!(!hook_called.load(Ordering::SeqCst));

        let result = runner.await.unwrap().unwrap();
        assert_eq!(*accepted.read().await, vec![result.run_id]);
    }

    #[tokio::test]
    async fn test_single_success_creates_owner_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(SqliteDownloadStore::in_memory().unwrap());
        let sink = Arc::new(RecordingSink::new());
        let orchestrator = DownloadOrchestrator::new(
            &test_config(dir.path().to_path_buf()),
            store.clone(),
            Arc::new(MockSessionFactory::new()),
            Arc::new(MockBackend::new()),
            sink.clone(),
        );

        let result = orchestrator
            .run(vec!["https://www.tiktok.com/@alice/video/111".to_string()])
            .await
            .unwrap();

        assert_eq!(result.success_count, 1);
        assert_eq!(result.failed_count, 0);
        assert!(dir.path().join("alice").is_dir());

        let record = store.get("111").unwrap().unwrap();
        assert_eq!(record.status, Outcome::Success);
        assert!(record.content_hash.is_some());
        assert!(record.file_path.contains("alice"));

        assert_eq!(orchestrator.last_result().await, Some(result));
        assert!(!orchestrator.is_busy());
    }

    #[tokio::test]
    async fn test_empty_batch_completes() {
        let dir = tempfile::tempdir().unwrap();
        let factory = Arc::new(MockSessionFactory::new());
        let sink = Arc::new(RecordingSink::new());
        let orchestrator = DownloadOrchestrator::new(
            &test_config(dir.path().to_path_buf()),
            Arc::new(SqliteDownloadStore::in_memory().unwrap()),
            factory.clone(),
            Arc::new(MockBackend::new()),
            sink.clone(),
        );

        let result = orchestrator.run(Vec::new()).await.unwrap();

        assert_eq!(result.success_count + result.failed_count, 0);
        assert_eq!(factory.closed_count().await, 1);
        assert_eq!(sink.count_of("run_complete").await, 1);
    }
}
