//! Orchestrator lifecycle integration tests.
//!
//! These tests drive whole batches through the orchestrator with mock
//! sessions and a mock backend:
//! submitted -> (skipped | dispatched) -> acquire with retry -> success | failed

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use tokgrab_core::{
    testing::{fixtures, MockBackend, MockBehavior, MockSessionFactory, RecordingSink},
    Config, DownloadOrchestrator, DownloadStore, OrchestratorError, Outcome, RunStats,
    SqliteDownloadStore,
};

/// Test helper holding the orchestrator's collaborators.
struct TestHarness {
    store: Arc<SqliteDownloadStore>,
    sessions: Arc<MockSessionFactory>,
    backend: Arc<MockBackend>,
    sink: Arc<RecordingSink>,
    config: Config,
    temp_dir: TempDir,
}

impl TestHarness {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let store = Arc::new(
            SqliteDownloadStore::new(&temp_dir.path().join("downloads.db"))
                .expect("Failed to create store"),
        );
        let config = fixtures::fast_config(&temp_dir.path().join("media"));

        Self {
            store,
            sessions: Arc::new(MockSessionFactory::new()),
            backend: Arc::new(MockBackend::new()),
            sink: Arc::new(RecordingSink::new()),
            config,
            temp_dir,
        }
    }

    fn create_orchestrator(&self) -> DownloadOrchestrator {
        DownloadOrchestrator::new(
            &self.config,
            Arc::clone(&self.store) as Arc<dyn DownloadStore>,
            Arc::clone(&self.sessions) as Arc<dyn tokgrab_core::SessionFactory>,
            Arc::clone(&self.backend) as Arc<dyn tokgrab_core::AcquisitionBackend>,
            Arc::clone(&self.sink) as Arc<dyn tokgrab_core::NotificationSink>,
        )
    }
}

#[tokio::test]
async fn test_second_run_skips_everything() {
    let harness = TestHarness::new();
    let orchestrator = harness.create_orchestrator();
    let batch = vec![
        fixtures::video_link("alice", "101"),
        fixtures::photo_link("alice", "102"),
    ];

    let first = orchestrator.run(batch.clone()).await.unwrap();
    assert_eq!(first.success_count, 2);
    assert_eq!(first.skipped_count, 0);
    let calls_after_first = harness.backend.call_count().await;
    assert_eq!(calls_after_first, 2);

    let second = orchestrator.run(batch).await.unwrap();
    assert_eq!(second.success_count, 2);
    assert_eq!(second.skipped_count, 2);
    assert_eq!(second.failed_count, 0);
    assert_eq!(harness.backend.call_count().await, calls_after_first);

    let skipped: Vec<Outcome> = harness
        .sink
        .item_results()
        .await
        .into_iter()
        .skip(2)
        .map(|(outcome, _)| outcome)
        .collect();
    assert_eq!(skipped, vec![Outcome::Skipped, Outcome::Skipped]);
}

#[tokio::test]
async fn test_stats_match_run_counters_from_empty_store() {
    let harness = TestHarness::new();
    harness
        .backend
        .set_behavior("203", MockBehavior::NoNewFile)
        .await;
    let orchestrator = harness.create_orchestrator();

    let result = orchestrator
        .run(vec![
            fixtures::video_link("bob", "201"),
            fixtures::video_link("bob", "202"),
            fixtures::photo_link("bob", "203"),
        ])
        .await
        .unwrap();

    let stats = harness.store.stats().unwrap();
    assert_eq!(
        stats,
        RunStats {
            success_count: result.success_count as u64,
            failed_count: result.failed_count as u64,
        }
    );
    assert_eq!(stats.success_count, 2);
    assert_eq!(stats.failed_count, 1);
}

#[tokio::test]
async fn test_photo_without_new_file_fails_after_two_attempts() {
    let harness = TestHarness::new();
    harness
        .backend
        .set_default_behavior(MockBehavior::NoNewFile)
        .await;
    let orchestrator = harness.create_orchestrator();
    let link = fixtures::photo_link("carol", "301");

    let result = orchestrator.run(vec![link.clone()]).await.unwrap();

    assert_eq!(result.failed_count, 1);
    assert_eq!(result.success_count, 0);
    assert_eq!(result.failed_links, vec![link.clone()]);
    assert_eq!(harness.backend.calls_for("301").await, 2);

    let record = harness.store.get("301").unwrap().unwrap();
    assert_eq!(record.status, Outcome::Failed);
    assert_eq!(record.url, link);
    assert!(!harness.store.is_already_succeeded("301").unwrap());
}

#[tokio::test]
async fn test_transient_failure_recovers_on_retry() {
    let harness = TestHarness::new();
    harness
        .backend
        .set_behavior("401", MockBehavior::FailTimes(1))
        .await;
    let orchestrator = harness.create_orchestrator();

    let result = orchestrator
        .run(vec![fixtures::video_link("dave", "401")])
        .await
        .unwrap();

    assert_eq!(result.success_count, 1);
    assert!(result.failed_links.is_empty());
    assert_eq!(harness.backend.calls_for("401").await, 2);
    assert!(harness.store.is_already_succeeded("401").unwrap());
}

#[tokio::test]
async fn test_persistent_failure_is_retried_exactly_once() {
    let harness = TestHarness::new();
    harness.backend.set_behavior("402", MockBehavior::Fail).await;
    let orchestrator = harness.create_orchestrator();

    let result = orchestrator
        .run(vec![
            fixtures::video_link("dave", "402"),
            fixtures::video_link("dave", "403"),
        ])
        .await
        .unwrap();

    assert_eq!(harness.backend.calls_for("402").await, 2);
    assert_eq!(harness.backend.calls_for("403").await, 1);
    assert_eq!(result.failed_count, 1);
    assert_eq!(result.success_count, 1);
}

#[tokio::test]
async fn test_cancel_stops_dispatch_but_records_in_flight() {
    let mut harness = TestHarness::new();
    harness.config.downloads.delay_between_downloads = 1;
    harness.backend.set_delay(Duration::from_millis(100)).await;
    let orchestrator = Arc::new(harness.create_orchestrator());

    let batch: Vec<String> = (1..=5)
        .map(|i| fixtures::video_link("erin", &format!("50{}", i)))
        .collect();

    let runner = {
        let orchestrator = Arc::clone(&orchestrator);
        tokio::spawn(async move { orchestrator.run(batch).await })
    };

    tokio::time::sleep(Duration::from_millis(300)).await;
    orchestrator.cancel();
    assert!(orchestrator.status().await.cancel_requested);

    let result = runner.await.unwrap().unwrap();

    assert!(result.cancelled);
    assert_eq!(harness.backend.call_count().await, 1);
    assert_eq!(result.success_count, 1);
    assert!(harness.store.is_already_succeeded("501").unwrap());
    assert!(harness.store.get("502").unwrap().is_none());
    assert_eq!(harness.sessions.closed_count().await, 1);
    assert_eq!(harness.sink.count_of("run_complete").await, 1);
}

#[tokio::test]
async fn test_cancel_ends_dispatch_pause_early() {
    let mut harness = TestHarness::new();
    harness.config.downloads.delay_between_downloads = 30;
    let orchestrator = Arc::new(harness.create_orchestrator());

    let batch: Vec<String> = (1..=3)
        .map(|i| fixtures::video_link("erin", &format!("55{}", i)))
        .collect();
    let runner = {
        let orchestrator = Arc::clone(&orchestrator);
        tokio::spawn(async move { orchestrator.run(batch).await })
    };

    tokio::time::sleep(Duration::from_millis(100)).await;
    orchestrator.cancel();

    let result = tokio::time::timeout(Duration::from_secs(5), runner)
        .await
        .expect("run kept sleeping after cancel")
        .unwrap()
        .unwrap();

    assert!(result.cancelled);
    assert_eq!(harness.backend.call_count().await, 1);
    assert_eq!(result.success_count, 1);
}

#[tokio::test]
async fn test_duplicate_link_in_one_batch_is_attempted_twice() {
    let harness = TestHarness::new();
    harness.backend.set_delay(Duration::from_millis(50)).await;
    let orchestrator = harness.create_orchestrator();
    let link = fixtures::video_link("frank", "601");

    let result = orchestrator
        .run(vec![link.clone(), link.clone()])
        .await
        .unwrap();

    // Both copies are dispatched before either is recorded
    assert_eq!(harness.backend.calls_for("601").await, 2);
    assert_eq!(result.success_count, 2);
    assert_eq!(result.skipped_count, 0);
    assert_eq!(harness.store.stats().unwrap().success_count, 1);
}

#[tokio::test]
async fn test_concurrent_run_is_rejected() {
    let harness = TestHarness::new();
    harness.backend.set_delay(Duration::from_millis(300)).await;
    let orchestrator = Arc::new(harness.create_orchestrator());

    let runner = {
        let orchestrator = Arc::clone(&orchestrator);
        tokio::spawn(async move {
            orchestrator
                .run(vec![fixtures::video_link("gina", "701")])
                .await
        })
    };

    let start = std::time::Instant::now();
    while !orchestrator.is_busy() && start.elapsed() < Duration::from_secs(2) {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(orchestrator.is_busy());

    let second = orchestrator
        .run(vec![fixtures::video_link("gina", "702")])
        .await;
    assert!(matches!(second, Err(OrchestratorError::Busy)));

    runner.await.unwrap().unwrap();
    assert!(!orchestrator.is_busy());
    assert_eq!(harness.backend.calls_for("702").await, 0);
}

#[tokio::test]
async fn test_session_startup_failure_aborts_and_releases() {
    let mut harness = TestHarness::new();
    harness.config.downloads.max_workers = 2;
    harness.sessions.fail_on_slot(1).await;
    let orchestrator = harness.create_orchestrator();

    let result = orchestrator
        .run(vec![fixtures::video_link("hank", "801")])
        .await;

    assert!(matches!(result, Err(OrchestratorError::SessionStartup(_))));
    assert_eq!(harness.sessions.closed_slots().await, vec![0]);
    assert_eq!(harness.backend.call_count().await, 0);
    assert_eq!(harness.sink.count_of("run_aborted").await, 1);
    assert_eq!(harness.sink.count_of("run_complete").await, 1);

    let summary = harness.sink.completed().await.unwrap();
    assert_eq!(summary.success_count + summary.failed_count, 0);
    assert!(!orchestrator.is_busy());
}

#[tokio::test]
async fn test_slots_are_round_robin_and_exclusive() {
    let mut harness = TestHarness::new();
    harness.config.downloads.max_workers = 2;
    harness.backend.set_delay(Duration::from_millis(30)).await;
    let orchestrator = harness.create_orchestrator();

    let batch: Vec<String> = (0..6)
        .map(|i| fixtures::video_link("ivy", &format!("90{}", i)))
        .collect();
    let result = orchestrator.run(batch).await.unwrap();

    assert_eq!(result.success_count, 6);
    assert_eq!(harness.backend.max_in_flight_per_slot().await, 1);

    let calls = harness.backend.recorded_calls().await;
    for call in &calls {
        let index: usize = call.video_id[2..].parse().unwrap();
        assert_eq!(call.slot, index % 2);
    }
    assert_eq!(harness.sessions.closed_count().await, 2);
}

#[tokio::test]
async fn test_slot_is_held_through_retry_backoff() {
    let mut harness = TestHarness::new();
    harness.config.downloads.max_workers = 1;
    harness.config.retry.min_wait_secs = 0.2;
    harness.config.retry.max_wait_secs = 0.2;
    harness
        .backend
        .set_behavior("1", MockBehavior::FailTimes(1))
        .await;
    let orchestrator = harness.create_orchestrator();

    let result = orchestrator
        .run(vec![
            fixtures::video_link("ivy", "1"),
            fixtures::video_link("ivy", "2"),
        ])
        .await
        .unwrap();

    assert_eq!(result.success_count, 2);
    let order: Vec<String> = harness
        .backend
        .recorded_calls()
        .await
        .into_iter()
        .map(|call| call.video_id)
        .collect();
    assert_eq!(order, vec!["1", "1", "2"]);
}

#[tokio::test]
async fn test_progress_and_summary_events() {
    let harness = TestHarness::new();
    harness
        .backend
        .set_behavior("1002", MockBehavior::NoNewFile)
        .await;
    let orchestrator = harness.create_orchestrator();
    let failing = fixtures::photo_link("jack", "1002");

    let result = orchestrator
        .run(vec![
            fixtures::video_link("jack", "1001"),
            failing.clone(),
            fixtures::video_link("jack", "1003"),
        ])
        .await
        .unwrap();

    assert_eq!(harness.sink.progress().await, vec![(1, 3), (2, 3), (3, 3)]);
    assert_eq!(harness.sink.count_of("run_started").await, 1);
    assert_eq!(harness.sink.count_of("item_result").await, 3);
    assert_eq!(harness.sink.completed().await, Some(result.clone()));
    assert_eq!(result.failed_links, vec![failing]);
}

#[tokio::test]
async fn test_link_without_owner_lands_in_user_directory() {
    let harness = TestHarness::new();
    let orchestrator = harness.create_orchestrator();

    let result = orchestrator
        .run(vec!["https://www.tiktok.com/video/1101?lang=en".to_string()])
        .await
        .unwrap();

    assert_eq!(result.success_count, 1);
    assert!(harness.temp_dir.path().join("media").join("user").is_dir());
    let record = harness.store.get("1101").unwrap().unwrap();
    assert_eq!(record.username, "user");
    assert_eq!(record.url, "https://www.tiktok.com/video/1101");
}
