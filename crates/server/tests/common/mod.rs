//! Common test utilities for E2E testing with mocks.
//!
//! This module provides a test fixture that creates an in-process server
//! with mock browser sessions, a mock acquisition backend and a mock
//! scraper, plus a mock chat transport for the Telegram front-end.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tokio::sync::RwLock;
use tower::ServiceExt;

use tokgrab_core::{
    testing::{MockBackend, MockScraper, MockSessionFactory, RecordingSink},
    AcquisitionBackend, BroadcastSink, Config, DownloadOrchestrator, DownloadStore, FanoutSink,
    NotificationSink, ProfileScraper, SessionFactory, SqliteDownloadStore,
};
use tokgrab_server::state::AppState;
use tokgrab_server::telegram::{
    Chat, ChatMessage, ChatTransport, ChatUser, NotifyRoute, TelegramError, TelegramSink, Update,
};

/// Re-export fixtures for test convenience
pub use tokgrab_core::testing::fixtures;

/// Test fixture for E2E testing with mock dependencies.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_run() {
///     let fixture = TestFixture::new();
///
///     let response = fixture.post("/api/v1/runs", json!({
///         "links": ["https://www.tiktok.com/@a/video/1"]
///     })).await;
///
///     assert_eq!(response.status, 202);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    pub state: Arc<AppState>,
    pub orchestrator: Arc<DownloadOrchestrator>,
    pub store: Arc<SqliteDownloadStore>,
    pub sessions: Arc<MockSessionFactory>,
    /// Mock backend - control acquisition outcomes
    pub backend: Arc<MockBackend>,
    /// Mock scraper - configure discovered links
    pub scraper: Arc<MockScraper>,
    pub sink: Arc<RecordingSink>,
    /// Mock chat transport wired into a TelegramSink
    pub transport: Arc<MockTransport>,
    pub route: NotifyRoute,
    pub events: BroadcastSink,
    /// Temporary directory for the database and downloads
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestFixture {
    /// Create a new test fixture with default mocks.
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    /// Create a test fixture, adjusting the fast test config first.
    pub fn with_config(adjust: impl FnOnce(&mut Config)) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let mut config: Config = fixtures::fast_config(&temp_dir.path().join("media"));
        config.database.path = temp_dir.path().join("test.db");
        adjust(&mut config);

        let store = Arc::new(
            SqliteDownloadStore::new(&config.database.path).expect("Failed to create store"),
        );
        let sessions = Arc::new(MockSessionFactory::new());
        let backend = Arc::new(MockBackend::new());
        let scraper = Arc::new(MockScraper::new());
        let sink = Arc::new(RecordingSink::new());
        let transport = Arc::new(MockTransport::new());
        let route = NotifyRoute::new();
        let events = BroadcastSink::new(64);

        let fanout = FanoutSink::new()
            .with(Arc::new(events.clone()))
            .with(Arc::clone(&sink) as Arc<dyn NotificationSink>)
            .with(Arc::new(TelegramSink::new(
                Arc::clone(&transport) as Arc<dyn ChatTransport>,
                route.clone(),
            )));

        let orchestrator = Arc::new(DownloadOrchestrator::new(
            &config,
            Arc::clone(&store) as Arc<dyn DownloadStore>,
            Arc::clone(&sessions) as Arc<dyn SessionFactory>,
            Arc::clone(&backend) as Arc<dyn AcquisitionBackend>,
            Arc::new(fanout),
        ));

        let state = Arc::new(AppState::new(
            config,
            Arc::clone(&orchestrator),
            Arc::clone(&store) as Arc<dyn DownloadStore>,
            Arc::clone(&scraper) as Arc<dyn ProfileScraper>,
            events.clone(),
        ));

        let router = tokgrab_server::api::create_router(Arc::clone(&state));

        Self {
            router,
            state,
            orchestrator,
            store,
            sessions,
            backend,
            scraper,
            sink,
            transport,
            route,
            events,
            temp_dir,
        }
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    /// Send a POST request without a body.
    pub async fn post_empty(&self, path: &str) -> TestResponse {
        self.request("POST", path, None).await
    }

    /// Send a GET request and return the raw text body.
    pub async fn get_text(&self, path: &str) -> (StatusCode, String) {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        (status, String::from_utf8_lossy(&bytes).to_string())
    }

    /// Wait until the orchestrator has finished a run.
    pub async fn wait_for_last_result(&self) -> tokgrab_core::RunResult {
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        loop {
            if let Some(result) = self.orchestrator.last_result().await {
                if !self.orchestrator.is_busy() {
                    return result;
                }
            }
            assert!(
                std::time::Instant::now() < deadline,
                "run did not finish in time"
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Send a request to the test server.
    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        let request = request_builder.body(body).unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }
}

/// Chat transport that records outgoing messages and serves queued updates.
#[derive(Debug, Default)]
pub struct MockTransport {
    sent: RwLock<Vec<(i64, String)>>,
    updates: RwLock<Vec<Update>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn push_update(&self, update: Update) {
        self.updates.write().await.push(update);
    }

    pub async fn sent(&self) -> Vec<(i64, String)> {
        self.sent.read().await.clone()
    }

    /// Messages sent to one chat, in order.
    pub async fn sent_to(&self, chat_id: i64) -> Vec<String> {
        self.sent
            .read()
            .await
            .iter()
            .filter(|(id, _)| *id == chat_id)
            .map(|(_, text)| text.clone())
            .collect()
    }

    /// Wait until a message to `chat_id` contains `needle`.
    pub async fn wait_for(&self, chat_id: i64, needle: &str) -> String {
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        loop {
            if let Some(text) = self
                .sent_to(chat_id)
                .await
                .into_iter()
                .find(|t| t.contains(needle))
            {
                return text;
            }
            assert!(
                std::time::Instant::now() < deadline,
                "no message containing {:?} sent to chat {}; sent: {:?}",
                needle,
                chat_id,
                self.sent_to(chat_id).await
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

#[async_trait]
impl ChatTransport for MockTransport {
    async fn get_updates(
        &self,
        offset: i64,
        _timeout_secs: u64,
    ) -> Result<Vec<Update>, TelegramError> {
        let pending: Vec<Update> = self
            .updates
            .read()
            .await
            .iter()
            .filter(|u| u.update_id >= offset)
            .cloned()
            .collect();
        if pending.is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        Ok(pending)
    }

    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), TelegramError> {
        self.sent.write().await.push((chat_id, text.to_string()));
        Ok(())
    }
}

/// A text message update from `chat_id`.
pub fn text_update(update_id: i64, chat_id: i64, username: &str, text: &str) -> Update {
    Update {
        update_id,
        message: Some(ChatMessage {
            message_id: update_id,
            chat: Chat { id: chat_id },
            from: Some(ChatUser {
                id: chat_id,
                username: Some(username.to_string()),
            }),
            text: Some(text.to_string()),
        }),
    }
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}
