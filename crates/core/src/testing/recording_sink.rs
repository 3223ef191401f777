//! Notification sink that records every event.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::link::Outcome;
use crate::notify::{NotificationSink, RunEvent};
use crate::orchestrator::RunResult;

/// Records events for test assertions.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    events: Arc<RwLock<Vec<RunEvent>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<RunEvent> {
        self.events.read().await.clone()
    }

    /// Number of events with the given serialized name.
    pub async fn count_of(&self, name: &str) -> usize {
        self.events
            .read()
            .await
            .iter()
            .filter(|e| e.name() == name)
            .count()
    }

    /// `(outcome, link)` of every item result, in emission order.
    pub async fn item_results(&self) -> Vec<(Outcome, String)> {
        self.events
            .read()
            .await
            .iter()
            .filter_map(|e| match e {
                RunEvent::ItemResult { outcome, link, .. } => Some((*outcome, link.clone())),
                _ => None,
            })
            .collect()
    }

    /// `(current, total)` of every progress event.
    pub async fn progress(&self) -> Vec<(usize, usize)> {
        self.events
            .read()
            .await
            .iter()
            .filter_map(|e| match e {
                RunEvent::Progress { current, total, .. } => Some((*current, *total)),
                _ => None,
            })
            .collect()
    }

    /// The last `RunComplete` summary, if any.
    pub async fn completed(&self) -> Option<RunResult> {
        self.events
            .read()
            .await
            .iter()
            .rev()
            .find_map(|e| match e {
                RunEvent::RunComplete { result } => Some(result.clone()),
                _ => None,
            })
    }

    pub async fn clear(&self) {
        self.events.write().await.clear();
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn notify(&self, event: &RunEvent) {
        self.events.write().await.push(event.clone());
    }
}
