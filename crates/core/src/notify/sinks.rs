//! Notification sink trait and built-in sinks.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::link::Outcome;

use super::events::RunEvent;

/// Receives run events. Delivery is best-effort; a sink must not fail the run.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, event: &RunEvent);
}

/// Drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

#[async_trait]
impl NotificationSink for NullSink {
    async fn notify(&self, _event: &RunEvent) {}
}

/// Writes events to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

#[async_trait]
impl NotificationSink for TracingSink {
    async fn notify(&self, event: &RunEvent) {
        match event {
            RunEvent::RunStarted { run_id, total } => {
                info!(run_id = %run_id, total, "Download run started");
            }
            RunEvent::Progress {
                run_id,
                current,
                total,
            } => {
                debug!(run_id = %run_id, current, total, "Progress");
            }
            RunEvent::ItemResult {
                kind,
                owner,
                outcome,
                link,
                ..
            } => match outcome {
                Outcome::Failed => {
                    warn!(kind = kind.as_str(), owner = %owner, link = %link, "Item failed")
                }
                _ => info!(
                    kind = kind.as_str(),
                    owner = %owner,
                    outcome = %outcome,
                    link = %link,
                    "Item finished"
                ),
            },
            RunEvent::RunAborted { run_id, reason } => {
                warn!(run_id = %run_id, reason = %reason, "Download run aborted");
            }
            RunEvent::RunComplete { result } => {
                info!(
                    run_id = %result.run_id,
                    success = result.success_count,
                    failed = result.failed_count,
                    skipped = result.skipped_count,
                    cancelled = result.cancelled,
                    "Download run complete"
                );
            }
        }
    }
}

/// Republishes events on a broadcast channel.
#[derive(Debug, Clone)]
pub struct BroadcastSink {
    sender: broadcast::Sender<RunEvent>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RunEvent> {
        self.sender.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[async_trait]
impl NotificationSink for BroadcastSink {
    async fn notify(&self, event: &RunEvent) {
        // No receivers is not an error
        let _ = self.sender.send(event.clone());
    }
}

/// Forwards every event to each inner sink in order.
#[derive(Clone, Default)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn NotificationSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

#[async_trait]
impl NotificationSink for FanoutSink {
    async fn notify(&self, event: &RunEvent) {
        for sink in &self.sinks {
            sink.notify(event).await;
        }
    }
}
