//! Run events delivered to a Telegram chat.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use tokgrab_core::{NotificationSink, Outcome, RunEvent};

use super::transport::ChatTransport;
use crate::metrics::TELEGRAM_SEND_FAILURES;

/// The chat that receives run notifications.
///
/// Set by the bot to the chat that submitted the latest batch.
#[derive(Debug, Clone, Default)]
pub struct NotifyRoute(Arc<RwLock<Option<i64>>>);

impl NotifyRoute {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set(&self, chat_id: i64) {
        *self.0.write().await = Some(chat_id);
    }

    pub async fn get(&self) -> Option<i64> {
        *self.0.read().await
    }
}

/// Chat text for an event, or `None` if the event is not worth a message.
pub fn render_event(event: &RunEvent) -> Option<String> {
    match event {
        RunEvent::RunStarted { .. } | RunEvent::Progress { .. } => None,
        RunEvent::ItemResult {
            kind,
            owner,
            outcome,
            link,
            ..
        } => match outcome {
            Outcome::Success => Some(format!("✅ Downloaded {} from @{}", kind.as_str(), owner)),
            Outcome::Skipped => Some(format!("⏭ Already downloaded: {}", link)),
            Outcome::Failed => Some(format!("❌ Failed: {}", link)),
            Outcome::Pending => None,
        },
        RunEvent::RunAborted { reason, .. } => {
            Some(format!("⚠️ Download could not start: {}", reason))
        }
        RunEvent::RunComplete { result } => {
            let mut text = format!(
                "📊 Run finished{}\n✅ Success: {} (already had {})\n❌ Failed: {}",
                if result.cancelled { " (cancelled)" } else { "" },
                result.success_count,
                result.skipped_count,
                result.failed_count,
            );
            if !result.failed_links.is_empty() {
                text.push_str("\n\nFailed links:");
                for link in &result.failed_links {
                    text.push('\n');
                    text.push_str(link);
                }
            }
            Some(text)
        }
    }
}

/// Sends rendered run events to the routed chat.
pub struct TelegramSink {
    transport: Arc<dyn ChatTransport>,
    route: NotifyRoute,
}

impl TelegramSink {
    pub fn new(transport: Arc<dyn ChatTransport>, route: NotifyRoute) -> Self {
        Self { transport, route }
    }
}

#[async_trait]
impl NotificationSink for TelegramSink {
    async fn notify(&self, event: &RunEvent) {
        let Some(chat_id) = self.route.get().await else {
            debug!(event = event.name(), "No chat routed, dropping notification");
            return;
        };
        let Some(text) = render_event(event) else {
            return;
        };

        if let Err(e) = self.transport.send_message(chat_id, &text).await {
            TELEGRAM_SEND_FAILURES.inc();
            warn!(chat_id, event = event.name(), "Failed to deliver notification: {}", e);
        }
    }
}
