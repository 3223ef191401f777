//! Command handling and the long-poll loop.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex_lite::Regex;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use tokgrab_core::scraper::normalize_username;
use tokgrab_core::{DownloadOrchestrator, DownloadStore, OrchestratorError, ProfileScraper};

use super::sink::NotifyRoute;
use super::transport::{ChatMessage, ChatTransport, Update};
use crate::metrics::{TELEGRAM_SEND_FAILURES, TELEGRAM_UPDATES};

/// Pause after a failed poll before trying again.
const POLL_ERROR_BACKOFF: Duration = Duration::from_secs(5);

const WELCOME_TEXT: &str = "🎬 Welcome to the TikTok downloader bot!

Commands:
/download - Download one video or photo post
/scrape - Download everything on a profile
/stats - Show download statistics
/help - Show help";

const HELP_TEXT: &str = "💡 Help:

1️⃣ /download - Start a single download
2️⃣ /scrape - Download a whole profile
3️⃣ /stats - Show statistics
4️⃣ /help - Show this message

⚠️ Send links in this form:
- https://www.tiktok.com/@username/video/123456789";

const INVALID_TEXT: &str = "❌ Unknown command. Send /help for help.";
const BUSY_TEXT: &str = "⏳ A download is already running, try again when it finishes.";
const ASK_LINK_TEXT: &str = "🔗 Send the TikTok link:";
const ASK_USERNAME_TEXT: &str = "👤 Send the username (without @):";

static TIKTOK_LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)https?://(?:[a-z0-9-]+\.)?tiktok\.com/\S+").unwrap());

/// What the bot is waiting for in a chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conversation {
    AwaitingLink,
    AwaitingUsername,
}

/// A parsed slash command. Commands may carry their argument inline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Download(Option<String>),
    Scrape(Option<String>),
    Stats,
    Help,
    Unknown(String),
}

/// Parse `text` as a command, `None` if it is not one.
///
/// Accepts the `/command@botname` form used in group chats.
pub fn parse_command(text: &str) -> Option<Command> {
    let text = text.trim();
    let rest = text.strip_prefix('/')?;

    let (head, arg) = match rest.split_once(char::is_whitespace) {
        Some((head, arg)) => (head, Some(arg.trim().to_string()).filter(|a| !a.is_empty())),
        None => (rest, None),
    };
    let name = head.split('@').next().unwrap_or(head).to_lowercase();

    Some(match name.as_str() {
        "start" => Command::Start,
        "download" => Command::Download(arg),
        "scrape" => Command::Scrape(arg),
        "stats" => Command::Stats,
        "help" => Command::Help,
        _ => Command::Unknown(name),
    })
}

/// The first TikTok link in `text`.
pub fn extract_link(text: &str) -> Option<String> {
    TIKTOK_LINK.find(text).map(|m| m.as_str().to_string())
}

/// Collaborators shared with background tasks.
#[derive(Clone)]
struct BotContext {
    transport: Arc<dyn ChatTransport>,
    orchestrator: Arc<DownloadOrchestrator>,
    store: Arc<dyn DownloadStore>,
    scraper: Arc<dyn ProfileScraper>,
    route: NotifyRoute,
}

impl BotContext {
    async fn reply(&self, chat_id: i64, text: &str) {
        if let Err(e) = self.transport.send_message(chat_id, text).await {
            TELEGRAM_SEND_FAILURES.inc();
            warn!(chat_id, "Failed to send reply: {}", e);
        }
    }

    /// Run a batch for `chat_id` and credit the user with new downloads.
    ///
    /// Item and summary messages arrive through the notification sink. The
    /// route moves to `chat_id` only once the run is admitted, so a rejected
    /// chat never takes over another run's messages.
    async fn run_batch(&self, chat_id: i64, links: Vec<String>) {
        let route = self.route.clone();
        let accepted = self
            .orchestrator
            .run_with(links, |_| async move { route.set(chat_id).await })
            .await;

        match accepted {
            Ok(result) => {
                let fresh = result.success_count.saturating_sub(result.skipped_count) as u64;
                if fresh > 0 {
                    if let Err(e) = self.store.increment_user_downloads(chat_id, fresh) {
                        error!(chat_id, "Failed to update user download count: {}", e);
                    }
                }
            }
            Err(OrchestratorError::Busy) => self.reply(chat_id, BUSY_TEXT).await,
            Err(e) => debug!(chat_id, "Run for chat did not start: {}", e),
        }
    }
}

/// Telegram front-end over the shared orchestrator.
pub struct TelegramBot {
    ctx: BotContext,
    conversations: Mutex<HashMap<i64, Conversation>>,
    poll_timeout_secs: u64,
}

impl TelegramBot {
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        orchestrator: Arc<DownloadOrchestrator>,
        store: Arc<dyn DownloadStore>,
        scraper: Arc<dyn ProfileScraper>,
        route: NotifyRoute,
        poll_timeout_secs: u64,
    ) -> Self {
        Self {
            ctx: BotContext {
                transport,
                orchestrator,
                store,
                scraper,
                route,
            },
            conversations: Mutex::new(HashMap::new()),
            poll_timeout_secs,
        }
    }

    /// Poll for updates until the task is aborted.
    pub async fn run(&self) {
        info!("Telegram bot started");
        let mut offset = 0;

        loop {
            match self
                .ctx
                .transport
                .get_updates(offset, self.poll_timeout_secs)
                .await
            {
                Ok(updates) => {
                    for update in updates {
                        offset = offset.max(update.update_id + 1);
                        self.handle_update(update).await;
                    }
                }
                Err(e) => {
                    warn!("Telegram poll failed: {}", e);
                    tokio::time::sleep(POLL_ERROR_BACKOFF).await;
                }
            }
        }
    }

    /// Current conversation state for a chat.
    pub async fn conversation(&self, chat_id: i64) -> Option<Conversation> {
        self.conversations.lock().await.get(&chat_id).copied()
    }

    pub async fn handle_update(&self, update: Update) {
        match update.message {
            Some(message) if message.text.is_some() => self.handle_message(&message).await,
            _ => {
                TELEGRAM_UPDATES.with_label_values(&["ignored"]).inc();
            }
        }
    }

    async fn handle_message(&self, message: &ChatMessage) {
        let chat_id = message.chat.id;
        let text = message.text.as_deref().unwrap_or_default().trim();

        if let Some(command) = parse_command(text) {
            TELEGRAM_UPDATES.with_label_values(&["command"]).inc();
            // A new command abandons any pending prompt
            self.conversations.lock().await.remove(&chat_id);
            self.handle_command(message, command).await;
            return;
        }

        let pending = self.conversations.lock().await.remove(&chat_id);
        match pending {
            Some(Conversation::AwaitingLink) => {
                TELEGRAM_UPDATES.with_label_values(&["reply"]).inc();
                self.submit_link(chat_id, text).await;
            }
            Some(Conversation::AwaitingUsername) => {
                TELEGRAM_UPDATES.with_label_values(&["reply"]).inc();
                self.submit_scrape(chat_id, text).await;
            }
            None if extract_link(text).is_some() => {
                TELEGRAM_UPDATES.with_label_values(&["link"]).inc();
                self.submit_link(chat_id, text).await;
            }
            None => {
                TELEGRAM_UPDATES.with_label_values(&["other"]).inc();
                self.ctx.reply(chat_id, INVALID_TEXT).await;
            }
        }
    }

    async fn handle_command(&self, message: &ChatMessage, command: Command) {
        let chat_id = message.chat.id;
        debug!(chat_id, ?command, "Handling command");

        match command {
            Command::Start => {
                let username = message
                    .from
                    .as_ref()
                    .and_then(|u| u.username.clone())
                    .unwrap_or_else(|| "Unknown".to_string());
                match self.ctx.store.add_user(chat_id, &username) {
                    Ok(()) => info!(chat_id, username = %username, "Telegram user registered"),
                    Err(e) => error!(chat_id, "Failed to register Telegram user: {}", e),
                }
                self.ctx.reply(chat_id, WELCOME_TEXT).await;
            }
            Command::Download(Some(arg)) => self.submit_link(chat_id, &arg).await,
            Command::Download(None) => {
                self.conversations
                    .lock()
                    .await
                    .insert(chat_id, Conversation::AwaitingLink);
                self.ctx.reply(chat_id, ASK_LINK_TEXT).await;
            }
            Command::Scrape(Some(arg)) => self.submit_scrape(chat_id, &arg).await,
            Command::Scrape(None) => {
                self.conversations
                    .lock()
                    .await
                    .insert(chat_id, Conversation::AwaitingUsername);
                self.ctx.reply(chat_id, ASK_USERNAME_TEXT).await;
            }
            Command::Stats => {
                let text = match self.ctx.store.stats() {
                    Ok(stats) => format!(
                        "📊 Statistics:\n✅ Success: {}\n❌ Failed: {}\n📈 Total: {}",
                        stats.success_count,
                        stats.failed_count,
                        stats.total()
                    ),
                    Err(e) => {
                        error!("Failed to read stats: {}", e);
                        "❌ Statistics are unavailable right now.".to_string()
                    }
                };
                self.ctx.reply(chat_id, &text).await;
            }
            Command::Help => self.ctx.reply(chat_id, HELP_TEXT).await,
            Command::Unknown(name) => {
                debug!(chat_id, command = %name, "Unknown command");
                self.ctx.reply(chat_id, INVALID_TEXT).await;
            }
        }
    }

    async fn submit_link(&self, chat_id: i64, text: &str) {
        let Some(link) = extract_link(text) else {
            self.ctx
                .reply(chat_id, "❌ Send a valid TikTok link!")
                .await;
            return;
        };

        if self.ctx.orchestrator.is_busy() {
            self.ctx.reply(chat_id, BUSY_TEXT).await;
            return;
        }

        info!(chat_id, link = %link, "Link submitted from Telegram");
        self.ctx
            .reply(chat_id, "✅ Link received! Starting the download...")
            .await;

        let ctx = self.ctx.clone();
        tokio::spawn(async move { ctx.run_batch(chat_id, vec![link]).await });
    }

    async fn submit_scrape(&self, chat_id: i64, text: &str) {
        let handle = match normalize_username(text) {
            Ok(handle) => handle,
            Err(e) => {
                debug!(chat_id, "Rejected username: {}", e);
                self.ctx
                    .reply(chat_id, "❌ That does not look like a username.")
                    .await;
                return;
            }
        };

        self.ctx
            .reply(chat_id, &format!("🔍 Collecting links from {}...", handle))
            .await;

        let ctx = self.ctx.clone();
        tokio::spawn(async move {
            match ctx.scraper.scrape(&handle).await {
                Ok(links) if links.is_empty() => {
                    ctx.reply(chat_id, "❌ No videos found.").await;
                }
                Ok(links) => {
                    if ctx.orchestrator.is_busy() {
                        ctx.reply(chat_id, BUSY_TEXT).await;
                        return;
                    }
                    ctx.reply(
                        chat_id,
                        &format!("✅ Found {} videos, downloading...", links.len()),
                    )
                    .await;
                    ctx.run_batch(chat_id, links).await;
                }
                Err(e) => {
                    warn!(chat_id, handle = %handle, "Scrape failed: {}", e);
                    ctx.reply(chat_id, &format!("❌ Scrape failed: {}", e)).await;
                }
            }
        });
    }
}
