//! Telegram chat-bot front-end.
//!
//! A thin adapter over the shared orchestrator: commands turn into batches,
//! run events turn into chat messages.

mod bot;
mod sink;
mod transport;

pub use bot::{extract_link, parse_command, Command, Conversation, TelegramBot};
pub use sink::{render_event, NotifyRoute, TelegramSink};
pub use transport::{Chat, ChatMessage, ChatTransport, ChatUser, HttpTransport, Update};

use thiserror::Error;

/// Errors talking to the Bot API.
#[derive(Debug, Error)]
pub enum TelegramError {
    /// The request did not complete.
    #[error("Telegram request failed: {0}")]
    Http(String),

    /// The Bot API answered with `ok: false`.
    #[error("Telegram API error: {0}")]
    Api(String),
}
