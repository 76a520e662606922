//! Telegram bot integration
//!
//! Architecture:
//! - `client`: Bot API over HTTPS behind the [`TelegramApi`] trait
//! - `types`: the subset of Bot API objects the bot reads and writes
//! - `format` / `keyboards`: message templates and inline buttons
//! - `commands`: command and callback parsing
//! - `handler`: reacts to updates (commands, accept/decline buttons)
//! - `poller`: long-polling loop feeding the handler
//! - `outbox`: delivers stored notifications to linked chats
//! - `broadcaster`: public channel posts through a bounded queue
//! - `diagnostics`: bot and channel connection test
//! - `relay`: the standalone relay bot
//!
//! Webhook delivery lives in the HTTP API and reuses the same handler.

pub mod broadcaster;
pub mod client;
pub mod commands;
pub mod diagnostics;
pub mod format;
pub mod handler;
pub mod keyboards;
pub mod outbox;
pub mod poller;
pub mod relay;
pub mod types;

pub use broadcaster::{
    BroadcastQueue, ChannelBroadcaster, ChannelPost, NoopBroadcaster, TelegramBroadcaster,
};
pub use client::{ALLOWED_UPDATES, BotApi, TelegramApi};
pub use diagnostics::{ConnectionReport, test_connection};
pub use handler::{BotHandler, UpdateHandler};
pub use outbox::{NotificationOutbox, OutboxStats};
pub use poller::Poller;
pub use relay::RelayHandler;
pub use types::{ChatId, Update};
