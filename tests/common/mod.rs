//! Shared fixtures for integration tests
//!
//! Each test gets its own SQLite file in a temp directory and a recording
//! Telegram fake, so nothing touches the network.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use tempfile::TempDir;

use bantah::config::StaticConfig;
use bantah::errors::{BantahError, Result};
use bantah::services::AppServices;
use bantah::storage::{SeaOrmStorage, User};
use bantah::telegram::types::{BotCommand, Chat, ChatId, InlineKeyboardMarkup, Message, TgUser};
use bantah::telegram::{ChannelBroadcaster, ChannelPost, TelegramApi, Update, UpdateHandler};

// =============================================================================
// Telegram fake
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct SentMessage {
    pub chat_id: ChatId,
    pub text: String,
    pub keyboard: Option<InlineKeyboardMarkup>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CallbackAnswer {
    pub id: String,
    pub text: Option<String>,
    pub show_alert: bool,
}

/// Records every outgoing call; `fail_sends` makes `send_message` error
#[derive(Default)]
pub struct FakeTelegramApi {
    pub sent: Mutex<Vec<SentMessage>>,
    pub answers: Mutex<Vec<CallbackAnswer>>,
    pub edits: Mutex<Vec<(i64, i64, String)>>,
    pub webhooks: Mutex<Vec<String>>,
    pub fail_sends: bool,
}

impl FakeTelegramApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail_sends: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn answers(&self) -> Vec<CallbackAnswer> {
        self.answers.lock().unwrap().clone()
    }

    pub fn last_text(&self) -> String {
        self.sent()
            .last()
            .map(|m| m.text.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl TelegramApi for FakeTelegramApi {
    async fn get_me(&self) -> Result<TgUser> {
        Ok(TgUser {
            id: 42,
            is_bot: true,
            first_name: "Bantah".to_string(),
            last_name: None,
            username: Some("bantah_bot".to_string()),
        })
    }

    async fn get_chat(&self, chat_id: &ChatId) -> Result<Chat> {
        Ok(Chat {
            id: match chat_id {
                ChatId::Id(id) => *id,
                ChatId::Username(_) => -100,
            },
            kind: "channel".to_string(),
            title: Some("Bantah".to_string()),
            username: None,
            first_name: None,
        })
    }

    async fn send_message(
        &self,
        chat_id: &ChatId,
        text: &str,
        keyboard: Option<InlineKeyboardMarkup>,
    ) -> Result<Message> {
        if self.fail_sends {
            return Err(BantahError::telegram("Forbidden: bot was blocked by the user"));
        }
        let mut sent = self.sent.lock().unwrap();
        sent.push(SentMessage {
            chat_id: chat_id.clone(),
            text: text.to_string(),
            keyboard,
        });
        let id = match chat_id {
            ChatId::Id(id) => *id,
            ChatId::Username(_) => -100,
        };
        Ok(Message {
            message_id: sent.len() as i64,
            from: None,
            chat: Chat {
                id,
                kind: "private".to_string(),
                title: None,
                username: None,
                first_name: None,
            },
            date: 0,
            text: Some(text.to_string()),
        })
    }

    async fn edit_message_text(&self, chat_id: i64, message_id: i64, text: &str) -> Result<()> {
        self.edits
            .lock()
            .unwrap()
            .push((chat_id, message_id, text.to_string()));
        Ok(())
    }

    async fn answer_callback_query(
        &self,
        callback_query_id: &str,
        text: Option<&str>,
        show_alert: bool,
    ) -> Result<()> {
        self.answers.lock().unwrap().push(CallbackAnswer {
            id: callback_query_id.to_string(),
            text: text.map(str::to_string),
            show_alert,
        });
        Ok(())
    }

    async fn get_updates(&self, _offset: i64, _timeout_secs: u64) -> Result<Vec<Update>> {
        Ok(Vec::new())
    }

    async fn set_webhook(&self, url: &str, _secret_token: Option<&str>) -> Result<()> {
        self.webhooks.lock().unwrap().push(url.to_string());
        Ok(())
    }

    async fn delete_webhook(&self) -> Result<()> {
        Ok(())
    }

    async fn set_my_commands(&self, _commands: &[BotCommand]) -> Result<()> {
        Ok(())
    }
}

/// One scripted answer to `get_updates`
#[derive(Debug, Clone)]
pub enum PollStep {
    Batch(Vec<Update>),
    Fail,
}

/// Answers `get_updates` from a script and records every offset asked for.
/// Once the script runs out the call never returns, like an idle long poll.
#[derive(Default)]
pub struct ScriptedTelegramApi {
    pub inner: FakeTelegramApi,
    pub script: Mutex<VecDeque<PollStep>>,
    pub offsets: Mutex<Vec<i64>>,
    pub webhook_deletes: Mutex<u32>,
    pub command_sets: Mutex<Vec<Vec<BotCommand>>>,
}

impl ScriptedTelegramApi {
    pub fn new(steps: Vec<PollStep>) -> Self {
        Self {
            script: Mutex::new(steps.into()),
            ..Self::default()
        }
    }

    pub fn offsets(&self) -> Vec<i64> {
        self.offsets.lock().unwrap().clone()
    }
}

#[async_trait]
impl TelegramApi for ScriptedTelegramApi {
    async fn get_me(&self) -> Result<TgUser> {
        self.inner.get_me().await
    }

    async fn get_chat(&self, chat_id: &ChatId) -> Result<Chat> {
        self.inner.get_chat(chat_id).await
    }

    async fn send_message(
        &self,
        chat_id: &ChatId,
        text: &str,
        keyboard: Option<InlineKeyboardMarkup>,
    ) -> Result<Message> {
        self.inner.send_message(chat_id, text, keyboard).await
    }

    async fn edit_message_text(&self, chat_id: i64, message_id: i64, text: &str) -> Result<()> {
        self.inner.edit_message_text(chat_id, message_id, text).await
    }

    async fn answer_callback_query(
        &self,
        callback_query_id: &str,
        text: Option<&str>,
        show_alert: bool,
    ) -> Result<()> {
        self.inner
            .answer_callback_query(callback_query_id, text, show_alert)
            .await
    }

    async fn get_updates(&self, offset: i64, _timeout_secs: u64) -> Result<Vec<Update>> {
        self.offsets.lock().unwrap().push(offset);
        let step = self.script.lock().unwrap().pop_front();
        match step {
            Some(PollStep::Batch(updates)) => Ok(updates),
            Some(PollStep::Fail) => Err(BantahError::telegram("Bad Gateway")),
            None => std::future::pending().await,
        }
    }

    async fn set_webhook(&self, url: &str, secret_token: Option<&str>) -> Result<()> {
        self.inner.set_webhook(url, secret_token).await
    }

    async fn delete_webhook(&self) -> Result<()> {
        *self.webhook_deletes.lock().unwrap() += 1;
        Ok(())
    }

    async fn set_my_commands(&self, commands: &[BotCommand]) -> Result<()> {
        self.command_sets.lock().unwrap().push(commands.to_vec());
        Ok(())
    }
}

/// Records the update ids it sees; ids in `fail_on` return an error
#[derive(Default)]
pub struct RecordingHandler {
    pub handled: Mutex<Vec<i64>>,
    pub fail_on: Vec<i64>,
}

impl RecordingHandler {
    pub fn handled(&self) -> Vec<i64> {
        self.handled.lock().unwrap().clone()
    }
}

#[async_trait]
impl UpdateHandler for RecordingHandler {
    async fn handle(&self, update: Update) -> Result<()> {
        self.handled.lock().unwrap().push(update.update_id);
        if self.fail_on.contains(&update.update_id) {
            return Err(BantahError::telegram("handler failed"));
        }
        Ok(())
    }
}

/// Bare update carrying only an id
pub fn empty_update(update_id: i64) -> Update {
    Update {
        update_id,
        message: None,
        callback_query: None,
    }
}

/// Poll `check` until it holds or two seconds pass
pub async fn wait_until(check: impl Fn() -> bool) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    check()
}

/// Keeps every channel post the services hand over
#[derive(Default)]
pub struct RecordingBroadcaster {
    pub posts: Mutex<Vec<ChannelPost>>,
}

impl RecordingBroadcaster {
    pub fn posts(&self) -> Vec<ChannelPost> {
        self.posts.lock().unwrap().clone()
    }

    pub fn kinds(&self) -> Vec<&'static str> {
        self.posts.lock().unwrap().iter().map(|p| p.kind()).collect()
    }
}

#[async_trait]
impl ChannelBroadcaster for RecordingBroadcaster {
    async fn broadcast(&self, post: ChannelPost) -> Result<()> {
        self.posts.lock().unwrap().push(post);
        Ok(())
    }
}

// =============================================================================
// Storage and services
// =============================================================================

pub struct TestEnv {
    pub services: AppServices,
    pub config: StaticConfig,
    pub broadcasts: Arc<RecordingBroadcaster>,
    _dir: TempDir,
}

pub fn test_config() -> StaticConfig {
    let mut config = StaticConfig::default();
    config.frontend.url = "https://bantah.test".to_string();
    config.telegram.bot_username = "bantah_bot".to_string();
    config
}

/// Services over a fresh database. Telegram delivery is enabled when the
/// config carries a bot token.
pub async fn setup_with(config: StaticConfig) -> TestEnv {
    let dir = TempDir::new().expect("temp dir");
    let db_path = dir.path().join("bantah.db");
    let url = format!("sqlite://{}?mode=rwc", db_path.display());

    let storage = SeaOrmStorage::with_config(&url, "sqlite", &config.database)
        .await
        .expect("storage");
    let broadcasts = Arc::new(RecordingBroadcaster::default());
    let services = AppServices::new(Arc::new(storage), broadcasts.clone(), &config);

    TestEnv {
        services,
        config,
        broadcasts,
        _dir: dir,
    }
}

pub async fn setup() -> TestEnv {
    setup_with(test_config()).await
}

/// Same as [`setup`] with outbound Telegram notifications enabled
pub async fn setup_with_bot() -> TestEnv {
    let mut config = test_config();
    config.telegram.bot_token = "123:test".to_string();
    setup_with(config).await
}

impl TestEnv {
    pub async fn user(&self, id: &str, username: &str) -> User {
        self.services
            .users
            .ensure_user(id, username, None)
            .await
            .expect("user")
    }

    /// A user whose wallet already holds `balance`
    pub async fn funded_user(&self, id: &str, username: &str, balance: i64) -> User {
        let user = self.user(id, username).await;
        self.services
            .users
            .credit(id, balance, 0, Some("test"))
            .await
            .expect("credit");
        user
    }

    pub async fn admin(&self, id: &str, username: &str) -> User {
        self.user(id, username).await;
        self.services
            .users
            .seed_admins(&[username.to_string()])
            .await
            .expect("seed admin");
        self.services.users.get_user(id).await.expect("admin")
    }

    pub async fn balance(&self, id: &str) -> i64 {
        self.services.users.wallet(id).await.expect("wallet").balance
    }
}
