//! Standalone relay bot
//!
//! Runs outside the main server (the `bantah-relay` binary). It owns no
//! database and answers commands by asking the main API about the sender,
//! pointing users to the mini-app for everything else.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use super::client::TelegramApi;
use super::format::{RULE, escape_markdown, format_amount, format_number};
use super::handler::UpdateHandler;
use super::types::{BotCommand, ChatId, InlineKeyboardButton, InlineKeyboardMarkup, Message, Update};
use crate::api::ApiResponse;
use crate::api::constants::INTERNAL_TOKEN_HEADER;
use crate::config::RelayConfig;
use crate::errors::{BantahError, Result};
use crate::storage::{LinkedAccountSummary, TelegramUserLookup};

const NOT_LINKED: &str = "No account linked yet. Open the mini-app to get started!";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RelayCommand {
    Start,
    Balance,
    MyChallenges,
    Help,
}

fn parse_relay_command(text: &str) -> Option<RelayCommand> {
    let head = text.trim().split_whitespace().next()?.strip_prefix('/')?;
    let name = head.split('@').next().unwrap_or(head);
    match name.to_lowercase().as_str() {
        "start" => Some(RelayCommand::Start),
        "balance" => Some(RelayCommand::Balance),
        "mychallenges" => Some(RelayCommand::MyChallenges),
        "help" => Some(RelayCommand::Help),
        _ => None,
    }
}

pub fn relay_commands() -> Vec<BotCommand> {
    vec![
        BotCommand::new("start", "Open the Bantah mini-app"),
        BotCommand::new("balance", "Check your wallet balance"),
        BotCommand::new("mychallenges", "View your active challenges"),
        BotCommand::new("help", "Show this help message"),
    ]
}

// ============ Templates ============

fn welcome(first_name: &str) -> String {
    format!(
        "👋 *Welcome to Bantah, {}!*\n\n\
         {RULE}\n\n\
         🚀 Open the app below to:\n\
         ✅ Create & accept challenges\n\
         ✅ Manage your wallet\n\
         ✅ Track your stats\n\
         ✅ Get instant updates",
        escape_markdown(first_name)
    )
}

fn wallet(account: &LinkedAccountSummary) -> String {
    format!(
        "💰 *Your Wallet*\n\n\
         Balance: {}\n\
         Coins: 🪙 {}",
        format_amount(account.balance),
        format_number(account.coins)
    )
}

fn challenges(account: &LinkedAccountSummary) -> String {
    format!(
        "⚔️ *Your Challenges*\n\n\
         Active Challenges: {}\n\n\
         View all your challenges in the app!",
        account.active_challenges
    )
}

fn help() -> String {
    "🆘 *Bantah Help*\n\n\
     Available commands:\n\
     /start - Open the Bantah mini-app\n\
     /balance - Check your wallet balance\n\
     /mychallenges - View your active challenges\n\
     /help - Show this help message\n\n\
     Need more help? Open the app and check Settings!"
        .to_string()
}

fn greeting() -> String {
    "👋 Hey there! Use /help to see available commands or /start to open the Bantah app!"
        .to_string()
}

pub struct RelayHandler {
    api: Arc<dyn TelegramApi>,
    http: reqwest::Client,
    main_api_url: String,
    internal_token: String,
    mini_app_url: String,
}

impl RelayHandler {
    pub fn new(
        api: Arc<dyn TelegramApi>,
        config: &RelayConfig,
        internal_token: String,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| BantahError::telegram(format!("Failed to build HTTP client: {}", e)))?;

        let mini_app_url = format!("{}/telegram-mini-app", config.mini_app_base());
        info!("Relay main API: {}", config.main_api_url);
        info!("Relay mini-app: {}", mini_app_url);

        Ok(Self {
            api,
            http,
            main_api_url: config.main_api_url.trim_end_matches('/').to_string(),
            internal_token,
            mini_app_url,
        })
    }

    fn app_button(&self, text: &str, tab: Option<&str>) -> InlineKeyboardMarkup {
        let url = match tab {
            Some(tab) => format!("{}?tab={}", self.mini_app_url, tab),
            None => self.mini_app_url.clone(),
        };
        InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::web_app(text, url)]])
    }

    /// `None` when the Telegram user has no linked account
    async fn lookup(&self, telegram_id: i64) -> Result<Option<LinkedAccountSummary>> {
        let mut request = self
            .http
            .get(format!("{}/api/telegram/user/{}", self.main_api_url, telegram_id));
        if !self.internal_token.is_empty() {
            request = request.header(INTERNAL_TOKEN_HEADER, &self.internal_token);
        }

        let response = request.send().await?.error_for_status()?;
        let body: ApiResponse<TelegramUserLookup> = response.json().await?;
        Ok(body.data.and_then(|lookup| lookup.user))
    }

    async fn send(
        &self,
        chat_id: i64,
        text: String,
        keyboard: Option<InlineKeyboardMarkup>,
    ) -> Result<()> {
        self.api
            .send_message(&ChatId::from(chat_id), &text, keyboard)
            .await?;
        Ok(())
    }

    async fn handle_message(&self, message: Message) -> Result<()> {
        let Some(text) = message.text.as_deref() else {
            return Ok(());
        };
        let chat_id = message.chat.id;
        let telegram_id = message.from.as_ref().map(|u| u.id).unwrap_or(chat_id);

        let Some(command) = parse_relay_command(text) else {
            if text.starts_with('/') {
                return Ok(());
            }
            return self
                .send(chat_id, greeting(), Some(self.app_button("🎯 Open Bantah", None)))
                .await;
        };
        info!("Relay {:?} from Telegram user {}", command, telegram_id);

        match command {
            RelayCommand::Start => {
                let first_name = message
                    .from
                    .as_ref()
                    .map(|u| u.first_name.as_str())
                    .unwrap_or("User");
                self.send(
                    chat_id,
                    welcome(first_name),
                    Some(self.app_button("🎯 Open Bantah", None)),
                )
                .await
            }
            RelayCommand::Help => self.send(chat_id, help(), None).await,
            RelayCommand::Balance => match self.lookup(telegram_id).await {
                Ok(Some(account)) => {
                    self.send(
                        chat_id,
                        wallet(&account),
                        Some(self.app_button("💼 View in Wallet", Some("wallet"))),
                    )
                    .await
                }
                Ok(None) => {
                    self.send(
                        chat_id,
                        format!("💰 *Your Wallet*\n\n{}", NOT_LINKED),
                        Some(self.app_button("🚀 Open App", None)),
                    )
                    .await
                }
                Err(e) => {
                    warn!("Wallet lookup failed for {}: {}", telegram_id, e);
                    self.send(
                        chat_id,
                        "⚠️ Unable to fetch wallet. Please try again.".to_string(),
                        None,
                    )
                    .await
                }
            },
            RelayCommand::MyChallenges => match self.lookup(telegram_id).await {
                Ok(Some(account)) => {
                    self.send(
                        chat_id,
                        challenges(&account),
                        Some(self.app_button("⚔️ View Challenges", Some("challenges"))),
                    )
                    .await
                }
                Ok(None) => {
                    self.send(
                        chat_id,
                        format!("⚔️ *Your Challenges*\n\n{}", NOT_LINKED),
                        Some(self.app_button("🚀 Open App", None)),
                    )
                    .await
                }
                Err(e) => {
                    warn!("Challenge lookup failed for {}: {}", telegram_id, e);
                    self.send(
                        chat_id,
                        "⚠️ Unable to fetch challenges. Please try again.".to_string(),
                        None,
                    )
                    .await
                }
            },
        }
    }
}

#[async_trait]
impl UpdateHandler for RelayHandler {
    async fn handle(&self, update: Update) -> Result<()> {
        if let Some(query) = update.callback_query {
            return self.api.answer_callback_query(&query.id, None, false).await;
        }
        match update.message {
            Some(message) => self.handle_message(message).await,
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_relay_command() {
        assert_eq!(parse_relay_command("/start"), Some(RelayCommand::Start));
        assert_eq!(
            parse_relay_command("/balance@BantahBot"),
            Some(RelayCommand::Balance)
        );
        assert_eq!(
            parse_relay_command("/MyChallenges now"),
            Some(RelayCommand::MyChallenges)
        );
        assert_eq!(parse_relay_command("/challenge @x 1 y"), None);
        assert_eq!(parse_relay_command("hello"), None);
    }

    #[test]
    fn test_wallet_template() {
        let account = LinkedAccountSummary {
            user_id: "u1".to_string(),
            username: "alice".to_string(),
            balance: 15000,
            coins: 1200,
            active_challenges: 2,
        };
        assert_eq!(
            wallet(&account),
            "💰 *Your Wallet*\n\nBalance: ₦15,000\nCoins: 🪙 1,200"
        );
        assert!(challenges(&account).contains("Active Challenges: 2"));
    }

    #[test]
    fn test_lookup_body_with_null_user() {
        let body: ApiResponse<TelegramUserLookup> =
            serde_json::from_str(r#"{"code":0,"message":"OK","data":{"user":null}}"#).unwrap();
        assert_eq!(body.data.and_then(|d| d.user), None);
    }
}
