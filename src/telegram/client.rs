//! Bot API client
//!
//! [`TelegramApi`] is the seam between the bot logic and Telegram. The
//! production implementation [`BotApi`] speaks JSON over HTTPS; tests
//! substitute a recording fake.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::debug;

use super::types::{
    ApiReply, BotCommand, Chat, ChatId, InlineKeyboardMarkup, Message, TgUser, Update,
};
use crate::config::TelegramConfig;
use crate::errors::{BantahError, Result};

/// Update kinds the bot subscribes to
pub const ALLOWED_UPDATES: [&str; 2] = ["message", "callback_query"];

#[async_trait]
pub trait TelegramApi: Send + Sync {
    async fn get_me(&self) -> Result<TgUser>;

    async fn get_chat(&self, chat_id: &ChatId) -> Result<Chat>;

    /// Send a Markdown message, optionally with an inline keyboard
    async fn send_message(
        &self,
        chat_id: &ChatId,
        text: &str,
        keyboard: Option<InlineKeyboardMarkup>,
    ) -> Result<Message>;

    async fn edit_message_text(&self, chat_id: i64, message_id: i64, text: &str) -> Result<()>;

    async fn answer_callback_query(
        &self,
        callback_query_id: &str,
        text: Option<&str>,
        show_alert: bool,
    ) -> Result<()>;

    /// Long-poll for updates after `offset`
    async fn get_updates(&self, offset: i64, timeout_secs: u64) -> Result<Vec<Update>>;

    async fn set_webhook(&self, url: &str, secret_token: Option<&str>) -> Result<()>;

    async fn delete_webhook(&self) -> Result<()>;

    async fn set_my_commands(&self, commands: &[BotCommand]) -> Result<()>;
}

/// HTTPS client for `https://api.telegram.org/bot<token>/<method>`
pub struct BotApi {
    http: reqwest::Client,
    base_url: String,
}

impl BotApi {
    pub fn new(token: &str, api_base_url: &str, poll_timeout_secs: u64) -> Result<Self> {
        if token.is_empty() {
            return Err(BantahError::telegram("Bot token is empty"));
        }

        // Leave headroom over the long-poll timeout so getUpdates is not cut short
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(poll_timeout_secs + 15))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| BantahError::telegram(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: format!("{}/bot{}", api_base_url.trim_end_matches('/'), token),
        })
    }

    pub fn from_config(config: &TelegramConfig) -> Result<Self> {
        Self::new(
            &config.bot_token,
            &config.api_base_url,
            config.poll_timeout_secs,
        )
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, body: Value) -> Result<T> {
        debug!("Telegram API call: {}", method);

        let response = self
            .http
            .post(format!("{}/{}", self.base_url, method))
            .json(&body)
            .send()
            .await?;

        let reply: ApiReply<T> = response.json().await?;
        if !reply.ok {
            let description = reply
                .description
                .unwrap_or_else(|| "unknown error".to_string());
            return Err(BantahError::telegram(match reply.error_code {
                Some(code) => format!("{} failed ({}): {}", method, code, description),
                None => format!("{} failed: {}", method, description),
            }));
        }

        reply
            .result
            .ok_or_else(|| BantahError::telegram(format!("{} returned no result", method)))
    }
}

#[async_trait]
impl TelegramApi for BotApi {
    async fn get_me(&self) -> Result<TgUser> {
        self.call("getMe", json!({})).await
    }

    async fn get_chat(&self, chat_id: &ChatId) -> Result<Chat> {
        self.call("getChat", json!({ "chat_id": chat_id })).await
    }

    async fn send_message(
        &self,
        chat_id: &ChatId,
        text: &str,
        keyboard: Option<InlineKeyboardMarkup>,
    ) -> Result<Message> {
        let mut body = json!({
            "chat_id": chat_id,
            "text": text,
            "parse_mode": "Markdown",
            "disable_web_page_preview": false,
        });
        if let Some(keyboard) = keyboard {
            body["reply_markup"] = serde_json::to_value(keyboard)?;
        }
        self.call("sendMessage", body).await
    }

    async fn edit_message_text(&self, chat_id: i64, message_id: i64, text: &str) -> Result<()> {
        // Returns the edited Message (or `true` for inline messages); only success matters
        let _: Value = self
            .call(
                "editMessageText",
                json!({ "chat_id": chat_id, "message_id": message_id, "text": text }),
            )
            .await?;
        Ok(())
    }

    async fn answer_callback_query(
        &self,
        callback_query_id: &str,
        text: Option<&str>,
        show_alert: bool,
    ) -> Result<()> {
        let mut body = json!({ "callback_query_id": callback_query_id });
        if let Some(text) = text {
            body["text"] = json!(text);
            body["show_alert"] = json!(show_alert);
        }
        let _: bool = self.call("answerCallbackQuery", body).await?;
        Ok(())
    }

    async fn get_updates(&self, offset: i64, timeout_secs: u64) -> Result<Vec<Update>> {
        self.call(
            "getUpdates",
            json!({
                "offset": offset,
                "timeout": timeout_secs,
                "allowed_updates": ALLOWED_UPDATES,
            }),
        )
        .await
    }

    async fn set_webhook(&self, url: &str, secret_token: Option<&str>) -> Result<()> {
        let mut body = json!({ "url": url, "allowed_updates": ALLOWED_UPDATES });
        if let Some(secret) = secret_token.filter(|s| !s.is_empty()) {
            body["secret_token"] = json!(secret);
        }
        let _: bool = self.call("setWebhook", body).await?;
        Ok(())
    }

    async fn delete_webhook(&self) -> Result<()> {
        let _: bool = self.call("deleteWebhook", json!({})).await?;
        Ok(())
    }

    async fn set_my_commands(&self, commands: &[BotCommand]) -> Result<()> {
        let _: bool = self
            .call("setMyCommands", json!({ "commands": commands }))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_token_is_rejected() {
        let err = BotApi::new("", "https://api.telegram.org", 30).err().unwrap();
        assert_eq!(err.code(), "E014");
    }

    #[test]
    fn test_base_url_trims_trailing_slash() {
        let api = BotApi::new("123:abc", "https://api.telegram.org/", 30).unwrap();
        assert_eq!(api.base_url, "https://api.telegram.org/bot123:abc");
    }
}
