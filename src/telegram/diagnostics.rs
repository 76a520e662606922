//! Bot and channel connection test

use serde::Serialize;
use tracing::{info, warn};
use ts_rs::TS;

use super::client::TelegramApi;
use super::types::ChatId;
use crate::config::TS_EXPORT_PATH;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[ts(export, export_to = TS_EXPORT_PATH)]
pub struct BotInfo {
    pub id: i64,
    pub username: Option<String>,
    pub first_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[ts(export, export_to = TS_EXPORT_PATH)]
pub struct ChannelInfo {
    pub id: i64,
    pub title: String,
    pub kind: String,
}

/// Outcome of [`test_connection`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[ts(export, export_to = TS_EXPORT_PATH)]
pub struct ConnectionReport {
    pub connected: bool,
    pub bot: Option<BotInfo>,
    pub channel: Option<ChannelInfo>,
    pub error: Option<String>,
    /// Setup steps for well-known failures
    pub guidance: Vec<String>,
}

impl ConnectionReport {
    fn failed(bot: Option<BotInfo>, error: String) -> Self {
        let guidance = guidance_for(&error);
        Self {
            connected: false,
            bot,
            channel: None,
            error: Some(error),
            guidance,
        }
    }
}

/// Setup hints for the usual channel misconfigurations
pub fn guidance_for(error: &str) -> Vec<String> {
    let error = error.to_lowercase();
    if error.contains("chat not found") {
        vec![
            "Make sure TELEGRAM_CHANNEL_ID is correct.".to_string(),
            "Use -100xxxxxxxxxx for a private channel or @channelname for a public one."
                .to_string(),
            "Add the bot to the channel as an administrator.".to_string(),
        ]
    } else if error.contains("bot is not a member") {
        vec![
            "Add the bot to the channel.".to_string(),
            "Promote it to administrator with permission to post messages.".to_string(),
        ]
    } else if error.contains("unauthorized") {
        vec!["Check TELEGRAM_BOT_TOKEN; Telegram rejected it.".to_string()]
    } else {
        Vec::new()
    }
}

/// `getMe`, then `getChat` on the channel when one is configured
pub async fn test_connection(api: &dyn TelegramApi, channel: Option<&ChatId>) -> ConnectionReport {
    let me = match api.get_me().await {
        Ok(me) => me,
        Err(e) => {
            warn!("Telegram bot check failed: {}", e);
            return ConnectionReport::failed(None, e.message());
        }
    };
    let bot = BotInfo {
        id: me.id,
        username: me.username,
        first_name: me.first_name,
    };
    info!(
        "Telegram bot connected: @{}",
        bot.username.as_deref().unwrap_or("unknown")
    );

    let Some(channel) = channel else {
        return ConnectionReport {
            connected: true,
            bot: Some(bot),
            channel: None,
            error: None,
            guidance: Vec::new(),
        };
    };

    match api.get_chat(channel).await {
        Ok(chat) => {
            info!("Telegram channel connected: {}", chat.display_name());
            ConnectionReport {
                connected: true,
                bot: Some(bot),
                channel: Some(ChannelInfo {
                    id: chat.id,
                    title: chat.display_name(),
                    kind: chat.kind,
                }),
                error: None,
                guidance: Vec::new(),
            }
        }
        Err(e) => {
            warn!("Telegram channel {} check failed: {}", channel, e);
            ConnectionReport::failed(Some(bot), e.message())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guidance_for_known_errors() {
        assert_eq!(
            guidance_for("getChat failed (400): Bad Request: chat not found").len(),
            3
        );
        assert_eq!(
            guidance_for("Forbidden: bot is not a member of the channel chat").len(),
            2
        );
        assert!(guidance_for("timeout").is_empty());
    }
}
