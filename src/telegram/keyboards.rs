//! Inline keyboard builders

use super::types::{InlineKeyboardButton, InlineKeyboardMarkup};
use crate::config::FrontendConfig;

fn btn(text: &str, callback_data: String) -> InlineKeyboardButton {
    InlineKeyboardButton::callback(text, callback_data)
}

fn url_btn(text: &str, url: String) -> InlineKeyboardButton {
    InlineKeyboardButton::url(text, url)
}

fn app_btn(text: &str, url: String) -> InlineKeyboardButton {
    InlineKeyboardButton::web_app(text, url)
}

/// Welcome message button opening the link page with the one-time token
pub fn link_account(frontend: &FrontendConfig, token: &str) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![app_btn(
        "🔗 Link My Account",
        frontend.link_url(token),
    )]])
}

pub fn open_app(mini_app_url: String) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![app_btn("🎯 Open Bantah", mini_app_url)]])
}

/// Accept/decline card sent to the challenged user
pub fn challenge_card(frontend: &FrontendConfig, challenge_id: i64) -> InlineKeyboardMarkup {
    let challenge_url = frontend.challenge_url(challenge_id);
    InlineKeyboardMarkup::new(vec![
        vec![btn("✅ Accept Challenge", format!("accept_{}", challenge_id))],
        vec![url_btn(
            "💰 Deposit & Accept",
            format!("{}?action=deposit_accept", challenge_url),
        )],
        vec![
            btn("❌ Decline", format!("decline_challenge_{}", challenge_id)),
            url_btn("👀 View Details", challenge_url),
        ],
    ])
}

pub fn view_challenge(frontend: &FrontendConfig, challenge_id: i64) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![url_btn(
        "👀 View Details",
        frontend.challenge_url(challenge_id),
    )]])
}

pub fn view_event(frontend: &FrontendConfig, event_id: i64) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![url_btn(
        "📊 View Event",
        frontend.event_url(event_id),
    )]])
}

pub fn add_funds(frontend: &FrontendConfig) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![url_btn("💰 Add Funds", frontend.wallet_url())]])
}

/// Shown after linking: back to the bot and the web profile
pub fn linked(frontend: &FrontendConfig, bot_username: &str) -> InlineKeyboardMarkup {
    let mut row = Vec::with_capacity(2);
    if !bot_username.is_empty() {
        row.push(url_btn(
            "Return to Bot",
            format!("https://t.me/{}", bot_username.trim_start_matches('@')),
        ));
    }
    row.push(url_btn(
        "Open Web Profile",
        format!("{}/profile", frontend.base()),
    ));
    InlineKeyboardMarkup::new(vec![row])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frontend() -> FrontendConfig {
        FrontendConfig {
            url: "https://bantah.app/".to_string(),
        }
    }

    #[test]
    fn test_challenge_card_callbacks() {
        let keyboard = challenge_card(&frontend(), 12);
        let rows = &keyboard.inline_keyboard;
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0][0].callback_data.as_deref(), Some("accept_12"));
        assert_eq!(
            rows[1][0].url.as_deref(),
            Some("https://bantah.app/challenges/12?action=deposit_accept")
        );
        assert_eq!(rows[2][0].callback_data.as_deref(), Some("decline_challenge_12"));
    }

    #[test]
    fn test_link_account_uses_web_app() {
        let keyboard = link_account(&frontend(), "tok123");
        let button = &keyboard.inline_keyboard[0][0];
        assert_eq!(
            button.web_app.as_ref().map(|w| w.url.as_str()),
            Some("https://bantah.app/telegram-link?token=tok123")
        );
    }

    #[test]
    fn test_linked_skips_bot_button_without_username() {
        let keyboard = linked(&frontend(), "");
        assert_eq!(keyboard.inline_keyboard[0].len(), 1);
        let keyboard = linked(&frontend(), "@BantahBot");
        assert_eq!(
            keyboard.inline_keyboard[0][0].url.as_deref(),
            Some("https://t.me/BantahBot")
        );
    }
}
