//! Delivery of stored notifications to linked Telegram chats

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use super::client::TelegramApi;
use super::format;
use super::keyboards;
use super::types::{ChatId, InlineKeyboardMarkup};
use crate::config::FrontendConfig;
use crate::errors::Result;
use crate::services::{LinkingService, NotificationService};
use crate::storage::{DeliveryStatus, NotificationPayload};

/// Counts from one outbox pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutboxStats {
    pub sent: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Telegram text and buttons for a notification
pub fn render(
    payload: &NotificationPayload,
    frontend: &FrontendConfig,
) -> (String, Option<InlineKeyboardMarkup>) {
    match payload {
        NotificationPayload::ChallengeReceived {
            challenge_id,
            title,
            challenger,
            stake_amount,
            category,
            description,
            ..
        } => (
            format::challenge_received(
                title,
                challenger,
                *stake_amount,
                category,
                description.as_deref(),
            ),
            Some(keyboards::challenge_card(frontend, *challenge_id)),
        ),
        NotificationPayload::ChallengeAccepted {
            challenge_id,
            title,
            opponent,
            stake_amount,
        } => (
            format::challenge_accepted(title, opponent, *stake_amount),
            Some(keyboards::view_challenge(frontend, *challenge_id)),
        ),
        NotificationPayload::ChallengeDeclined {
            title,
            opponent,
            refund,
            ..
        } => (format::challenge_declined(title, opponent, *refund), None),
        NotificationPayload::ChallengeCancelled {
            title, challenger, ..
        } => (format::challenge_cancelled(title, challenger), None),
        NotificationPayload::ChallengeExpired { title, refund, .. } => {
            (format::challenge_expired(title, *refund), None)
        }
        NotificationPayload::ChallengeResult {
            challenge_id,
            title,
            outcome,
            payout,
        } => (
            format::challenge_result(title, *outcome, *payout),
            Some(keyboards::view_challenge(frontend, *challenge_id)),
        ),
        NotificationPayload::EventEndingSoon {
            event_id,
            title,
            end_date,
        } => (
            format::event_ending_soon(title, *end_date, Utc::now()),
            Some(keyboards::view_event(frontend, *event_id)),
        ),
        NotificationPayload::EventClosed { event_id, title } => (
            format::event_closed(title),
            Some(keyboards::view_event(frontend, *event_id)),
        ),
        NotificationPayload::EventResult {
            event_id,
            title,
            outcome,
            won,
            refunded,
            payout,
        } => (
            format::event_result(title, *outcome, *won, *refunded, *payout),
            Some(keyboards::view_event(frontend, *event_id)),
        ),
        NotificationPayload::EventCancelled { title, refund, .. } => {
            (format::event_cancelled(title, *refund), None)
        }
        NotificationPayload::PaymentReceived {
            amount,
            new_balance,
            ..
        } => (format::payment_received(*amount, *new_balance), None),
        NotificationPayload::AccountLinked {
            telegram_username,
            balance,
        } => (
            format::account_linked(telegram_username.as_deref().unwrap_or("there"), *balance),
            None,
        ),
    }
}

pub struct NotificationOutbox {
    api: Arc<dyn TelegramApi>,
    notifications: Arc<NotificationService>,
    linking: Arc<LinkingService>,
    frontend: FrontendConfig,
    bot_username: String,
    batch_size: u64,
    max_attempts: i32,
}

impl NotificationOutbox {
    pub fn new(
        api: Arc<dyn TelegramApi>,
        notifications: Arc<NotificationService>,
        linking: Arc<LinkingService>,
        frontend: FrontendConfig,
        bot_username: String,
        batch_size: u64,
        max_attempts: i32,
    ) -> Self {
        Self {
            api,
            notifications,
            linking,
            frontend,
            bot_username,
            batch_size,
            max_attempts,
        }
    }

    /// Deliver one batch of pending notifications
    pub async fn run_once(&self) -> Result<OutboxStats> {
        let mut stats = OutboxStats::default();
        let pending = self
            .notifications
            .pending_deliveries(self.batch_size)
            .await?;

        for notification in pending {
            let Some(link) = self.linking.link_for_user(&notification.user_id).await? else {
                self.notifications
                    .record_delivery(notification.id, DeliveryStatus::Skipped)
                    .await?;
                stats.skipped += 1;
                continue;
            };

            let (text, mut keyboard) = render(&notification.payload, &self.frontend);
            if matches!(notification.payload, NotificationPayload::AccountLinked { .. }) {
                keyboard = Some(keyboards::linked(&self.frontend, &self.bot_username));
            }

            match self
                .api
                .send_message(&ChatId::from(link.chat_id), &text, keyboard)
                .await
            {
                Ok(_) => {
                    self.notifications
                        .record_delivery(notification.id, DeliveryStatus::Sent)
                        .await?;
                    debug!(
                        "Delivered notification #{} to chat {}",
                        notification.id, link.chat_id
                    );
                    stats.sent += 1;
                }
                Err(e) => {
                    let status = self
                        .notifications
                        .record_attempt_failure(notification.id, self.max_attempts)
                        .await?;
                    warn!(
                        "Failed to deliver notification #{} ({}): {}",
                        notification.id, status, e
                    );
                    if status == DeliveryStatus::Failed {
                        stats.failed += 1;
                    }
                }
            }
        }

        if stats != OutboxStats::default() {
            info!(
                "Outbox: {} sent, {} skipped, {} failed",
                stats.sent, stats.skipped, stats.failed
            );
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frontend() -> FrontendConfig {
        FrontendConfig {
            url: "https://bantah.app".to_string(),
        }
    }

    #[test]
    fn test_challenge_received_has_action_buttons() {
        let payload = NotificationPayload::ChallengeReceived {
            challenge_id: 5,
            title: "Chess".to_string(),
            challenger: "@alice".to_string(),
            stake_amount: 1000,
            category: "skill".to_string(),
            description: None,
            due_date: None,
        };
        let (text, keyboard) = render(&payload, &frontend());
        assert!(text.contains("CHALLENGE RECEIVED"));
        let keyboard = keyboard.expect("challenge card");
        assert_eq!(
            keyboard.inline_keyboard[0][0].callback_data.as_deref(),
            Some("accept_5")
        );
    }

    #[test]
    fn test_payment_received_has_no_buttons() {
        let payload = NotificationPayload::PaymentReceived {
            amount: 2000,
            coins: 0,
            new_balance: 3000,
        };
        let (text, keyboard) = render(&payload, &frontend());
        assert!(text.contains("₦2,000"));
        assert!(keyboard.is_none());
    }
}
