//! In-app notifications and the Telegram delivery queue
//!
//! Every notification is stored with a rendered title and message for the
//! web client. When the bot is enabled the row starts as `pending` and the
//! outbox worker delivers it to the linked chat.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};
use ts_rs::TS;

use crate::config::TS_EXPORT_PATH;
use crate::errors::Result;
use crate::storage::{DeliveryStatus, Notification, NotificationPayload, SeaOrmStorage};
use crate::telegram::format::{capitalize, format_amount};

/// Notification listing with the unread badge count
#[derive(Debug, Clone, Serialize, TS)]
#[ts(export, export_to = TS_EXPORT_PATH)]
pub struct NotificationList {
    pub notifications: Vec<Notification>,
    pub unread: u64,
}

/// Plain-text title and message shown in the web client
pub fn in_app_text(payload: &NotificationPayload) -> (String, String) {
    use crate::storage::ChallengeOutcome;

    match payload {
        NotificationPayload::ChallengeReceived {
            title,
            challenger,
            stake_amount,
            ..
        } => (
            "New challenge".to_string(),
            format!(
                "{} challenged you to \"{}\" for {}",
                challenger,
                title,
                format_amount(*stake_amount)
            ),
        ),
        NotificationPayload::ChallengeAccepted {
            title, opponent, ..
        } => (
            "Challenge accepted".to_string(),
            format!("{} accepted \"{}\". Game on!", opponent, title),
        ),
        NotificationPayload::ChallengeDeclined {
            title,
            opponent,
            refund,
            ..
        } => (
            "Challenge declined".to_string(),
            format!(
                "{} declined \"{}\". {} was returned to your wallet.",
                opponent,
                title,
                format_amount(*refund)
            ),
        ),
        NotificationPayload::ChallengeCancelled {
            title, challenger, ..
        } => (
            "Challenge cancelled".to_string(),
            format!("{} withdrew \"{}\"", challenger, title),
        ),
        NotificationPayload::ChallengeExpired { title, refund, .. } => (
            "Challenge expired".to_string(),
            format!(
                "Nobody accepted \"{}\" in time. {} was returned to your wallet.",
                title,
                format_amount(*refund)
            ),
        ),
        NotificationPayload::ChallengeResult {
            title,
            outcome,
            payout,
            ..
        } => match outcome {
            ChallengeOutcome::Won => (
                "You won!".to_string(),
                format!("You won \"{}\" and received {}", title, format_amount(*payout)),
            ),
            ChallengeOutcome::Lost => (
                "Challenge lost".to_string(),
                format!("You lost \"{}\". Better luck next time!", title),
            ),
            ChallengeOutcome::Draw => (
                "It's a draw".to_string(),
                format!(
                    "\"{}\" ended in a draw. {} was returned to your wallet.",
                    title,
                    format_amount(*payout)
                ),
            ),
        },
        NotificationPayload::EventEndingSoon { title, .. } => (
            "Event ending soon".to_string(),
            format!("Predictions for \"{}\" close soon", title),
        ),
        NotificationPayload::EventClosed { title, .. } => (
            "Event closed".to_string(),
            format!("Predictions for \"{}\" are closed", title),
        ),
        NotificationPayload::EventResult {
            title,
            outcome,
            won,
            refunded,
            payout,
            ..
        } => {
            let detail = if *refunded {
                format!("Your stake of {} was refunded", format_amount(*payout))
            } else if *won {
                format!("You won {}", format_amount(*payout))
            } else {
                "Your prediction missed".to_string()
            };
            (
                "Event resolved".to_string(),
                format!(
                    "\"{}\" resolved {}. {}",
                    title,
                    capitalize(outcome.as_ref()),
                    detail
                ),
            )
        }
        NotificationPayload::EventCancelled { title, refund, .. } => (
            "Event cancelled".to_string(),
            format!(
                "\"{}\" was cancelled. {} was returned to your wallet.",
                title,
                format_amount(*refund)
            ),
        ),
        NotificationPayload::PaymentReceived {
            amount,
            new_balance,
            ..
        } => (
            "Payment received".to_string(),
            format!(
                "{} was added to your wallet. New balance: {}",
                format_amount(*amount),
                format_amount(*new_balance)
            ),
        ),
        NotificationPayload::AccountLinked {
            telegram_username, ..
        } => (
            "Telegram linked".to_string(),
            match telegram_username {
                Some(username) => format!("Your account is now linked to @{}", username),
                None => "Your account is now linked to Telegram".to_string(),
            },
        ),
    }
}

pub struct NotificationService {
    storage: Arc<SeaOrmStorage>,
    telegram_enabled: bool,
}

impl NotificationService {
    pub fn new(storage: Arc<SeaOrmStorage>, telegram_enabled: bool) -> Self {
        Self {
            storage,
            telegram_enabled,
        }
    }

    /// Store a notification for `user_id`
    pub async fn notify(
        &self,
        user_id: &str,
        payload: NotificationPayload,
    ) -> Result<Notification> {
        let (title, message) = in_app_text(&payload);
        let status = if self.telegram_enabled {
            DeliveryStatus::Pending
        } else {
            DeliveryStatus::Skipped
        };

        let notification = self
            .storage
            .insert_notification(user_id, &title, &message, &payload, status)
            .await?;
        debug!(
            "Notification #{} ({}) queued for {}",
            notification.id, notification.kind, user_id
        );
        Ok(notification)
    }

    /// Like [`notify`](Self::notify), but a failure is only logged. Used after
    /// the money has already moved so the caller's result stands.
    pub async fn dispatch(&self, user_id: &str, payload: NotificationPayload) {
        let kind = payload.kind();
        if let Err(e) = self.notify(user_id, payload).await {
            warn!("Failed to store {} notification for {}: {}", kind, user_id, e);
        }
    }

    pub async fn list(
        &self,
        user_id: &str,
        unread_only: bool,
        limit: u64,
    ) -> Result<NotificationList> {
        let notifications = self
            .storage
            .list_notifications(user_id, unread_only, limit)
            .await?;
        let unread = self.storage.count_unread(user_id).await?;
        Ok(NotificationList {
            notifications,
            unread,
        })
    }

    pub async fn unread_count(&self, user_id: &str) -> Result<u64> {
        self.storage.count_unread(user_id).await
    }

    pub async fn mark_read(&self, user_id: &str, notification_id: i64) -> Result<()> {
        self.storage
            .mark_notification_read(user_id, notification_id)
            .await
    }

    pub async fn mark_all_read(&self, user_id: &str) -> Result<u64> {
        self.storage.mark_all_read(user_id).await
    }

    pub async fn pending_deliveries(&self, limit: u64) -> Result<Vec<Notification>> {
        self.storage.pending_deliveries(limit).await
    }

    pub async fn record_delivery(&self, notification_id: i64, status: DeliveryStatus) -> Result<()> {
        self.storage
            .set_delivery_status(notification_id, status)
            .await
    }

    pub async fn record_attempt_failure(
        &self,
        notification_id: i64,
        max_attempts: i32,
    ) -> Result<DeliveryStatus> {
        self.storage
            .record_delivery_failure(notification_id, max_attempts)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{ChallengeOutcome, Prediction};

    #[test]
    fn test_in_app_text_for_payment() {
        let (title, message) = in_app_text(&NotificationPayload::PaymentReceived {
            amount: 5000,
            coins: 0,
            new_balance: 12500,
        });
        assert_eq!(title, "Payment received");
        assert_eq!(
            message,
            "₦5,000 was added to your wallet. New balance: ₦12,500"
        );
    }

    #[test]
    fn test_in_app_text_for_results() {
        let (title, _) = in_app_text(&NotificationPayload::ChallengeResult {
            challenge_id: 1,
            title: "FIFA".to_string(),
            outcome: ChallengeOutcome::Draw,
            payout: 100,
        });
        assert_eq!(title, "It's a draw");

        let (_, message) = in_app_text(&NotificationPayload::EventResult {
            event_id: 2,
            title: "Rain tomorrow".to_string(),
            outcome: Prediction::Yes,
            won: true,
            refunded: false,
            payout: 1500,
        });
        assert_eq!(message, "\"Rain tomorrow\" resolved Yes. You won ₦1,500");
    }
}
