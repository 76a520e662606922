//! Conversions between sea-orm models and domain records

use std::str::FromStr;

use crate::errors::{BantahError, Result};
use crate::storage::models::{
    Challenge, DeliveryStatus, Event, EventParticipant, Notification, NotificationPayload,
    TelegramLink, User, Wallet, WalletTransaction,
};
use migration::entities::{
    challenge, event, event_participant, notification, telegram_link, user, wallet,
    wallet_transaction,
};

/// 解析存储为字符串的枚举列
fn parse_column<T: FromStr>(value: &str, column: &str) -> Result<T> {
    T::from_str(value).map_err(|_| {
        BantahError::database_operation(format!("Invalid value '{}' in column {}", value, column))
    })
}

fn parse_optional<T: FromStr>(value: Option<&str>, column: &str) -> Result<Option<T>> {
    value.map(|v| parse_column(v, column)).transpose()
}

pub fn model_to_user(model: user::Model) -> User {
    User {
        id: model.id,
        username: model.username,
        first_name: model.first_name,
        is_admin: model.is_admin,
        total_wins: model.total_wins,
        total_earnings: model.total_earnings,
        created_at: model.created_at,
    }
}

pub fn model_to_wallet(model: wallet::Model) -> Wallet {
    Wallet {
        user_id: model.user_id,
        balance: model.balance,
        coins: model.coins,
        updated_at: model.updated_at,
    }
}

pub fn model_to_transaction(model: wallet_transaction::Model) -> Result<WalletTransaction> {
    Ok(WalletTransaction {
        id: model.id,
        kind: parse_column(&model.kind, "wallet_transactions.kind")?,
        user_id: model.user_id,
        amount: model.amount,
        balance_after: model.balance_after,
        reference: model.reference,
        created_at: model.created_at,
    })
}

pub fn model_to_event(model: event::Model) -> Result<Event> {
    Ok(Event {
        status: parse_column(&model.status, "events.status")?,
        outcome: parse_optional(model.outcome.as_deref(), "events.outcome")?,
        id: model.id,
        creator_id: model.creator_id,
        title: model.title,
        description: model.description,
        category: model.category,
        entry_fee: model.entry_fee,
        yes_pool: model.yes_pool,
        no_pool: model.no_pool,
        max_participants: model.max_participants,
        is_private: model.is_private,
        end_date: model.end_date,
        ending_soon_notified: model.ending_soon_notified,
        created_at: model.created_at,
        resolved_at: model.resolved_at,
    })
}

pub fn model_to_participant(model: event_participant::Model) -> Result<EventParticipant> {
    Ok(EventParticipant {
        prediction: parse_column(&model.prediction, "event_participants.prediction")?,
        id: model.id,
        event_id: model.event_id,
        user_id: model.user_id,
        amount: model.amount,
        payout: model.payout,
        joined_at: model.joined_at,
    })
}

pub fn model_to_challenge(model: challenge::Model) -> Result<Challenge> {
    Ok(Challenge {
        status: parse_column(&model.status, "challenges.status")?,
        result: parse_optional(model.result.as_deref(), "challenges.result")?,
        id: model.id,
        creator_id: model.creator_id,
        challenged_id: model.challenged_id,
        title: model.title,
        description: model.description,
        category: model.category,
        stake_amount: model.stake_amount,
        due_date: model.due_date,
        created_at: model.created_at,
        accepted_at: model.accepted_at,
        resolved_at: model.resolved_at,
    })
}

pub fn model_to_notification(model: notification::Model) -> Result<Notification> {
    let payload: NotificationPayload = serde_json::from_str(&model.payload)?;
    let telegram_status: DeliveryStatus =
        parse_column(&model.telegram_status, "notifications.telegram_status")?;
    Ok(Notification {
        id: model.id,
        user_id: model.user_id,
        kind: model.kind,
        title: model.title,
        message: model.message,
        payload,
        is_read: model.is_read,
        telegram_status,
        attempts: model.attempts,
        created_at: model.created_at,
    })
}

pub fn model_to_telegram_link(model: telegram_link::Model) -> TelegramLink {
    TelegramLink {
        user_id: model.user_id,
        telegram_id: model.telegram_id,
        chat_id: model.chat_id,
        telegram_username: model.telegram_username,
        linked_at: model.linked_at,
    }
}

/// Convert a list of models, failing on the first corrupt row
pub fn convert_all<M, T>(models: Vec<M>, f: impl Fn(M) -> Result<T>) -> Result<Vec<T>> {
    models.into_iter().map(f).collect()
}
