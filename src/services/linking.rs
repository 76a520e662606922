//! Telegram account linking
//!
//! `/start` issues a one-time token bound to the Telegram identity. The web
//! client, already signed in, hands the token back and the two accounts are
//! tied together. Tokens live only in memory.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use tracing::info;

use super::NotificationService;
use crate::errors::{BantahError, Result};
use crate::storage::{NotificationPayload, SeaOrmStorage, TelegramLink};
use crate::utils::generate_random_code;

const LINK_TOKEN_LEN: usize = 32;
const MAX_PENDING_TOKENS: u64 = 10_000;

/// Telegram identity waiting for its token to be verified
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingLink {
    pub telegram_id: i64,
    pub chat_id: i64,
    pub username: Option<String>,
    pub first_name: String,
}

pub struct LinkingService {
    storage: Arc<SeaOrmStorage>,
    notifications: Arc<NotificationService>,
    tokens: Cache<String, PendingLink>,
}

impl LinkingService {
    pub fn new(
        storage: Arc<SeaOrmStorage>,
        notifications: Arc<NotificationService>,
        token_ttl: Duration,
    ) -> Self {
        let tokens = Cache::builder()
            .max_capacity(MAX_PENDING_TOKENS)
            .time_to_live(token_ttl)
            .build();
        Self {
            storage,
            notifications,
            tokens,
        }
    }

    pub async fn issue_token(&self, pending: PendingLink) -> String {
        let token = generate_random_code(LINK_TOKEN_LEN);
        info!("Issued link token for Telegram user {}", pending.telegram_id);
        self.tokens.insert(token.clone(), pending).await;
        token
    }

    /// Consume `token` and link its Telegram identity to `user_id`
    pub async fn verify_link(&self, user_id: &str, token: &str) -> Result<TelegramLink> {
        let pending = self.tokens.remove(token.trim()).await.ok_or_else(|| {
            BantahError::link_expired("Link token is invalid or has expired")
        })?;

        let link = self
            .storage
            .upsert_link(
                user_id,
                pending.telegram_id,
                pending.chat_id,
                pending.username.as_deref(),
            )
            .await?;

        let balance = self
            .storage
            .get_wallet(user_id)
            .await?
            .map(|w| w.balance)
            .unwrap_or_default();
        self.notifications
            .dispatch(
                user_id,
                NotificationPayload::AccountLinked {
                    telegram_username: link.telegram_username.clone(),
                    balance,
                },
            )
            .await;
        Ok(link)
    }

    pub async fn unlink(&self, user_id: &str) -> Result<bool> {
        let removed = self.storage.delete_link(user_id).await?;
        if removed {
            info!("Unlinked Telegram from user {}", user_id);
        }
        Ok(removed)
    }

    pub async fn link_for_user(&self, user_id: &str) -> Result<Option<TelegramLink>> {
        self.storage.get_link_by_user(user_id).await
    }

    pub async fn link_for_telegram(&self, telegram_id: i64) -> Result<Option<TelegramLink>> {
        self.storage.get_link_by_telegram_id(telegram_id).await
    }

    /// Resolve a Telegram user to the linked account id
    pub async fn user_id_for_telegram(&self, telegram_id: i64) -> Result<Option<String>> {
        Ok(self
            .link_for_telegram(telegram_id)
            .await?
            .map(|link| link.user_id))
    }
}
