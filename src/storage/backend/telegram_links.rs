//! Telegram account links (one chat per user, one user per Telegram account)

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, QueryFilter, TransactionTrait,
};
use tracing::info;

use super::SeaOrmStorage;
use super::converters::model_to_telegram_link;
use super::retry;
use crate::errors::{BantahError, Result};
use crate::storage::models::TelegramLink;

use migration::entities::telegram_link;

impl SeaOrmStorage {
    /// Link `user_id` to a Telegram account, replacing the user's previous link
    pub async fn upsert_link(
        &self,
        user_id: &str,
        telegram_id: i64,
        chat_id: i64,
        telegram_username: Option<&str>,
    ) -> Result<TelegramLink> {
        let txn = self.db.begin().await?;

        if let Some(existing) = telegram_link::Entity::find()
            .filter(telegram_link::Column::TelegramId.eq(telegram_id))
            .one(&txn)
            .await?
            && existing.user_id != user_id
        {
            return Err(BantahError::already_linked(
                "This Telegram account is already linked to another user",
            ));
        }

        telegram_link::Entity::delete_by_id(user_id.to_string())
            .exec(&txn)
            .await?;

        let model = telegram_link::ActiveModel {
            user_id: Set(user_id.to_string()),
            telegram_id: Set(telegram_id),
            chat_id: Set(chat_id),
            telegram_username: Set(telegram_username.map(str::to_string)),
            linked_at: Set(Utc::now()),
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;
        info!("Telegram account {} linked to user {}", telegram_id, user_id);
        Ok(model_to_telegram_link(model))
    }

    pub async fn get_link_by_user(&self, user_id: &str) -> Result<Option<TelegramLink>> {
        let db = &self.db;
        let id = user_id.to_string();
        let model = retry::with_retry(
            &format!("get_link_by_user({})", user_id),
            self.retry_config,
            || async { telegram_link::Entity::find_by_id(id.clone()).one(db).await },
        )
        .await?;
        Ok(model.map(model_to_telegram_link))
    }

    pub async fn get_link_by_telegram_id(&self, telegram_id: i64) -> Result<Option<TelegramLink>> {
        let db = &self.db;
        let model = retry::with_retry(
            &format!("get_link_by_telegram_id({})", telegram_id),
            self.retry_config,
            || async {
                telegram_link::Entity::find()
                    .filter(telegram_link::Column::TelegramId.eq(telegram_id))
                    .one(db)
                    .await
            },
        )
        .await?;
        Ok(model.map(model_to_telegram_link))
    }

    /// Returns true if a link was removed
    pub async fn delete_link(&self, user_id: &str) -> Result<bool> {
        let result = telegram_link::Entity::delete_by_id(user_id.to_string())
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected > 0)
    }
}
