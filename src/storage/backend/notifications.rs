//! In-app notifications and their Telegram delivery state

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, ExprTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, sea_query::Expr,
};

use super::SeaOrmStorage;
use super::converters::{convert_all, model_to_notification};
use crate::errors::{BantahError, Result};
use crate::storage::models::{DeliveryStatus, Notification, NotificationPayload};

use migration::entities::notification;

impl SeaOrmStorage {
    pub async fn insert_notification(
        &self,
        user_id: &str,
        title: &str,
        message: &str,
        payload: &NotificationPayload,
        telegram_status: DeliveryStatus,
    ) -> Result<Notification> {
        let model = notification::ActiveModel {
            user_id: Set(user_id.to_string()),
            kind: Set(payload.kind().to_string()),
            title: Set(title.to_string()),
            message: Set(message.to_string()),
            payload: Set(serde_json::to_string(payload)?),
            is_read: Set(false),
            telegram_status: Set(telegram_status.as_ref().to_string()),
            attempts: Set(0),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;

        model_to_notification(model)
    }

    pub async fn list_notifications(
        &self,
        user_id: &str,
        unread_only: bool,
        limit: u64,
    ) -> Result<Vec<Notification>> {
        let mut query =
            notification::Entity::find().filter(notification::Column::UserId.eq(user_id));
        if unread_only {
            query = query.filter(notification::Column::IsRead.eq(false));
        }

        let models = query
            .order_by_desc(notification::Column::Id)
            .limit(limit)
            .all(&self.db)
            .await?;

        convert_all(models, model_to_notification)
    }

    pub async fn count_unread(&self, user_id: &str) -> Result<u64> {
        Ok(notification::Entity::find()
            .filter(notification::Column::UserId.eq(user_id))
            .filter(notification::Column::IsRead.eq(false))
            .count(&self.db)
            .await?)
    }

    /// Mark one of the user's notifications as read
    pub async fn mark_notification_read(&self, user_id: &str, notification_id: i64) -> Result<()> {
        let exists = notification::Entity::find_by_id(notification_id)
            .filter(notification::Column::UserId.eq(user_id))
            .count(&self.db)
            .await?;
        if exists == 0 {
            return Err(BantahError::not_found(format!(
                "Notification {} not found",
                notification_id
            )));
        }

        notification::Entity::update_many()
            .col_expr(notification::Column::IsRead, Expr::value(true))
            .filter(notification::Column::Id.eq(notification_id))
            .exec(&self.db)
            .await?;
        Ok(())
    }

    pub async fn mark_all_read(&self, user_id: &str) -> Result<u64> {
        let result = notification::Entity::update_many()
            .col_expr(notification::Column::IsRead, Expr::value(true))
            .filter(notification::Column::UserId.eq(user_id))
            .filter(notification::Column::IsRead.eq(false))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected)
    }

    /// Oldest notifications still waiting for Telegram delivery
    pub async fn pending_deliveries(&self, limit: u64) -> Result<Vec<Notification>> {
        let models = notification::Entity::find()
            .filter(notification::Column::TelegramStatus.eq(DeliveryStatus::Pending.as_ref()))
            .order_by_asc(notification::Column::Id)
            .limit(limit)
            .all(&self.db)
            .await?;

        convert_all(models, model_to_notification)
    }

    pub async fn set_delivery_status(
        &self,
        notification_id: i64,
        status: DeliveryStatus,
    ) -> Result<()> {
        notification::Entity::update_many()
            .col_expr(
                notification::Column::TelegramStatus,
                Expr::value(status.as_ref()),
            )
            .filter(notification::Column::Id.eq(notification_id))
            .exec(&self.db)
            .await?;
        Ok(())
    }

    /// Count a failed send. The row becomes `failed` once `max_attempts` is
    /// reached and stays `pending` otherwise. Returns the resulting status.
    pub async fn record_delivery_failure(
        &self,
        notification_id: i64,
        max_attempts: i32,
    ) -> Result<DeliveryStatus> {
        notification::Entity::update_many()
            .col_expr(
                notification::Column::Attempts,
                Expr::col(notification::Column::Attempts).add(1),
            )
            .filter(notification::Column::Id.eq(notification_id))
            .exec(&self.db)
            .await?;

        let result = notification::Entity::update_many()
            .col_expr(
                notification::Column::TelegramStatus,
                Expr::value(DeliveryStatus::Failed.as_ref()),
            )
            .filter(notification::Column::Id.eq(notification_id))
            .filter(notification::Column::Attempts.gte(max_attempts))
            .exec(&self.db)
            .await?;

        Ok(if result.rows_affected > 0 {
            DeliveryStatus::Failed
        } else {
            DeliveryStatus::Pending
        })
    }
}
