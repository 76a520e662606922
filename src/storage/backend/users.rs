//! User accounts and leaderboard ranking

use std::collections::HashMap;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, Condition, ConnectionTrait, EntityTrait,
    ExprTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, TransactionTrait,
    sea_query::{Expr, Func},
};
use tracing::info;

use super::SeaOrmStorage;
use super::converters::model_to_user;
use super::retry;
use crate::errors::{BantahError, Result};
use crate::storage::models::User;

use migration::entities::{user, wallet};

/// Record a win and its earnings on a user's leaderboard stats
pub(super) async fn add_win<C: ConnectionTrait>(conn: &C, user_id: &str, earnings: i64) -> Result<()> {
    user::Entity::update_many()
        .col_expr(
            user::Column::TotalWins,
            Expr::col(user::Column::TotalWins).add(1),
        )
        .col_expr(
            user::Column::TotalEarnings,
            Expr::col(user::Column::TotalEarnings).add(earnings),
        )
        .filter(user::Column::Id.eq(user_id))
        .exec(conn)
        .await?;
    Ok(())
}

/// Users strictly ahead of `u`: more wins, then more earnings, then older
/// account, then smaller id. Matches the `top_users` order.
fn ahead_of(u: &user::Model) -> Condition {
    Condition::any()
        .add(user::Column::TotalWins.gt(u.total_wins))
        .add(
            Condition::all()
                .add(user::Column::TotalWins.eq(u.total_wins))
                .add(user::Column::TotalEarnings.gt(u.total_earnings)),
        )
        .add(
            Condition::all()
                .add(user::Column::TotalWins.eq(u.total_wins))
                .add(user::Column::TotalEarnings.eq(u.total_earnings))
                .add(user::Column::CreatedAt.lt(u.created_at)),
        )
        .add(
            Condition::all()
                .add(user::Column::TotalWins.eq(u.total_wins))
                .add(user::Column::TotalEarnings.eq(u.total_earnings))
                .add(user::Column::CreatedAt.eq(u.created_at))
                .add(user::Column::Id.lt(u.id.clone())),
        )
}

impl SeaOrmStorage {
    pub async fn get_user(&self, user_id: &str) -> Result<Option<User>> {
        let db = &self.db;
        let id = user_id.to_string();

        let model = retry::with_retry(
            &format!("get_user({})", user_id),
            self.retry_config,
            || async { user::Entity::find_by_id(id.clone()).one(db).await },
        )
        .await?;

        Ok(model.map(model_to_user))
    }

    /// Case-insensitive username lookup
    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let db = &self.db;
        let needle = username.to_lowercase();

        let model = retry::with_retry(
            &format!("get_user_by_username({})", username),
            self.retry_config,
            || async {
                user::Entity::find()
                    .filter(Expr::expr(Func::lower(Expr::col(user::Column::Username))).eq(needle.clone()))
                    .one(db)
                    .await
            },
        )
        .await?;

        Ok(model.map(model_to_user))
    }

    /// Insert a user and an empty wallet in one transaction
    pub async fn create_user_with_wallet(
        &self,
        user_id: &str,
        username: &str,
        first_name: Option<&str>,
    ) -> Result<User> {
        if self.get_user_by_username(username).await?.is_some() {
            return Err(BantahError::conflict(format!(
                "Username '{}' is already taken",
                username
            )));
        }

        let now = Utc::now();
        let txn = self.db.begin().await?;

        let model = user::ActiveModel {
            id: Set(user_id.to_string()),
            username: Set(username.to_string()),
            first_name: Set(first_name.map(str::to_string)),
            is_admin: Set(false),
            total_wins: Set(0),
            total_earnings: Set(0),
            created_at: Set(now),
        }
        .insert(&txn)
        .await?;

        wallet::ActiveModel {
            user_id: Set(user_id.to_string()),
            balance: Set(0),
            coins: Set(0),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;
        info!("User provisioned: {} (@{})", user_id, username);
        Ok(model_to_user(model))
    }

    /// Flag existing users as admins. Returns the number of rows changed.
    pub async fn set_admin_by_usernames(&self, usernames: &[String]) -> Result<u64> {
        if usernames.is_empty() {
            return Ok(0);
        }
        let lowered: Vec<String> = usernames
            .iter()
            .map(|u| u.trim_start_matches('@').to_lowercase())
            .collect();

        let result = user::Entity::update_many()
            .col_expr(user::Column::IsAdmin, Expr::value(true))
            .filter(Expr::expr(Func::lower(Expr::col(user::Column::Username))).is_in(lowered))
            .filter(user::Column::IsAdmin.eq(false))
            .exec(&self.db)
            .await?;

        Ok(result.rows_affected)
    }

    pub async fn count_users(&self) -> Result<u64> {
        Ok(user::Entity::find().count(&self.db).await?)
    }

    /// Leaderboard order: wins desc, earnings desc, oldest account first
    pub async fn top_users(&self, limit: u64) -> Result<Vec<User>> {
        let db = &self.db;
        let models = retry::with_retry("top_users", self.retry_config, || async {
            user::Entity::find()
                .order_by_desc(user::Column::TotalWins)
                .order_by_desc(user::Column::TotalEarnings)
                .order_by_asc(user::Column::CreatedAt)
                .order_by_asc(user::Column::Id)
                .limit(limit)
                .all(db)
                .await
        })
        .await?;

        Ok(models.into_iter().map(model_to_user).collect())
    }

    /// 1-based leaderboard position, `None` for unknown users
    pub async fn rank_of(&self, user_id: &str) -> Result<Option<u64>> {
        let Some(model) = user::Entity::find_by_id(user_id.to_string())
            .one(&self.db)
            .await?
        else {
            return Ok(None);
        };

        let ahead = user::Entity::find()
            .filter(ahead_of(&model))
            .count(&self.db)
            .await?;
        Ok(Some(ahead + 1))
    }

    pub async fn ranks_for(&self, user_ids: &[String]) -> Result<HashMap<String, u64>> {
        let mut ranks = HashMap::with_capacity(user_ids.len());
        for id in user_ids {
            if ranks.contains_key(id) {
                continue;
            }
            if let Some(rank) = self.rank_of(id).await? {
                ranks.insert(id.clone(), rank);
            }
        }
        Ok(ranks)
    }
}
