//! Wallet balances and the transaction ledger
//!
//! Every balance change writes exactly one ledger row in the same
//! transaction. Debits are conditional updates so a balance never drops
//! below zero.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, EntityTrait, ExprTrait,
    QueryFilter, QueryOrder, QuerySelect, TransactionTrait, sea_query::Expr,
};
use tracing::info;

use super::SeaOrmStorage;
use super::converters::{convert_all, model_to_transaction, model_to_wallet};
use super::retry;
use crate::errors::{BantahError, Result};
use crate::storage::models::{TransactionKind, Wallet, WalletTransaction};

use migration::entities::{wallet, wallet_transaction};

async fn current_balance<C: ConnectionTrait>(conn: &C, user_id: &str) -> Result<i64> {
    wallet::Entity::find_by_id(user_id.to_string())
        .one(conn)
        .await?
        .map(|w| w.balance)
        .ok_or_else(|| BantahError::not_found(format!("Wallet for user {} not found", user_id)))
}

async fn record<C: ConnectionTrait>(
    conn: &C,
    user_id: &str,
    kind: TransactionKind,
    amount: i64,
    balance_after: i64,
    reference: Option<&str>,
) -> Result<()> {
    wallet_transaction::ActiveModel {
        user_id: Set(user_id.to_string()),
        kind: Set(kind.as_ref().to_string()),
        amount: Set(amount),
        balance_after: Set(balance_after),
        reference: Set(reference.map(str::to_string)),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(conn)
    .await?;
    Ok(())
}

/// Take `amount` from a wallet, failing with `InsufficientFunds` if the
/// balance does not cover it. Returns the new balance.
pub(super) async fn debit<C: ConnectionTrait>(
    conn: &C,
    user_id: &str,
    amount: i64,
    kind: TransactionKind,
    reference: &str,
) -> Result<i64> {
    if amount <= 0 {
        return Err(BantahError::validation("Debit amount must be positive"));
    }

    let result = wallet::Entity::update_many()
        .col_expr(
            wallet::Column::Balance,
            Expr::col(wallet::Column::Balance).sub(amount),
        )
        .col_expr(wallet::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(wallet::Column::UserId.eq(user_id))
        .filter(wallet::Column::Balance.gte(amount))
        .exec(conn)
        .await?;

    if result.rows_affected == 0 {
        let available = current_balance(conn, user_id).await?;
        return Err(BantahError::insufficient_funds(amount, available));
    }

    let balance_after = current_balance(conn, user_id).await?;
    record(conn, user_id, kind, -amount, balance_after, Some(reference)).await?;
    Ok(balance_after)
}

/// Add `amount` (and optionally coins) to a wallet. Returns the new balance.
pub(super) async fn credit<C: ConnectionTrait>(
    conn: &C,
    user_id: &str,
    amount: i64,
    coins: i64,
    kind: TransactionKind,
    reference: Option<&str>,
) -> Result<i64> {
    if amount < 0 || coins < 0 {
        return Err(BantahError::validation("Credit amount cannot be negative"));
    }

    let result = wallet::Entity::update_many()
        .col_expr(
            wallet::Column::Balance,
            Expr::col(wallet::Column::Balance).add(amount),
        )
        .col_expr(
            wallet::Column::Coins,
            Expr::col(wallet::Column::Coins).add(coins),
        )
        .col_expr(wallet::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(wallet::Column::UserId.eq(user_id))
        .exec(conn)
        .await?;

    if result.rows_affected == 0 {
        return Err(BantahError::not_found(format!(
            "Wallet for user {} not found",
            user_id
        )));
    }

    let balance_after = current_balance(conn, user_id).await?;
    record(conn, user_id, kind, amount, balance_after, reference).await?;
    Ok(balance_after)
}

impl SeaOrmStorage {
    pub async fn get_wallet(&self, user_id: &str) -> Result<Option<Wallet>> {
        let db = &self.db;
        let id = user_id.to_string();

        let model = retry::with_retry(
            &format!("get_wallet({})", user_id),
            self.retry_config,
            || async { wallet::Entity::find_by_id(id.clone()).one(db).await },
        )
        .await?;

        Ok(model.map(model_to_wallet))
    }

    pub async fn list_transactions(
        &self,
        user_id: &str,
        limit: u64,
    ) -> Result<Vec<WalletTransaction>> {
        let models = wallet_transaction::Entity::find()
            .filter(wallet_transaction::Column::UserId.eq(user_id))
            .order_by_desc(wallet_transaction::Column::Id)
            .limit(limit)
            .all(&self.db)
            .await?;

        convert_all(models, model_to_transaction)
    }

    /// Deposit funds and/or coins. Returns the updated wallet.
    pub async fn deposit(
        &self,
        user_id: &str,
        amount: i64,
        coins: i64,
        reference: Option<&str>,
    ) -> Result<Wallet> {
        let txn = self.db.begin().await?;
        credit(&txn, user_id, amount, coins, TransactionKind::Deposit, reference).await?;
        let wallet = wallet::Entity::find_by_id(user_id.to_string())
            .one(&txn)
            .await?
            .map(model_to_wallet)
            .ok_or_else(|| BantahError::not_found(format!("Wallet for user {} not found", user_id)))?;
        txn.commit().await?;

        info!(
            "Deposit of {} (+{} coins) credited to {}",
            amount, coins, user_id
        );
        Ok(wallet)
    }
}
