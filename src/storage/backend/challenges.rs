//! Peer-to-peer challenges with escrowed stakes
//!
//! Status changes are compare-and-set on the current status, so two
//! concurrent accepts (or an accept racing an expiry) cannot both win.

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, Condition, ConnectionTrait, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, TransactionTrait, sea_query::Expr,
};
use tracing::info;

use super::SeaOrmStorage;
use super::converters::{convert_all, model_to_challenge};
use super::retry;
use super::{users, wallets};
use crate::errors::{BantahError, Result};
use crate::storage::models::{
    Challenge, ChallengeResult, ChallengeSettlement, ChallengeStatus, TransactionKind,
};

use migration::entities::challenge;

/// Fields of a new challenge, validated by the service layer
#[derive(Debug, Clone)]
pub struct NewChallenge {
    pub creator_id: String,
    pub challenged_id: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub category: String,
    pub stake_amount: i64,
    pub due_date: Option<DateTime<Utc>>,
}

/// Ways a pending challenge can end without being played
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeTransition {
    Decline,
    Cancel,
    Expire,
}

impl ChallengeTransition {
    fn target(self) -> ChallengeStatus {
        match self {
            ChallengeTransition::Decline => ChallengeStatus::Declined,
            ChallengeTransition::Cancel => ChallengeStatus::Cancelled,
            ChallengeTransition::Expire => ChallengeStatus::Expired,
        }
    }

    /// Check that `actor` may perform this transition
    fn authorize(self, challenge: &Challenge, actor: Option<&str>) -> Result<()> {
        match (self, actor) {
            (ChallengeTransition::Expire, _) => Ok(()),
            (ChallengeTransition::Decline, Some(user))
                if challenge.challenged_id.as_deref() == Some(user) =>
            {
                Ok(())
            }
            (ChallengeTransition::Cancel, Some(user)) if challenge.creator_id == user => Ok(()),
            (ChallengeTransition::Decline, _) => Err(BantahError::forbidden(
                "Only the challenged user can decline this challenge",
            )),
            (ChallengeTransition::Cancel, _) => Err(BantahError::forbidden(
                "Only the challenger can cancel this challenge",
            )),
        }
    }
}

fn challenge_reference(challenge_id: i64) -> String {
    format!("challenge:{}", challenge_id)
}

fn no_longer_available() -> BantahError {
    BantahError::conflict("Challenge no longer available")
}

async fn load_challenge<C: ConnectionTrait>(conn: &C, challenge_id: i64) -> Result<Challenge> {
    let model = challenge::Entity::find_by_id(challenge_id)
        .one(conn)
        .await?
        .ok_or_else(|| BantahError::not_found(format!("Challenge {} not found", challenge_id)))?;
    model_to_challenge(model)
}

fn involving(user_id: &str) -> Condition {
    Condition::any()
        .add(challenge::Column::CreatorId.eq(user_id))
        .add(challenge::Column::ChallengedId.eq(user_id))
}

impl SeaOrmStorage {
    /// Insert a pending challenge and escrow the creator's stake
    pub async fn create_challenge(&self, new: NewChallenge) -> Result<Challenge> {
        let txn = self.db.begin().await?;

        let model = challenge::ActiveModel {
            creator_id: Set(new.creator_id.clone()),
            challenged_id: Set(new.challenged_id),
            title: Set(new.title),
            description: Set(new.description),
            category: Set(new.category),
            stake_amount: Set(new.stake_amount),
            status: Set(ChallengeStatus::Pending.as_ref().to_string()),
            result: Set(None),
            due_date: Set(new.due_date),
            created_at: Set(Utc::now()),
            accepted_at: Set(None),
            resolved_at: Set(None),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        wallets::debit(
            &txn,
            &new.creator_id,
            new.stake_amount,
            TransactionKind::Stake,
            &challenge_reference(model.id),
        )
        .await?;

        txn.commit().await?;

        let challenge = model_to_challenge(model)?;
        info!(
            "Challenge #{} created by {} for {}",
            challenge.id, challenge.creator_id, challenge.stake_amount
        );
        Ok(challenge)
    }

    pub async fn get_challenge(&self, challenge_id: i64) -> Result<Option<Challenge>> {
        let db = &self.db;
        let model = retry::with_retry(
            &format!("get_challenge({})", challenge_id),
            self.retry_config,
            || async { challenge::Entity::find_by_id(challenge_id).one(db).await },
        )
        .await?;

        model.map(model_to_challenge).transpose()
    }

    /// Accept a pending challenge and escrow the acceptor's stake
    pub async fn accept_challenge(
        &self,
        challenge_id: i64,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Challenge> {
        let txn = self.db.begin().await?;

        let current = load_challenge(&txn, challenge_id).await?;
        if current.status != ChallengeStatus::Pending {
            return Err(no_longer_available());
        }
        match current.challenged_id.as_deref() {
            Some(challenged) if challenged != user_id => {
                return Err(BantahError::forbidden(
                    "This challenge is addressed to another user",
                ));
            }
            None if current.creator_id == user_id => {
                return Err(BantahError::forbidden("You cannot accept your own challenge"));
            }
            _ => {}
        }

        let result = challenge::Entity::update_many()
            .col_expr(
                challenge::Column::Status,
                Expr::value(ChallengeStatus::Active.as_ref()),
            )
            .col_expr(challenge::Column::ChallengedId, Expr::value(user_id))
            .col_expr(challenge::Column::AcceptedAt, Expr::value(Some(now)))
            .filter(challenge::Column::Id.eq(challenge_id))
            .filter(challenge::Column::Status.eq(ChallengeStatus::Pending.as_ref()))
            .exec(&txn)
            .await?;
        if result.rows_affected == 0 {
            return Err(no_longer_available());
        }

        wallets::debit(
            &txn,
            user_id,
            current.stake_amount,
            TransactionKind::Stake,
            &challenge_reference(challenge_id),
        )
        .await?;

        let challenge = load_challenge(&txn, challenge_id).await?;
        txn.commit().await?;

        info!("Challenge #{} accepted by {}", challenge_id, user_id);
        Ok(challenge)
    }

    /// End a pending challenge and refund the creator's stake
    pub async fn close_pending_challenge(
        &self,
        challenge_id: i64,
        actor: Option<&str>,
        transition: ChallengeTransition,
        now: DateTime<Utc>,
    ) -> Result<Challenge> {
        let txn = self.db.begin().await?;

        let current = load_challenge(&txn, challenge_id).await?;
        if current.status != ChallengeStatus::Pending {
            return Err(no_longer_available());
        }
        transition.authorize(&current, actor)?;

        let target = transition.target();
        let result = challenge::Entity::update_many()
            .col_expr(challenge::Column::Status, Expr::value(target.as_ref()))
            .col_expr(challenge::Column::ResolvedAt, Expr::value(Some(now)))
            .filter(challenge::Column::Id.eq(challenge_id))
            .filter(challenge::Column::Status.eq(ChallengeStatus::Pending.as_ref()))
            .exec(&txn)
            .await?;
        if result.rows_affected == 0 {
            return Err(no_longer_available());
        }

        wallets::credit(
            &txn,
            &current.creator_id,
            current.stake_amount,
            0,
            TransactionKind::Refund,
            Some(&challenge_reference(challenge_id)),
        )
        .await?;

        let challenge = load_challenge(&txn, challenge_id).await?;
        txn.commit().await?;

        info!("Challenge #{} {}", challenge_id, target);
        Ok(challenge)
    }

    /// Expire a pending challenge. `None` when it already moved on.
    pub async fn expire_challenge(
        &self,
        challenge_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<Challenge>> {
        match self
            .close_pending_challenge(challenge_id, None, ChallengeTransition::Expire, now)
            .await
        {
            Ok(challenge) => Ok(Some(challenge)),
            Err(BantahError::Conflict(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Pending challenges past their due date, or older than `created_before`
    /// when they have none
    pub async fn pending_challenges_due(
        &self,
        now: DateTime<Utc>,
        created_before: DateTime<Utc>,
    ) -> Result<Vec<Challenge>> {
        let models = challenge::Entity::find()
            .filter(challenge::Column::Status.eq(ChallengeStatus::Pending.as_ref()))
            .filter(
                Condition::any()
                    .add(
                        Condition::all()
                            .add(challenge::Column::DueDate.is_not_null())
                            .add(challenge::Column::DueDate.lte(now)),
                    )
                    .add(
                        Condition::all()
                            .add(challenge::Column::DueDate.is_null())
                            .add(challenge::Column::CreatedAt.lte(created_before)),
                    ),
            )
            .order_by_asc(challenge::Column::Id)
            .all(&self.db)
            .await?;

        convert_all(models, model_to_challenge)
    }

    /// Settle an active challenge and pay the winner (or refund both on a draw)
    pub async fn resolve_challenge(
        &self,
        challenge_id: i64,
        outcome: ChallengeResult,
        now: DateTime<Utc>,
    ) -> Result<(Challenge, ChallengeSettlement)> {
        let txn = self.db.begin().await?;

        let current = load_challenge(&txn, challenge_id).await?;
        if current.status != ChallengeStatus::Active {
            return Err(BantahError::conflict(format!(
                "Challenge {} is {}, only active challenges can be resolved",
                challenge_id, current.status
            )));
        }
        let settlement = ChallengeSettlement::compute(&current, outcome)
            .ok_or_else(|| BantahError::validation("Challenge has no opponent"))?;

        let result = challenge::Entity::update_many()
            .col_expr(
                challenge::Column::Status,
                Expr::value(ChallengeStatus::Completed.as_ref()),
            )
            .col_expr(challenge::Column::Result, Expr::value(Some(outcome.as_ref())))
            .col_expr(challenge::Column::ResolvedAt, Expr::value(Some(now)))
            .filter(challenge::Column::Id.eq(challenge_id))
            .filter(challenge::Column::Status.eq(ChallengeStatus::Active.as_ref()))
            .exec(&txn)
            .await?;
        if result.rows_affected == 0 {
            return Err(BantahError::conflict(format!(
                "Challenge {} was resolved concurrently",
                challenge_id
            )));
        }

        let reference = challenge_reference(challenge_id);
        let kind = if settlement.winner_id.is_some() {
            TransactionKind::Payout
        } else {
            TransactionKind::Refund
        };
        for (user_id, amount) in &settlement.credits {
            wallets::credit(&txn, user_id, *amount, 0, kind, Some(&reference)).await?;
        }
        if let Some(winner) = &settlement.winner_id {
            users::add_win(&txn, winner, settlement.credit_for(winner)).await?;
        }

        let challenge = load_challenge(&txn, challenge_id).await?;
        txn.commit().await?;

        info!("Challenge #{} resolved: {}", challenge_id, outcome);
        Ok((challenge, settlement))
    }

    /// Challenges the user created or received, newest first.
    /// An empty `statuses` slice means any status.
    pub async fn list_challenges_for_user(
        &self,
        user_id: &str,
        statuses: &[ChallengeStatus],
        limit: u64,
    ) -> Result<Vec<Challenge>> {
        let mut query = challenge::Entity::find().filter(involving(user_id));
        if !statuses.is_empty() {
            query = query.filter(
                challenge::Column::Status.is_in(statuses.iter().map(|s| s.as_ref().to_string())),
            );
        }

        let models = query
            .order_by_desc(challenge::Column::CreatedAt)
            .order_by_desc(challenge::Column::Id)
            .limit(limit)
            .all(&self.db)
            .await?;

        convert_all(models, model_to_challenge)
    }

    /// Pending and active challenges the user takes part in
    pub async fn count_active_challenges(&self, user_id: &str) -> Result<u64> {
        Ok(challenge::Entity::find()
            .filter(involving(user_id))
            .filter(challenge::Column::Status.is_in([
                ChallengeStatus::Pending.as_ref(),
                ChallengeStatus::Active.as_ref(),
            ]))
            .count(&self.db)
            .await?)
    }
}
