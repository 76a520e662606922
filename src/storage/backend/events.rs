//! Prediction events, participants and pool settlement

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, Condition, ConnectionTrait, EntityTrait,
    ExprTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, TransactionTrait,
    sea_query::{Expr, Query},
};
use tracing::info;

use super::SeaOrmStorage;
use super::converters::{convert_all, model_to_event, model_to_participant};
use super::retry;
use super::{users, wallets};
use crate::errors::{BantahError, Result};
use crate::storage::models::{
    Event, EventParticipant, EventSettlement, EventStatus, Prediction, TransactionKind,
};

use migration::entities::{event, event_participant};

/// Fields of a new event, validated by the service layer
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub creator_id: String,
    pub title: String,
    pub description: Option<String>,
    pub category: String,
    pub entry_fee: i64,
    pub max_participants: Option<i32>,
    pub is_private: bool,
    pub end_date: DateTime<Utc>,
}

/// Event listing filter
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Private events are included only when the viewer created or joined them
    pub viewer: Option<String>,
    pub status: Option<EventStatus>,
    pub category: Option<String>,
    pub limit: u64,
}

fn event_reference(event_id: i64) -> String {
    format!("event:{}", event_id)
}

async fn load_event<C: ConnectionTrait>(conn: &C, event_id: i64) -> Result<Event> {
    let model = event::Entity::find_by_id(event_id)
        .one(conn)
        .await?
        .ok_or_else(|| BantahError::not_found(format!("Event {} not found", event_id)))?;
    model_to_event(model)
}

/// Load an event under a row lock so concurrent joins on it run one at a time.
/// SQLite has no row locks; its single writer serializes the same way.
async fn lock_event<C: ConnectionTrait>(conn: &C, event_id: i64) -> Result<Event> {
    let model = event::Entity::find_by_id(event_id)
        .lock_exclusive()
        .one(conn)
        .await?
        .ok_or_else(|| BantahError::not_found(format!("Event {} not found", event_id)))?;
    model_to_event(model)
}

async fn load_participants<C: ConnectionTrait>(
    conn: &C,
    event_id: i64,
) -> Result<Vec<EventParticipant>> {
    let models = event_participant::Entity::find()
        .filter(event_participant::Column::EventId.eq(event_id))
        .order_by_asc(event_participant::Column::JoinedAt)
        .order_by_asc(event_participant::Column::Id)
        .all(conn)
        .await?;
    convert_all(models, model_to_participant)
}

impl SeaOrmStorage {
    pub async fn insert_event(&self, new: NewEvent) -> Result<Event> {
        let model = event::ActiveModel {
            creator_id: Set(new.creator_id),
            title: Set(new.title),
            description: Set(new.description),
            category: Set(new.category),
            entry_fee: Set(new.entry_fee),
            yes_pool: Set(0),
            no_pool: Set(0),
            max_participants: Set(new.max_participants),
            is_private: Set(new.is_private),
            status: Set(EventStatus::Open.as_ref().to_string()),
            outcome: Set(None),
            end_date: Set(new.end_date),
            ending_soon_notified: Set(false),
            created_at: Set(Utc::now()),
            resolved_at: Set(None),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;

        let event = model_to_event(model)?;
        info!("Event created: #{} '{}'", event.id, event.title);
        Ok(event)
    }

    pub async fn get_event(&self, event_id: i64) -> Result<Option<Event>> {
        let db = &self.db;
        let model = retry::with_retry(
            &format!("get_event({})", event_id),
            self.retry_config,
            || async { event::Entity::find_by_id(event_id).one(db).await },
        )
        .await?;

        model.map(model_to_event).transpose()
    }

    pub async fn list_events(&self, filter: &EventFilter) -> Result<Vec<Event>> {
        let mut visibility = Condition::any().add(event::Column::IsPrivate.eq(false));
        if let Some(viewer) = &filter.viewer {
            visibility = visibility
                .add(event::Column::CreatorId.eq(viewer.as_str()))
                .add(
                    event::Column::Id.in_subquery(
                        Query::select()
                            .column(event_participant::Column::EventId)
                            .from(event_participant::Entity)
                            .and_where(event_participant::Column::UserId.eq(viewer.as_str()))
                            .to_owned(),
                    ),
                );
        }

        let mut query = event::Entity::find().filter(visibility);
        if let Some(status) = filter.status {
            query = query.filter(event::Column::Status.eq(status.as_ref()));
        }
        if let Some(category) = &filter.category {
            query = query.filter(event::Column::Category.eq(category.to_lowercase()));
        }

        let models = query
            .order_by_desc(event::Column::CreatedAt)
            .order_by_desc(event::Column::Id)
            .limit(filter.limit)
            .all(&self.db)
            .await?;

        convert_all(models, model_to_event)
    }

    pub async fn get_participants(&self, event_id: i64) -> Result<Vec<EventParticipant>> {
        load_participants(&self.db, event_id).await
    }

    pub async fn get_participant(
        &self,
        event_id: i64,
        user_id: &str,
    ) -> Result<Option<EventParticipant>> {
        event_participant::Entity::find()
            .filter(event_participant::Column::EventId.eq(event_id))
            .filter(event_participant::Column::UserId.eq(user_id))
            .one(&self.db)
            .await?
            .map(model_to_participant)
            .transpose()
    }

    /// Stake on an event: debit, participant row and pool growth commit together
    pub async fn join_event(
        &self,
        event_id: i64,
        user_id: &str,
        prediction: Prediction,
        amount: i64,
        now: DateTime<Utc>,
    ) -> Result<(Event, EventParticipant)> {
        let txn = self.db.begin().await?;

        let event = lock_event(&txn, event_id).await?;
        if !event.is_joinable(now) {
            return Err(BantahError::conflict(
                "Event is no longer accepting participants",
            ));
        }
        if amount < event.entry_fee {
            return Err(BantahError::validation(format!(
                "Minimum stake for this event is {}",
                event.entry_fee
            )));
        }

        let already_joined = event_participant::Entity::find()
            .filter(event_participant::Column::EventId.eq(event_id))
            .filter(event_participant::Column::UserId.eq(user_id))
            .count(&txn)
            .await?;
        if already_joined > 0 {
            return Err(BantahError::conflict("You have already joined this event"));
        }

        if let Some(max) = event.max_participants {
            // Locking read: sees joins committed while we waited on the event row
            let joined: Vec<i64> = event_participant::Entity::find()
                .select_only()
                .column(event_participant::Column::Id)
                .filter(event_participant::Column::EventId.eq(event_id))
                .lock_shared()
                .into_tuple()
                .all(&txn)
                .await?;
            if joined.len() >= max as usize {
                return Err(BantahError::conflict("Event is full"));
            }
        }

        wallets::debit(
            &txn,
            user_id,
            amount,
            TransactionKind::Stake,
            &event_reference(event_id),
        )
        .await?;

        let participant = event_participant::ActiveModel {
            event_id: Set(event_id),
            user_id: Set(user_id.to_string()),
            prediction: Set(prediction.as_ref().to_string()),
            amount: Set(amount),
            payout: Set(None),
            joined_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        let pool = match prediction {
            Prediction::Yes => event::Column::YesPool,
            Prediction::No => event::Column::NoPool,
        };
        let result = event::Entity::update_many()
            .col_expr(pool, Expr::col(pool).add(amount))
            .filter(event::Column::Id.eq(event_id))
            .filter(event::Column::Status.eq(EventStatus::Open.as_ref()))
            .exec(&txn)
            .await?;
        if result.rows_affected == 0 {
            return Err(BantahError::conflict(
                "Event is no longer accepting participants",
            ));
        }

        let event = load_event(&txn, event_id).await?;
        txn.commit().await?;

        info!(
            "User {} joined event #{} with {} on {}",
            user_id, event_id, amount, prediction
        );
        Ok((event, model_to_participant(participant)?))
    }

    /// Move every open event past its end date to `closed`
    pub async fn close_due_events(&self, now: DateTime<Utc>) -> Result<Vec<Event>> {
        let due = event::Entity::find()
            .filter(event::Column::Status.eq(EventStatus::Open.as_ref()))
            .filter(event::Column::EndDate.lte(now))
            .all(&self.db)
            .await?;

        let mut closed = Vec::with_capacity(due.len());
        for model in due {
            let result = event::Entity::update_many()
                .col_expr(
                    event::Column::Status,
                    Expr::value(EventStatus::Closed.as_ref()),
                )
                .filter(event::Column::Id.eq(model.id))
                .filter(event::Column::Status.eq(EventStatus::Open.as_ref()))
                .exec(&self.db)
                .await?;
            if result.rows_affected == 1 {
                let mut event = model_to_event(model)?;
                event.status = EventStatus::Closed;
                closed.push(event);
            }
        }
        Ok(closed)
    }

    /// Open events ending in `(now, until]` that have not been flagged yet
    pub async fn events_ending_between(
        &self,
        now: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<Event>> {
        let models = event::Entity::find()
            .filter(event::Column::Status.eq(EventStatus::Open.as_ref()))
            .filter(event::Column::EndDate.gt(now))
            .filter(event::Column::EndDate.lte(until))
            .filter(event::Column::EndingSoonNotified.eq(false))
            .order_by_asc(event::Column::EndDate)
            .all(&self.db)
            .await?;
        convert_all(models, model_to_event)
    }

    /// Set the ending-soon flag. Returns false if another worker got there first.
    pub async fn mark_ending_soon_notified(&self, event_id: i64) -> Result<bool> {
        let result = event::Entity::update_many()
            .col_expr(event::Column::EndingSoonNotified, Expr::value(true))
            .filter(event::Column::Id.eq(event_id))
            .filter(event::Column::EndingSoonNotified.eq(false))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected == 1)
    }

    /// Resolve (`Some(outcome)`) or cancel (`None`) an event and pay out the pool.
    pub async fn settle_event(
        &self,
        event_id: i64,
        outcome: Option<Prediction>,
        fee_bps: u32,
        now: DateTime<Utc>,
    ) -> Result<(Event, EventSettlement)> {
        let txn = self.db.begin().await?;

        let event = load_event(&txn, event_id).await?;
        if !matches!(event.status, EventStatus::Open | EventStatus::Closed) {
            return Err(BantahError::conflict(format!(
                "Event {} is already {}",
                event_id, event.status
            )));
        }

        let next = if outcome.is_some() {
            EventStatus::Resolved
        } else {
            EventStatus::Cancelled
        };
        let result = event::Entity::update_many()
            .col_expr(event::Column::Status, Expr::value(next.as_ref()))
            .col_expr(
                event::Column::Outcome,
                Expr::value(outcome.map(|o| o.as_ref().to_string())),
            )
            .col_expr(event::Column::ResolvedAt, Expr::value(Some(now)))
            .filter(event::Column::Id.eq(event_id))
            .filter(event::Column::Status.is_in([
                EventStatus::Open.as_ref(),
                EventStatus::Closed.as_ref(),
            ]))
            .exec(&txn)
            .await?;
        if result.rows_affected == 0 {
            return Err(BantahError::conflict(format!(
                "Event {} was settled concurrently",
                event_id
            )));
        }

        let participants = load_participants(&txn, event_id).await?;
        let settlement = match outcome {
            Some(outcome) => EventSettlement::compute(&participants, outcome, fee_bps),
            None => EventSettlement::refund_all(&participants),
        };

        let reference = event_reference(event_id);
        for payout in &settlement.payouts {
            if payout.payout > 0 {
                let kind = if payout.won {
                    TransactionKind::Payout
                } else {
                    TransactionKind::Refund
                };
                wallets::credit(&txn, &payout.user_id, payout.payout, 0, kind, Some(&reference))
                    .await?;
            }

            event_participant::Entity::update_many()
                .col_expr(event_participant::Column::Payout, Expr::value(Some(payout.payout)))
                .filter(event_participant::Column::Id.eq(payout.participant_id))
                .exec(&txn)
                .await?;

            if payout.won {
                users::add_win(&txn, &payout.user_id, payout.payout).await?;
            }
        }

        let event = load_event(&txn, event_id).await?;
        txn.commit().await?;

        info!(
            "Event #{} {}: pool {}, fee {}, {} participants",
            event_id,
            next,
            settlement.total_pool,
            settlement.fee,
            settlement.payouts.len()
        );
        Ok((event, settlement))
    }
}
