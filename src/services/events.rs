//! Prediction events: creation, staking, lifecycle and settlement

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use ts_rs::TS;

use super::{LeaderboardService, NotificationService, UserService};
use crate::config::{GameConfig, TS_EXPORT_PATH};
use crate::errors::{BantahError, Result};
use crate::storage::{
    Event, EventFilter, EventParticipant, EventSettlement, EventStatus, NewEvent,
    NotificationPayload, Prediction, SeaOrmStorage,
};
use crate::telegram::{ChannelBroadcaster, ChannelPost};

pub const DEFAULT_CATEGORY: &str = "general";

#[derive(Debug, Clone, Deserialize, TS)]
#[ts(export, export_to = TS_EXPORT_PATH)]
pub struct CreateEventRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    pub entry_fee: i64,
    #[serde(default)]
    pub max_participants: Option<i32>,
    #[serde(default)]
    pub is_private: bool,
    pub end_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, TS)]
#[ts(export, export_to = TS_EXPORT_PATH)]
pub struct JoinEventRequest {
    pub prediction: Prediction,
    pub amount: i64,
}

/// An event with its participants
#[derive(Debug, Clone, Serialize, TS)]
#[ts(export, export_to = TS_EXPORT_PATH)]
pub struct EventDetails {
    pub event: Event,
    pub participants: Vec<EventParticipant>,
}

/// Trimmed, non-empty and at most `max_len` characters
pub fn validate_title(title: &str, max_len: usize) -> Result<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(BantahError::validation("Title is required"));
    }
    if title.chars().count() > max_len {
        return Err(BantahError::validation(format!(
            "Title must be at most {} characters",
            max_len
        )));
    }
    Ok(title.to_string())
}

pub fn normalize_category(category: Option<&str>) -> String {
    match category.map(str::trim).filter(|c| !c.is_empty()) {
        Some(c) => c.to_lowercase(),
        None => DEFAULT_CATEGORY.to_string(),
    }
}

fn non_empty(text: Option<String>) -> Option<String> {
    text.map(|t| t.trim().to_string()).filter(|t| !t.is_empty())
}

pub struct EventService {
    storage: Arc<SeaOrmStorage>,
    users: Arc<UserService>,
    notifications: Arc<NotificationService>,
    leaderboard: Arc<LeaderboardService>,
    broadcaster: Arc<dyn ChannelBroadcaster>,
    game: GameConfig,
}

impl EventService {
    pub fn new(
        storage: Arc<SeaOrmStorage>,
        users: Arc<UserService>,
        notifications: Arc<NotificationService>,
        leaderboard: Arc<LeaderboardService>,
        broadcaster: Arc<dyn ChannelBroadcaster>,
        game: GameConfig,
    ) -> Self {
        Self {
            storage,
            users,
            notifications,
            leaderboard,
            broadcaster,
            game,
        }
    }

    pub async fn create_event(&self, creator_id: &str, req: CreateEventRequest) -> Result<Event> {
        let title = validate_title(&req.title, self.game.max_title_len)?;
        if req.entry_fee <= 0 {
            return Err(BantahError::validation("Entry fee must be positive"));
        }
        if req.end_date <= Utc::now() {
            return Err(BantahError::validation("End date must be in the future"));
        }
        if let Some(max) = req.max_participants
            && max < 2
        {
            return Err(BantahError::validation(
                "An event needs room for at least 2 participants",
            ));
        }

        let creator = self.users.get_user(creator_id).await?;
        let event = self
            .storage
            .insert_event(NewEvent {
                creator_id: creator.id.clone(),
                title,
                description: non_empty(req.description),
                category: normalize_category(req.category.as_deref()),
                entry_fee: req.entry_fee,
                max_participants: req.max_participants,
                is_private: req.is_private,
                end_date: req.end_date,
            })
            .await?;

        if !event.is_private {
            self.broadcast(ChannelPost::Event {
                event: event.clone(),
                creator: creator.handle(),
            })
            .await;
        }
        Ok(event)
    }

    pub async fn join_event(
        &self,
        user_id: &str,
        event_id: i64,
        prediction: Prediction,
        amount: i64,
    ) -> Result<EventParticipant> {
        if amount <= 0 {
            return Err(BantahError::validation("Stake must be positive"));
        }
        let (_, participant) = self
            .storage
            .join_event(event_id, user_id, prediction, amount, Utc::now())
            .await?;
        Ok(participant)
    }

    pub async fn list_events(
        &self,
        viewer: Option<&str>,
        status: Option<EventStatus>,
        category: Option<&str>,
        limit: u64,
    ) -> Result<Vec<Event>> {
        self.storage
            .list_events(&EventFilter {
                viewer: viewer.map(str::to_string),
                status,
                category: category.map(|c| c.trim().to_lowercase()),
                limit,
            })
            .await
    }

    /// Private events look missing to anyone who neither created nor joined them
    pub async fn get_event(&self, viewer: Option<&str>, event_id: i64) -> Result<EventDetails> {
        let not_found = || BantahError::not_found(format!("Event {} not found", event_id));
        let event = self.storage.get_event(event_id).await?.ok_or_else(not_found)?;
        let participants = self.storage.get_participants(event_id).await?;

        if event.is_private {
            let allowed = viewer.is_some_and(|v| {
                event.creator_id == v || participants.iter().any(|p| p.user_id == v)
            });
            if !allowed {
                return Err(not_found());
            }
        }
        Ok(EventDetails {
            event,
            participants,
        })
    }

    /// Close open events past their end date. Returns the number closed.
    pub async fn close_due_events(&self, now: DateTime<Utc>) -> Result<usize> {
        let closed = self.storage.close_due_events(now).await?;
        for event in &closed {
            info!("Event #{} closed for predictions", event.id);
            for participant in self.storage.get_participants(event.id).await? {
                self.notifications
                    .dispatch(
                        &participant.user_id,
                        NotificationPayload::EventClosed {
                            event_id: event.id,
                            title: event.title.clone(),
                        },
                    )
                    .await;
            }
        }
        Ok(closed.len())
    }

    /// Warn participants of events closing within `window`, once per event
    pub async fn notify_ending_soon(&self, now: DateTime<Utc>, window: Duration) -> Result<usize> {
        let mut notified = 0;
        for event in self.storage.events_ending_between(now, now + window).await? {
            if !self.storage.mark_ending_soon_notified(event.id).await? {
                continue;
            }
            for participant in self.storage.get_participants(event.id).await? {
                self.notifications
                    .dispatch(
                        &participant.user_id,
                        NotificationPayload::EventEndingSoon {
                            event_id: event.id,
                            title: event.title.clone(),
                            end_date: event.end_date,
                        },
                    )
                    .await;
            }
            notified += 1;
        }
        Ok(notified)
    }

    pub async fn resolve_event(
        &self,
        admin_id: &str,
        event_id: i64,
        outcome: Prediction,
    ) -> Result<(Event, EventSettlement)> {
        self.users.require_admin(admin_id).await?;

        let participant_ids: Vec<String> = self
            .storage
            .get_participants(event_id)
            .await?
            .into_iter()
            .map(|p| p.user_id)
            .collect();
        let ranks_before = self.leaderboard.snapshot(&participant_ids).await?;

        let (event, settlement) = self
            .storage
            .settle_event(
                event_id,
                Some(outcome),
                self.game.platform_fee_bps,
                Utc::now(),
            )
            .await?;

        for payout in &settlement.payouts {
            self.notifications
                .dispatch(
                    &payout.user_id,
                    NotificationPayload::EventResult {
                        event_id,
                        title: event.title.clone(),
                        outcome,
                        won: payout.won,
                        refunded: payout.refunded,
                        payout: payout.payout,
                    },
                )
                .await;
        }

        let winners: Vec<String> = settlement.winners().map(|p| p.user_id.clone()).collect();
        self.leaderboard
            .announce_climbers(&ranks_before, &winners)
            .await;

        Ok((event, settlement))
    }

    pub async fn cancel_event(&self, admin_id: &str, event_id: i64) -> Result<Event> {
        self.users.require_admin(admin_id).await?;

        let (event, settlement) = self
            .storage
            .settle_event(event_id, None, 0, Utc::now())
            .await?;

        for payout in &settlement.payouts {
            self.notifications
                .dispatch(
                    &payout.user_id,
                    NotificationPayload::EventCancelled {
                        event_id,
                        title: event.title.clone(),
                        refund: payout.payout,
                    },
                )
                .await;
        }
        Ok(event)
    }

    async fn broadcast(&self, post: ChannelPost) {
        let kind = post.kind();
        if let Err(e) = self.broadcaster.broadcast(post).await {
            warn!("Failed to queue {} broadcast: {}", kind, e);
        }
    }
}
