//! Peer-to-peer challenges
//!
//! Storage owns the money movement and status compare-and-set. This layer
//! validates requests, resolves usernames and fans results out to
//! notifications and the channel.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use ts_rs::TS;

use super::events::{normalize_category, validate_title};
use super::{LeaderboardService, NotificationService, UserService};
use crate::config::{GameConfig, TS_EXPORT_PATH};
use crate::errors::{BantahError, Result};
use crate::storage::{
    Challenge, ChallengeResult, ChallengeSettlement, ChallengeStatus, ChallengeTransition,
    NewChallenge, NotificationPayload, SeaOrmStorage,
};
use crate::telegram::{ChannelBroadcaster, ChannelPost};

#[derive(Debug, Clone, Deserialize, TS)]
#[ts(export, export_to = TS_EXPORT_PATH)]
pub struct CreateChallengeRequest {
    /// User id or username of the opponent; absent for an open challenge
    #[serde(default)]
    pub challenged: Option<String>,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    pub stake_amount: i64,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, TS)]
#[ts(export, export_to = TS_EXPORT_PATH)]
pub struct ChallengeResolution {
    pub challenge: Challenge,
    pub winner_id: Option<String>,
    pub payouts: Vec<(String, i64)>,
}

pub struct ChallengeService {
    storage: Arc<SeaOrmStorage>,
    users: Arc<UserService>,
    notifications: Arc<NotificationService>,
    leaderboard: Arc<LeaderboardService>,
    broadcaster: Arc<dyn ChannelBroadcaster>,
    game: GameConfig,
}

impl ChallengeService {
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

    pub async fn create_challenge(
        &self,
        creator_id: &str,
        req: CreateChallengeRequest,
    ) -> Result<Challenge> {
        let title = validate_title(&req.title, self.game.max_title_len)?;
        if req.stake_amount < self.game.min_stake {
            return Err(BantahError::validation(format!(
                "Minimum stake is {}",
                self.game.min_stake
            )));
        }
        if let Some(due) = req.due_date
            && due <= Utc::now()
        {
            return Err(BantahError::validation("Due date must be in the future"));
        }

        let creator = self.users.get_user(creator_id).await?;
        let challenged = match req.challenged.as_deref().map(str::trim) {
            Some(needle) if !needle.is_empty() => Some(self.users.resolve(needle).await?),
            _ => None,
        };
        if challenged.as_ref().is_some_and(|c| c.id == creator.id) {
            return Err(BantahError::validation("You cannot challenge yourself"));
        }

        let challenge = self
            .storage
            .create_challenge(NewChallenge {
                creator_id: creator.id.clone(),
                challenged_id: challenged.as_ref().map(|u| u.id.clone()),
                title,
                description: req
                    .description
                    .map(|d| d.trim().to_string())
                    .filter(|d| !d.is_empty()),
                category: normalize_category(req.category.as_deref()),
                stake_amount: req.stake_amount,
                due_date: req.due_date,
            })
            .await?;

        if let Some(opponent) = &challenged {
            self.notifications
                .dispatch(
                    &opponent.id,
                    NotificationPayload::ChallengeReceived {
                        challenge_id: challenge.id,
                        title: challenge.title.clone(),
                        challenger: creator.handle(),
                        stake_amount: challenge.stake_amount,
                        category: challenge.category.clone(),
                        description: challenge.description.clone(),
                        due_date: challenge.due_date,
                    },
                )
                .await;
        }

        self.broadcast(ChannelPost::Challenge {
            challenge: challenge.clone(),
            challenger: creator.handle(),
            challenged: challenged.as_ref().map(|u| u.handle()),
        })
        .await;

        Ok(challenge)
    }

    pub async fn get(&self, challenge_id: i64) -> Result<Challenge> {
        self.storage
            .get_challenge(challenge_id)
            .await?
            .ok_or_else(|| BantahError::not_found(format!("Challenge {} not found", challenge_id)))
    }

    pub async fn accept(&self, user_id: &str, challenge_id: i64) -> Result<Challenge> {
        let challenge = self
            .storage
            .accept_challenge(challenge_id, user_id, Utc::now())
            .await?;

        let challenger = self.users.handle_of(&challenge.creator_id).await;
        let acceptor = self.users.handle_of(user_id).await;

        self.notifications
            .dispatch(
                &challenge.creator_id,
                NotificationPayload::ChallengeAccepted {
                    challenge_id,
                    title: challenge.title.clone(),
                    opponent: acceptor.clone(),
                    stake_amount: challenge.stake_amount,
                },
            )
            .await;

        self.broadcast(ChannelPost::Matchmaking {
            challenge: challenge.clone(),
            challenger,
            challenged: acceptor,
        })
        .await;

        Ok(challenge)
    }

    pub async fn decline(&self, user_id: &str, challenge_id: i64) -> Result<Challenge> {
        let challenge = self
            .storage
            .close_pending_challenge(
                challenge_id,
                Some(user_id),
                ChallengeTransition::Decline,
                Utc::now(),
            )
            .await?;

        let opponent = self.users.handle_of(user_id).await;
        self.notifications
            .dispatch(
                &challenge.creator_id,
                NotificationPayload::ChallengeDeclined {
                    challenge_id,
                    title: challenge.title.clone(),
                    opponent,
                    refund: challenge.stake_amount,
                },
            )
            .await;
        Ok(challenge)
    }

    pub async fn cancel(&self, user_id: &str, challenge_id: i64) -> Result<Challenge> {
        let challenge = self
            .storage
            .close_pending_challenge(
                challenge_id,
                Some(user_id),
                ChallengeTransition::Cancel,
                Utc::now(),
            )
            .await?;

        if let Some(challenged) = &challenge.challenged_id {
            let challenger = self.users.handle_of(user_id).await;
            self.notifications
                .dispatch(
                    challenged,
                    NotificationPayload::ChallengeCancelled {
                        challenge_id,
                        title: challenge.title.clone(),
                        challenger,
                    },
                )
                .await;
        }
        Ok(challenge)
    }

    pub async fn resolve(
        &self,
        admin_id: &str,
        challenge_id: i64,
        result: ChallengeResult,
    ) -> Result<ChallengeResolution> {
        self.users.require_admin(admin_id).await?;

        let current = self.get(challenge_id).await?;
        let parties: Vec<String> = std::iter::once(current.creator_id.clone())
            .chain(current.challenged_id.clone())
            .collect();
        let ranks_before = self.leaderboard.snapshot(&parties).await?;

        let (challenge, settlement) = self
            .storage
            .resolve_challenge(challenge_id, result, Utc::now())
            .await?;

        for user_id in &parties {
            self.notifications
                .dispatch(
                    user_id,
                    NotificationPayload::ChallengeResult {
                        challenge_id,
                        title: challenge.title.clone(),
                        outcome: settlement.outcome_for(user_id),
                        payout: settlement.credit_for(user_id),
                    },
                )
                .await;
        }

        self.broadcast_result(&challenge, &settlement).await;

        if let Some(winner) = &settlement.winner_id {
            self.leaderboard
                .announce_climbers(&ranks_before, std::slice::from_ref(winner))
                .await;
        }

        Ok(ChallengeResolution {
            challenge,
            winner_id: settlement.winner_id,
            payouts: settlement.credits,
        })
    }

    /// Expire pending challenges past their due date, or older than
    /// `pending_ttl` when they have none. Returns the number expired.
    pub async fn expire_pending(&self, now: DateTime<Utc>, pending_ttl: Duration) -> Result<usize> {
        let due = self
            .storage
            .pending_challenges_due(now, now - pending_ttl)
            .await?;

        let mut expired = 0;
        for candidate in due {
            let Some(challenge) = self.storage.expire_challenge(candidate.id, now).await? else {
                continue;
            };
            self.notifications
                .dispatch(
                    &challenge.creator_id,
                    NotificationPayload::ChallengeExpired {
                        challenge_id: challenge.id,
                        title: challenge.title.clone(),
                        refund: challenge.stake_amount,
                    },
                )
                .await;
            expired += 1;
        }
        Ok(expired)
    }

    pub async fn list_for_user(
        &self,
        user_id: &str,
        active_only: bool,
        limit: u64,
    ) -> Result<Vec<Challenge>> {
        let statuses: &[ChallengeStatus] = if active_only {
            &[ChallengeStatus::Pending, ChallengeStatus::Active]
        } else {
            &[]
        };
        self.storage
            .list_challenges_for_user(user_id, statuses, limit)
            .await
    }

    pub async fn count_active(&self, user_id: &str) -> Result<u64> {
        self.storage.count_active_challenges(user_id).await
    }

    async fn broadcast_result(&self, challenge: &Challenge, settlement: &ChallengeSettlement) {
        let challenger = self.users.handle_of(&challenge.creator_id).await;
        let challenged = match &challenge.challenged_id {
            Some(id) => self.users.handle_of(id).await,
            None => return,
        };
        let (winner, loser, draw) = match settlement.result {
            ChallengeResult::ChallengerWins => (challenger, challenged, false),
            ChallengeResult::ChallengedWins => (challenged, challenger, false),
            ChallengeResult::Draw => (challenger, challenged, true),
        };
        self.broadcast(ChannelPost::ChallengeResult {
            challenge: challenge.clone(),
            winner,
            loser,
            draw,
        })
        .await;
    }

    async fn broadcast(&self, post: ChannelPost) {
        let kind = post.kind();
        if let Err(e) = self.broadcaster.broadcast(post).await {
            warn!("Failed to queue {} broadcast: {}", kind, e);
        }
    }
}
