//! Domain models shared by storage, services and the HTTP/Telegram layers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use ts_rs::TS;

use crate::config::TS_EXPORT_PATH;

// ============ Enumerations ============

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, Display, EnumString, TS,
)]
#[ts(export, export_to = TS_EXPORT_PATH)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TransactionKind {
    Deposit,
    Stake,
    Payout,
    Refund,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, Display, EnumString, TS,
)]
#[ts(export, export_to = TS_EXPORT_PATH)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EventStatus {
    Open,
    Closed,
    Resolved,
    Cancelled,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, Display, EnumString, TS,
)]
#[ts(export, export_to = TS_EXPORT_PATH)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Prediction {
    Yes,
    No,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, Display, EnumString, TS,
)]
#[ts(export, export_to = TS_EXPORT_PATH)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ChallengeStatus {
    Pending,
    Active,
    Completed,
    Declined,
    Expired,
    Cancelled,
}

impl ChallengeStatus {
    /// Challenges that still hold escrowed funds
    pub fn is_open(&self) -> bool {
        matches!(self, ChallengeStatus::Pending | ChallengeStatus::Active)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, Display, EnumString, TS,
)]
#[ts(export, export_to = TS_EXPORT_PATH)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ChallengeResult {
    ChallengerWins,
    ChallengedWins,
    Draw,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, Display, EnumString, TS,
)]
#[ts(export, export_to = TS_EXPORT_PATH)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DeliveryStatus {
    Pending,
    Sent,
    Skipped,
    Failed,
}

/// Outcome of a settled challenge from one participant's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = TS_EXPORT_PATH)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeOutcome {
    Won,
    Lost,
    Draw,
}

// ============ Records ============

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = TS_EXPORT_PATH)]
pub struct User {
    pub id: String,
    pub username: String,
    pub first_name: Option<String>,
    pub is_admin: bool,
    pub total_wins: i64,
    pub total_earnings: i64,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// `@username`, the handle shown in chats and broadcasts
    pub fn handle(&self) -> String {
        format!("@{}", self.username)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = TS_EXPORT_PATH)]
pub struct Wallet {
    pub user_id: String,
    pub balance: i64,
    pub coins: i64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = TS_EXPORT_PATH)]
pub struct WalletTransaction {
    pub id: i64,
    pub user_id: String,
    pub kind: TransactionKind,
    pub amount: i64,
    pub balance_after: i64,
    pub reference: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = TS_EXPORT_PATH)]
pub struct Event {
    pub id: i64,
    pub creator_id: String,
    pub title: String,
    pub description: Option<String>,
    pub category: String,
    pub entry_fee: i64,
    pub yes_pool: i64,
    pub no_pool: i64,
    pub max_participants: Option<i32>,
    pub is_private: bool,
    pub status: EventStatus,
    pub outcome: Option<Prediction>,
    pub end_date: DateTime<Utc>,
    pub ending_soon_notified: bool,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Event {
    pub fn total_pool(&self) -> i64 {
        self.yes_pool + self.no_pool
    }

    /// Whether new participants may still join at `now`
    pub fn is_joinable(&self, now: DateTime<Utc>) -> bool {
        self.status == EventStatus::Open && self.end_date > now
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = TS_EXPORT_PATH)]
pub struct EventParticipant {
    pub id: i64,
    pub event_id: i64,
    pub user_id: String,
    pub prediction: Prediction,
    pub amount: i64,
    pub payout: Option<i64>,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = TS_EXPORT_PATH)]
pub struct Challenge {
    pub id: i64,
    pub creator_id: String,
    pub challenged_id: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub category: String,
    pub stake_amount: i64,
    pub status: ChallengeStatus,
    pub result: Option<ChallengeResult>,
    pub due_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Challenge {
    pub fn involves(&self, user_id: &str) -> bool {
        self.creator_id == user_id || self.challenged_id.as_deref() == Some(user_id)
    }

    /// The other side of the challenge, if `user_id` is a participant and
    /// an opponent exists
    pub fn opponent_of(&self, user_id: &str) -> Option<&str> {
        if self.creator_id == user_id {
            self.challenged_id.as_deref()
        } else if self.challenged_id.as_deref() == Some(user_id) {
            Some(&self.creator_id)
        } else {
            None
        }
    }

    /// Funds held in escrow once both sides have staked
    pub fn total_pool(&self) -> i64 {
        self.stake_amount * 2
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = TS_EXPORT_PATH)]
pub struct Notification {
    pub id: i64,
    pub user_id: String,
    pub kind: String,
    pub title: String,
    pub message: String,
    pub payload: NotificationPayload,
    pub is_read: bool,
    pub telegram_status: DeliveryStatus,
    pub attempts: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = TS_EXPORT_PATH)]
pub struct TelegramLink {
    pub user_id: String,
    pub telegram_id: i64,
    pub chat_id: i64,
    pub telegram_username: Option<String>,
    pub linked_at: DateTime<Utc>,
}

/// One row of the public leaderboard
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = TS_EXPORT_PATH)]
pub struct LeaderboardEntry {
    pub rank: u64,
    pub user_id: String,
    pub username: String,
    pub total_wins: i64,
    pub total_earnings: i64,
}

/// What the relay bot learns about a linked Telegram user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = TS_EXPORT_PATH)]
#[serde(rename_all = "camelCase")]
pub struct LinkedAccountSummary {
    pub user_id: String,
    pub username: String,
    pub balance: i64,
    pub coins: i64,
    pub active_challenges: u64,
}

/// Body of `GET /api/telegram/user/{telegram_id}`; `user` is null when unlinked
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = TS_EXPORT_PATH)]
pub struct TelegramUserLookup {
    pub user: Option<LinkedAccountSummary>,
}

// ============ Notifications ============

/// Structured notification body, stored as JSON and rendered per channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = TS_EXPORT_PATH)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotificationPayload {
    ChallengeReceived {
        challenge_id: i64,
        title: String,
        challenger: String,
        stake_amount: i64,
        category: String,
        description: Option<String>,
        due_date: Option<DateTime<Utc>>,
    },
    ChallengeAccepted {
        challenge_id: i64,
        title: String,
        opponent: String,
        stake_amount: i64,
    },
    ChallengeDeclined {
        challenge_id: i64,
        title: String,
        opponent: String,
        refund: i64,
    },
    ChallengeCancelled {
        challenge_id: i64,
        title: String,
        challenger: String,
    },
    ChallengeExpired {
        challenge_id: i64,
        title: String,
        refund: i64,
    },
    ChallengeResult {
        challenge_id: i64,
        title: String,
        outcome: ChallengeOutcome,
        payout: i64,
    },
    EventEndingSoon {
        event_id: i64,
        title: String,
        end_date: DateTime<Utc>,
    },
    EventClosed {
        event_id: i64,
        title: String,
    },
    EventResult {
        event_id: i64,
        title: String,
        outcome: Prediction,
        won: bool,
        refunded: bool,
        payout: i64,
    },
    EventCancelled {
        event_id: i64,
        title: String,
        refund: i64,
    },
    PaymentReceived {
        amount: i64,
        coins: i64,
        new_balance: i64,
    },
    AccountLinked {
        telegram_username: Option<String>,
        balance: i64,
    },
}

impl NotificationPayload {
    /// Stable kind string stored alongside the payload
    pub fn kind(&self) -> &'static str {
        match self {
            NotificationPayload::ChallengeReceived { .. } => "challenge_received",
            NotificationPayload::ChallengeAccepted { .. } => "challenge_accepted",
            NotificationPayload::ChallengeDeclined { .. } => "challenge_declined",
            NotificationPayload::ChallengeCancelled { .. } => "challenge_cancelled",
            NotificationPayload::ChallengeExpired { .. } => "challenge_expired",
            NotificationPayload::ChallengeResult { .. } => "challenge_result",
            NotificationPayload::EventEndingSoon { .. } => "event_ending_soon",
            NotificationPayload::EventClosed { .. } => "event_closed",
            NotificationPayload::EventResult { .. } => "event_result",
            NotificationPayload::EventCancelled { .. } => "event_cancelled",
            NotificationPayload::PaymentReceived { .. } => "payment_received",
            NotificationPayload::AccountLinked { .. } => "account_linked",
        }
    }
}

// ============ Settlement ============

/// One participant's share of a settled event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParticipantPayout {
    pub participant_id: i64,
    pub user_id: String,
    pub stake: i64,
    pub payout: i64,
    pub won: bool,
    pub refunded: bool,
}

/// How an event pool is distributed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventSettlement {
    pub outcome: Option<Prediction>,
    pub total_pool: i64,
    pub fee: i64,
    pub payouts: Vec<ParticipantPayout>,
}

impl EventSettlement {
    /// Pari-mutuel split of the pool among participants who picked `outcome`.
    ///
    /// `participants` must be in join order. Shares are rounded down and the
    /// remainder goes to the earliest winner. With no winners every stake is
    /// refunded and no fee is taken.
    pub fn compute(participants: &[EventParticipant], outcome: Prediction, fee_bps: u32) -> Self {
        let total_pool: i64 = participants.iter().map(|p| p.amount).sum();
        let winning_pool: i64 = participants
            .iter()
            .filter(|p| p.prediction == outcome)
            .map(|p| p.amount)
            .sum();

        if winning_pool == 0 {
            let mut settlement = Self::refund_all(participants);
            settlement.outcome = Some(outcome);
            return settlement;
        }

        let fee = (total_pool as i128 * fee_bps.min(10_000) as i128 / 10_000) as i64;
        let distributable = total_pool - fee;

        let mut payouts: Vec<ParticipantPayout> = participants
            .iter()
            .map(|p| {
                let won = p.prediction == outcome;
                let payout = if won {
                    (distributable as i128 * p.amount as i128 / winning_pool as i128) as i64
                } else {
                    0
                };
                ParticipantPayout {
                    participant_id: p.id,
                    user_id: p.user_id.clone(),
                    stake: p.amount,
                    payout,
                    won,
                    refunded: false,
                }
            })
            .collect();

        let paid: i64 = payouts.iter().map(|p| p.payout).sum();
        let remainder = distributable - paid;
        if remainder > 0
            && let Some(first) = payouts.iter_mut().find(|p| p.won)
        {
            first.payout += remainder;
        }

        Self {
            outcome: Some(outcome),
            total_pool,
            fee,
            payouts,
        }
    }

    /// Every participant gets their stake back
    pub fn refund_all(participants: &[EventParticipant]) -> Self {
        Self {
            outcome: None,
            total_pool: participants.iter().map(|p| p.amount).sum(),
            fee: 0,
            payouts: participants
                .iter()
                .map(|p| ParticipantPayout {
                    participant_id: p.id,
                    user_id: p.user_id.clone(),
                    stake: p.amount,
                    payout: p.amount,
                    won: false,
                    refunded: true,
                })
                .collect(),
        }
    }

    pub fn winners(&self) -> impl Iterator<Item = &ParticipantPayout> {
        self.payouts.iter().filter(|p| p.won)
    }
}

/// Funds movement produced by resolving a challenge
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChallengeSettlement {
    pub result: ChallengeResult,
    pub winner_id: Option<String>,
    pub loser_id: Option<String>,
    /// (user id, amount credited)
    pub credits: Vec<(String, i64)>,
}

impl ChallengeSettlement {
    /// Winner takes both stakes; a draw returns each stake.
    ///
    /// Returns `None` when the challenge has no opponent.
    pub fn compute(challenge: &Challenge, result: ChallengeResult) -> Option<Self> {
        let challenged = challenge.challenged_id.clone()?;
        let creator = challenge.creator_id.clone();
        let stake = challenge.stake_amount;

        let settlement = match result {
            ChallengeResult::ChallengerWins => Self {
                result,
                winner_id: Some(creator.clone()),
                loser_id: Some(challenged),
                credits: vec![(creator, stake * 2)],
            },
            ChallengeResult::ChallengedWins => Self {
                result,
                winner_id: Some(challenged.clone()),
                loser_id: Some(creator),
                credits: vec![(challenged, stake * 2)],
            },
            ChallengeResult::Draw => Self {
                result,
                winner_id: None,
                loser_id: None,
                credits: vec![(creator, stake), (challenged, stake)],
            },
        };
        Some(settlement)
    }

    pub fn outcome_for(&self, user_id: &str) -> ChallengeOutcome {
        match (&self.winner_id, self.result) {
            (_, ChallengeResult::Draw) => ChallengeOutcome::Draw,
            (Some(winner), _) if winner == user_id => ChallengeOutcome::Won,
            _ => ChallengeOutcome::Lost,
        }
    }

    pub fn credit_for(&self, user_id: &str) -> i64 {
        self.credits
            .iter()
            .filter(|(id, _)| id == user_id)
            .map(|(_, amount)| *amount)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn participant(id: i64, user: &str, prediction: Prediction, amount: i64) -> EventParticipant {
        EventParticipant {
            id,
            event_id: 1,
            user_id: user.to_string(),
            prediction,
            amount,
            payout: None,
            joined_at: Utc::now(),
        }
    }

    #[test]
    fn test_enum_string_forms() {
        assert_eq!(ChallengeStatus::Pending.as_ref(), "pending");
        assert_eq!(ChallengeResult::ChallengerWins.as_ref(), "challenger_wins");
        assert_eq!(Prediction::from_str("YES").unwrap(), Prediction::Yes);
        assert!(EventStatus::from_str("unknown").is_err());
    }

    #[test]
    fn test_event_settlement_pro_rata() {
        let participants = vec![
            participant(1, "a", Prediction::Yes, 1000),
            participant(2, "b", Prediction::Yes, 2000),
            participant(3, "c", Prediction::No, 3000),
        ];
        let s = EventSettlement::compute(&participants, Prediction::Yes, 0);
        assert_eq!(s.total_pool, 6000);
        assert_eq!(s.fee, 0);
        assert_eq!(s.payouts[0].payout, 2000);
        assert_eq!(s.payouts[1].payout, 4000);
        assert_eq!(s.payouts[2].payout, 0);
        assert!(!s.payouts[2].won);
    }

    #[test]
    fn test_event_settlement_remainder_goes_to_first_winner() {
        let participants = vec![
            participant(1, "a", Prediction::No, 100),
            participant(2, "b", Prediction::No, 100),
            participant(3, "c", Prediction::No, 100),
            participant(4, "d", Prediction::Yes, 100),
        ];
        let s = EventSettlement::compute(&participants, Prediction::No, 0);
        let paid: i64 = s.payouts.iter().map(|p| p.payout).sum();
        assert_eq!(paid, 400);
        assert_eq!(s.payouts[0].payout, 134);
        assert_eq!(s.payouts[1].payout, 133);
        assert_eq!(s.payouts[2].payout, 133);
    }

    #[test]
    fn test_event_settlement_fee_is_deducted() {
        let participants = vec![
            participant(1, "a", Prediction::Yes, 500),
            participant(2, "b", Prediction::No, 500),
        ];
        let s = EventSettlement::compute(&participants, Prediction::Yes, 500);
        assert_eq!(s.fee, 50);
        assert_eq!(s.payouts[0].payout, 950);
    }

    #[test]
    fn test_event_settlement_without_winners_refunds() {
        let participants = vec![
            participant(1, "a", Prediction::No, 300),
            participant(2, "b", Prediction::No, 700),
        ];
        let s = EventSettlement::compute(&participants, Prediction::Yes, 1000);
        assert_eq!(s.fee, 0);
        assert_eq!(s.outcome, Some(Prediction::Yes));
        assert!(s.payouts.iter().all(|p| p.refunded && p.payout == p.stake));
    }

    fn challenge(challenged: Option<&str>) -> Challenge {
        Challenge {
            id: 7,
            creator_id: "alice".to_string(),
            challenged_id: challenged.map(str::to_string),
            title: "FIFA match".to_string(),
            description: None,
            category: "gaming".to_string(),
            stake_amount: 2500,
            status: ChallengeStatus::Active,
            result: None,
            due_date: None,
            created_at: Utc::now(),
            accepted_at: None,
            resolved_at: None,
        }
    }

    #[test]
    fn test_challenge_settlement() {
        let c = challenge(Some("bob"));
        let s = ChallengeSettlement::compute(&c, ChallengeResult::ChallengedWins).unwrap();
        assert_eq!(s.credits, vec![("bob".to_string(), 5000)]);
        assert_eq!(s.outcome_for("bob"), ChallengeOutcome::Won);
        assert_eq!(s.outcome_for("alice"), ChallengeOutcome::Lost);
        assert_eq!(s.credit_for("alice"), 0);

        let draw = ChallengeSettlement::compute(&c, ChallengeResult::Draw).unwrap();
        assert_eq!(draw.credit_for("alice"), 2500);
        assert_eq!(draw.credit_for("bob"), 2500);
        assert_eq!(draw.outcome_for("alice"), ChallengeOutcome::Draw);
    }

    #[test]
    fn test_challenge_settlement_requires_opponent() {
        assert!(ChallengeSettlement::compute(&challenge(None), ChallengeResult::Draw).is_none());
    }

    #[test]
    fn test_opponent_of() {
        let c = challenge(Some("bob"));
        assert_eq!(c.opponent_of("alice"), Some("bob"));
        assert_eq!(c.opponent_of("bob"), Some("alice"));
        assert_eq!(c.opponent_of("carol"), None);
        assert!(c.involves("bob"));
    }

    #[test]
    fn test_payload_kind_matches_serde_tag() {
        let payload = NotificationPayload::PaymentReceived {
            amount: 100,
            coins: 0,
            new_balance: 100,
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["type"], payload.kind());
    }
}
