//! Global ranking and rank-change announcements

use std::collections::HashMap;
use std::sync::Arc;

use tracing::warn;

use crate::errors::Result;
use crate::storage::{LeaderboardEntry, SeaOrmStorage};
use crate::telegram::{ChannelBroadcaster, ChannelPost};

/// Ranks of a set of users, taken before a settlement
pub type RankSnapshot = HashMap<String, u64>;

pub struct LeaderboardService {
    storage: Arc<SeaOrmStorage>,
    broadcaster: Arc<dyn ChannelBroadcaster>,
    broadcast_top: u64,
}

impl LeaderboardService {
    pub fn new(
        storage: Arc<SeaOrmStorage>,
        broadcaster: Arc<dyn ChannelBroadcaster>,
        broadcast_top: u64,
    ) -> Self {
        Self {
            storage,
            broadcaster,
            broadcast_top,
        }
    }

    pub async fn top(&self, limit: u64) -> Result<Vec<LeaderboardEntry>> {
        let users = self.storage.top_users(limit).await?;
        Ok(users
            .into_iter()
            .enumerate()
            .map(|(i, user)| LeaderboardEntry {
                rank: i as u64 + 1,
                user_id: user.id,
                username: user.username,
                total_wins: user.total_wins,
                total_earnings: user.total_earnings,
            })
            .collect())
    }

    pub async fn rank_of(&self, user_id: &str) -> Result<Option<u64>> {
        self.storage.rank_of(user_id).await
    }

    pub async fn snapshot(&self, user_ids: &[String]) -> Result<RankSnapshot> {
        self.storage.ranks_for(user_ids).await
    }

    /// Broadcast winners who climbed into the top of the board
    pub async fn announce_climbers(&self, before: &RankSnapshot, winners: &[String]) {
        for user_id in winners {
            if let Err(e) = self.announce_one(before.get(user_id).copied(), user_id).await {
                warn!("Failed to announce leaderboard change for {}: {}", user_id, e);
            }
        }
    }

    async fn announce_one(&self, old_rank: Option<u64>, user_id: &str) -> Result<()> {
        let Some(new_rank) = self.storage.rank_of(user_id).await? else {
            return Ok(());
        };
        if !should_announce(old_rank, new_rank, self.broadcast_top) {
            return Ok(());
        }
        let Some(user) = self.storage.get_user(user_id).await? else {
            return Ok(());
        };

        let achievement = (new_rank == 1).then(|| "Reached #1".to_string());
        self.broadcaster
            .broadcast(ChannelPost::Leaderboard {
                player: user.handle(),
                new_rank,
                old_rank,
                total_wins: user.total_wins,
                total_earnings: user.total_earnings,
                achievement,
            })
            .await
    }
}

/// A rank change is news when it lands inside the top `top` and improves on
/// the previous rank
pub fn should_announce(old_rank: Option<u64>, new_rank: u64, top: u64) -> bool {
    new_rank <= top && old_rank.is_none_or(|old| new_rank < old)
}
