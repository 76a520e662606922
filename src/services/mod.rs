//! Service layer for business logic
//!
//! Services are shared by the HTTP API, the Telegram bot and the scheduled
//! jobs so every entry point applies the same rules.

pub mod challenges;
pub mod events;
mod leaderboard;
mod linking;
mod notifications;
mod users;

use std::sync::Arc;
use std::time::Duration;

pub use challenges::{ChallengeResolution, ChallengeService, CreateChallengeRequest};
pub use events::{CreateEventRequest, EventDetails, EventService, JoinEventRequest};
pub use leaderboard::{LeaderboardService, RankSnapshot, should_announce};
pub use linking::{LinkingService, PendingLink};
pub use notifications::{NotificationList, NotificationService, in_app_text};
pub use users::{Profile, UserService, fallback_username, validate_username};

use crate::config::StaticConfig;
use crate::storage::SeaOrmStorage;
use crate::telegram::ChannelBroadcaster;

/// Every service, wired to one storage and one channel broadcaster
#[derive(Clone)]
pub struct AppServices {
    pub storage: Arc<SeaOrmStorage>,
    pub users: Arc<UserService>,
    pub events: Arc<EventService>,
    pub challenges: Arc<ChallengeService>,
    pub notifications: Arc<NotificationService>,
    pub leaderboard: Arc<LeaderboardService>,
    pub linking: Arc<LinkingService>,
    pub broadcaster: Arc<dyn ChannelBroadcaster>,
}

impl AppServices {
    pub fn new(
        storage: Arc<SeaOrmStorage>,
        broadcaster: Arc<dyn ChannelBroadcaster>,
        config: &StaticConfig,
    ) -> Self {
        let notifications = Arc::new(NotificationService::new(
            storage.clone(),
            config.telegram.enabled(),
        ));
        let users = Arc::new(UserService::new(storage.clone(), notifications.clone()));
        let leaderboard = Arc::new(LeaderboardService::new(
            storage.clone(),
            broadcaster.clone(),
            config.game.leaderboard_broadcast_top,
        ));
        let events = Arc::new(EventService::new(
            storage.clone(),
            users.clone(),
            notifications.clone(),
            leaderboard.clone(),
            broadcaster.clone(),
            config.game.clone(),
        ));
        let challenges = Arc::new(ChallengeService::new(
            storage.clone(),
            users.clone(),
            notifications.clone(),
            leaderboard.clone(),
            broadcaster.clone(),
            config.game.clone(),
        ));
        let linking = Arc::new(LinkingService::new(
            storage.clone(),
            notifications.clone(),
            Duration::from_secs(config.telegram.link_token_ttl_secs),
        ));

        Self {
            storage,
            users,
            events,
            challenges,
            notifications,
            leaderboard,
            linking,
            broadcaster,
        }
    }
}
