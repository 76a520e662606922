//! Public channel broadcasts
//!
//! Services hand a [`ChannelPost`] to a [`ChannelBroadcaster`]. In production
//! that is a [`BroadcastQueue`] in front of a [`TelegramBroadcaster`], so a
//! slow or failing Telegram never delays an API response.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::client::TelegramApi;
use super::format;
use super::types::ChatId;
use crate::config::FrontendConfig;
use crate::errors::Result;
use crate::storage::models::{Challenge, Event};

/// Something worth announcing in the public channel
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelPost {
    Event {
        event: Event,
        creator: String,
    },
    Challenge {
        challenge: Challenge,
        challenger: String,
        challenged: Option<String>,
    },
    /// A challenge was accepted and the match is on
    Matchmaking {
        challenge: Challenge,
        challenger: String,
        challenged: String,
    },
    ChallengeResult {
        challenge: Challenge,
        winner: String,
        loser: String,
        draw: bool,
    },
    Leaderboard {
        player: String,
        new_rank: u64,
        old_rank: Option<u64>,
        total_wins: i64,
        total_earnings: i64,
        achievement: Option<String>,
    },
    /// Free-form admin message, sent as-is
    Custom {
        text: String,
    },
}

impl ChannelPost {
    pub fn kind(&self) -> &'static str {
        match self {
            ChannelPost::Event { .. } => "event",
            ChannelPost::Challenge { .. } => "challenge",
            ChannelPost::Matchmaking { .. } => "matchmaking",
            ChannelPost::ChallengeResult { .. } => "challenge_result",
            ChannelPost::Leaderboard { .. } => "leaderboard",
            ChannelPost::Custom { .. } => "custom",
        }
    }

    pub fn render(&self, frontend: &FrontendConfig) -> String {
        let now = Utc::now();
        match self {
            ChannelPost::Event { event, creator } => {
                format::event_broadcast(event, creator, &frontend.event_url(event.id), now)
            }
            ChannelPost::Challenge {
                challenge,
                challenger,
                challenged,
            } => format::challenge_broadcast(
                challenge,
                challenger,
                challenged.as_deref(),
                &frontend.challenge_url(challenge.id),
                now,
            ),
            ChannelPost::Matchmaking {
                challenge,
                challenger,
                challenged,
            } => format::matchmaking_broadcast(challenge, challenger, challenged),
            ChannelPost::ChallengeResult {
                challenge,
                winner,
                loser,
                draw,
            } => format::challenge_result_broadcast(challenge, winner, loser, *draw),
            ChannelPost::Leaderboard {
                player,
                new_rank,
                old_rank,
                total_wins,
                total_earnings,
                achievement,
            } => format::leaderboard_broadcast(
                player,
                *new_rank,
                *old_rank,
                *total_wins,
                *total_earnings,
                achievement.as_deref(),
            ),
            ChannelPost::Custom { text } => text.clone(),
        }
    }
}

#[async_trait]
pub trait ChannelBroadcaster: Send + Sync {
    async fn broadcast(&self, post: ChannelPost) -> Result<()>;
}

/// Posts rendered messages to the configured channel
pub struct TelegramBroadcaster {
    api: Arc<dyn TelegramApi>,
    channel: ChatId,
    frontend: FrontendConfig,
}

impl TelegramBroadcaster {
    pub fn new(api: Arc<dyn TelegramApi>, channel: ChatId, frontend: FrontendConfig) -> Self {
        Self {
            api,
            channel,
            frontend,
        }
    }
}

#[async_trait]
impl ChannelBroadcaster for TelegramBroadcaster {
    async fn broadcast(&self, post: ChannelPost) -> Result<()> {
        let text = post.render(&self.frontend);
        match self.api.send_message(&self.channel, &text, None).await {
            Ok(_) => {
                info!("Broadcast {} post to channel {}", post.kind(), self.channel);
                Ok(())
            }
            Err(e) => {
                if e.message().contains("chat not found") {
                    error!(
                        "Channel {} not found. Check TELEGRAM_CHANNEL_ID (-100… or @name) \
                         and make sure the bot is an admin of the channel",
                        self.channel
                    );
                }
                Err(e)
            }
        }
    }
}

/// Used when the bot or the channel is not configured
pub struct NoopBroadcaster;

#[async_trait]
impl ChannelBroadcaster for NoopBroadcaster {
    async fn broadcast(&self, post: ChannelPost) -> Result<()> {
        debug!("Channel broadcasting disabled, dropping {} post", post.kind());
        Ok(())
    }
}

/// Bounded queue drained by a single worker task
pub struct BroadcastQueue {
    sender: mpsc::Sender<ChannelPost>,
}

impl BroadcastQueue {
    /// Start the worker. It exits when shutdown is signalled or every
    /// queue handle has been dropped.
    pub fn spawn(
        inner: Arc<dyn ChannelBroadcaster>,
        capacity: usize,
        mut shutdown: watch::Receiver<bool>,
    ) -> (Self, JoinHandle<()>) {
        let (sender, mut receiver) = mpsc::channel::<ChannelPost>(capacity.max(1));

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    post = receiver.recv() => {
                        let Some(post) = post else { break };
                        let kind = post.kind();
                        if let Err(e) = inner.broadcast(post).await {
                            warn!("Failed to broadcast {} post: {}", kind, e);
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
            debug!("Broadcast queue worker stopped");
        });

        (Self { sender }, handle)
    }
}

#[async_trait]
impl ChannelBroadcaster for BroadcastQueue {
    async fn broadcast(&self, post: ChannelPost) -> Result<()> {
        match self.sender.try_send(post) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(post)) => {
                warn!("Broadcast queue full, dropping {} post", post.kind());
            }
            Err(mpsc::error::TrySendError::Closed(post)) => {
                warn!("Broadcast queue closed, dropping {} post", post.kind());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct Recorder {
        posts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ChannelBroadcaster for Recorder {
        async fn broadcast(&self, post: ChannelPost) -> Result<()> {
            self.posts.lock().unwrap().push(post.kind().to_string());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_queue_forwards_posts() {
        let recorder = Arc::new(Recorder::default());
        let (_tx, rx) = watch::channel(false);
        let (queue, _handle) = BroadcastQueue::spawn(recorder.clone(), 8, rx);

        queue
            .broadcast(ChannelPost::Custom {
                text: "hello".to_string(),
            })
            .await
            .unwrap();

        for _ in 0..50 {
            if !recorder.posts.lock().unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(*recorder.posts.lock().unwrap(), vec!["custom".to_string()]);
    }

    /// Holds every post until released, so the queue can be filled
    struct Gate {
        started: tokio::sync::Notify,
        release: tokio::sync::Semaphore,
        recorder: Recorder,
    }

    #[async_trait]
    impl ChannelBroadcaster for Gate {
        async fn broadcast(&self, post: ChannelPost) -> Result<()> {
            self.started.notify_one();
            if let Ok(permit) = self.release.acquire().await {
                permit.forget();
            }
            self.recorder.broadcast(post).await
        }
    }

    fn custom(text: &str) -> ChannelPost {
        ChannelPost::Custom {
            text: text.to_string(),
        }
    }

    #[tokio::test]
    async fn test_full_queue_drops_posts() {
        let gate = Arc::new(Gate {
            started: tokio::sync::Notify::new(),
            release: tokio::sync::Semaphore::new(0),
            recorder: Recorder::default(),
        });
        let (_tx, rx) = watch::channel(false);
        let (queue, _handle) = BroadcastQueue::spawn(gate.clone(), 1, rx);

        // The worker takes the first post and blocks on it
        queue.broadcast(custom("first")).await.unwrap();
        gate.started.notified().await;

        // One slot left in the channel; the third post does not fit
        queue.broadcast(custom("second")).await.unwrap();
        queue.broadcast(custom("third")).await.unwrap();

        gate.release.add_permits(3);
        for _ in 0..50 {
            if gate.recorder.posts.lock().unwrap().len() >= 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(gate.recorder.posts.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_worker_stops_on_shutdown() {
        let (tx, rx) = watch::channel(false);
        let (_queue, handle) = BroadcastQueue::spawn(Arc::new(NoopBroadcaster), 8, rx);
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("worker should stop")
            .unwrap();
    }

    #[test]
    fn test_custom_post_renders_verbatim() {
        let frontend = FrontendConfig {
            url: "https://bantah.app".to_string(),
        };
        let post = ChannelPost::Custom {
            text: "*Maintenance* tonight".to_string(),
        };
        assert_eq!(post.render(&frontend), "*Maintenance* tonight");
    }
}
