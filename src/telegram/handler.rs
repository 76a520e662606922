//! Update handling for the main bot
//!
//! Both delivery modes (long polling and the webhook route) feed updates
//! into an [`UpdateHandler`]. [`BotHandler`] is the server-side one with
//! direct access to the services; the relay bot has its own.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::client::TelegramApi;
use super::commands::{
    CallbackAction, ChallengeArgs, ChallengeArgsError, Command, parse_callback, parse_command,
};
use super::format;
use super::keyboards;
use super::types::{CallbackQuery, ChatId, InlineKeyboardMarkup, Message, Update};
use crate::config::FrontendConfig;
use crate::errors::{BantahError, Result};
use crate::services::{AppServices, CreateChallengeRequest, PendingLink};
use crate::storage::ChallengeStatus;

const MY_CHALLENGES_LIMIT: u64 = 10;
const LEADERBOARD_LIMIT: u64 = 10;

#[async_trait]
pub trait UpdateHandler: Send + Sync {
    async fn handle(&self, update: Update) -> Result<()>;
}

pub struct BotHandler {
    api: Arc<dyn TelegramApi>,
    services: AppServices,
    frontend: FrontendConfig,
    bot_username: String,
}

impl BotHandler {
    pub fn new(
        api: Arc<dyn TelegramApi>,
        services: AppServices,
        frontend: FrontendConfig,
        bot_username: String,
    ) -> Self {
        Self {
            api,
            services,
            frontend,
            bot_username,
        }
    }

    async fn reply(
        &self,
        chat_id: i64,
        text: String,
        keyboard: Option<InlineKeyboardMarkup>,
    ) -> Result<()> {
        self.api
            .send_message(&ChatId::from(chat_id), &text, keyboard)
            .await?;
        Ok(())
    }

    async fn linked_user_id(&self, telegram_id: i64) -> Result<Option<String>> {
        self.services
            .linking
            .user_id_for_telegram(telegram_id)
            .await
    }

    // ============ Messages ============

    async fn handle_message(&self, message: Message) -> Result<()> {
        let Some(text) = message.text.as_deref() else {
            return Ok(());
        };
        let Some(from) = message.from.as_ref() else {
            return Ok(());
        };
        let chat_id = message.chat.id;

        let Some(command) = parse_command(text, &self.bot_username) else {
            return self
                .reply(
                    chat_id,
                    format::greeting(),
                    Some(keyboards::open_app(self.frontend.mini_app_url())),
                )
                .await;
        };
        debug!("Command {:?} from Telegram user {}", command, from.id);

        let result = match command {
            Command::Start => {
                self.start(
                    chat_id,
                    PendingLink {
                        telegram_id: from.id,
                        chat_id,
                        username: from.username.clone(),
                        first_name: from.first_name.clone(),
                    },
                )
                .await
            }
            Command::Help => self.reply(chat_id, format::help(), None).await,
            Command::Balance | Command::Wallet => self.balance(chat_id, from.id).await,
            Command::MyChallenges => self.my_challenges(chat_id, from.id).await,
            Command::Challenge(Ok(args)) => self.challenge(chat_id, from.id, args).await,
            Command::Challenge(Err(ChallengeArgsError::Usage)) => {
                self.reply(chat_id, format::invalid_challenge_format(), None)
                    .await
            }
            Command::Challenge(Err(ChallengeArgsError::InvalidAmount)) => {
                self.reply(chat_id, format::invalid_amount(), None).await
            }
            Command::Leaderboard => self.leaderboard(chat_id).await,
            Command::Unknown(_) => self.reply(chat_id, format::help(), None).await,
        };

        if let Err(e) = result {
            warn!("Command failed for Telegram user {}: {}", from.id, e);
            self.reply(chat_id, format::generic_error(), None).await?;
        }
        Ok(())
    }

    async fn start(&self, chat_id: i64, pending: PendingLink) -> Result<()> {
        if self.linked_user_id(pending.telegram_id).await?.is_some() {
            return self.reply(chat_id, format::already_linked(), None).await;
        }

        let first_name = pending.first_name.clone();
        let token = self.services.linking.issue_token(pending).await;
        self.reply(
            chat_id,
            format::welcome_link(&first_name),
            Some(keyboards::link_account(&self.frontend, &token)),
        )
        .await
    }

    async fn balance(&self, chat_id: i64, telegram_id: i64) -> Result<()> {
        let Some(user_id) = self.linked_user_id(telegram_id).await? else {
            return self.reply(chat_id, format::not_linked(), None).await;
        };
        let profile = self.services.users.profile(&user_id).await?;
        self.reply(
            chat_id,
            format::balance(
                &profile.user.handle(),
                profile.wallet.balance,
                profile.wallet.coins,
            ),
            Some(keyboards::add_funds(&self.frontend)),
        )
        .await
    }

    async fn my_challenges(&self, chat_id: i64, telegram_id: i64) -> Result<()> {
        let Some(user_id) = self.linked_user_id(telegram_id).await? else {
            return self.reply(chat_id, format::not_linked(), None).await;
        };

        let challenges = self
            .services
            .challenges
            .list_for_user(&user_id, true, MY_CHALLENGES_LIMIT)
            .await?;
        let mut entries = Vec::with_capacity(challenges.len());
        for challenge in challenges {
            let opponent = match challenge.opponent_of(&user_id) {
                Some(id) => self.services.users.handle_of(id).await,
                None if challenge.status == ChallengeStatus::Pending => {
                    "Open challenge".to_string()
                }
                None => "Unknown".to_string(),
            };
            entries.push((challenge, opponent));
        }

        self.reply(chat_id, format::my_challenges(&entries), None)
            .await
    }

    async fn challenge(&self, chat_id: i64, telegram_id: i64, args: ChallengeArgs) -> Result<()> {
        let Some(user_id) = self.linked_user_id(telegram_id).await? else {
            return self.reply(chat_id, format::not_linked(), None).await;
        };

        let Some(opponent) = self
            .services
            .users
            .get_user_by_username(&args.opponent)
            .await?
        else {
            return self
                .reply(chat_id, format::user_not_found(&args.opponent), None)
                .await;
        };
        if opponent.id == user_id {
            return self.reply(chat_id, format::self_challenge(), None).await;
        }

        let created = self
            .services
            .challenges
            .create_challenge(
                &user_id,
                CreateChallengeRequest {
                    challenged: Some(opponent.id.clone()),
                    title: args.title,
                    description: None,
                    category: None,
                    stake_amount: args.amount,
                    due_date: None,
                },
            )
            .await;

        match created {
            Ok(challenge) => {
                let challenger = self.services.users.handle_of(&user_id).await;
                self.reply(
                    chat_id,
                    format::challenge_created(
                        &challenge.title,
                        &challenger,
                        &opponent.handle(),
                        challenge.stake_amount,
                    ),
                    Some(keyboards::view_challenge(&self.frontend, challenge.id)),
                )
                .await
            }
            Err(BantahError::InsufficientFunds {
                required,
                available,
            }) => {
                self.reply(
                    chat_id,
                    format::insufficient_funds(required, available),
                    Some(keyboards::add_funds(&self.frontend)),
                )
                .await
            }
            Err(BantahError::Validation(msg)) => {
                self.reply(chat_id, format!("❌ {}", format::escape_markdown(&msg)), None)
                    .await
            }
            Err(e) => Err(e),
        }
    }

    async fn leaderboard(&self, chat_id: i64) -> Result<()> {
        let entries = self.services.leaderboard.top(LEADERBOARD_LIMIT).await?;
        self.reply(chat_id, format::leaderboard_top(&entries), None)
            .await
    }

    // ============ Callback queries ============

    async fn handle_callback(&self, query: CallbackQuery) -> Result<()> {
        let Some(action) = query.data.as_deref().and_then(parse_callback) else {
            debug!("Ignoring callback data {:?}", query.data);
            return self.api.answer_callback_query(&query.id, None, false).await;
        };

        let Some(user_id) = self.linked_user_id(query.from.id).await? else {
            return self
                .api
                .answer_callback_query(&query.id, Some("❌ Account not linked"), true)
                .await;
        };

        let (result, done_text) = match action {
            CallbackAction::Accept(id) => (
                self.services.challenges.accept(&user_id, id).await,
                "✅ Challenge accepted! Good luck!",
            ),
            CallbackAction::Decline(id) => (
                self.services.challenges.decline(&user_id, id).await,
                "❌ Challenge declined",
            ),
        };

        match result {
            Ok(challenge) => {
                info!(
                    "Challenge #{} {} via Telegram by {}",
                    challenge.id, challenge.status, user_id
                );
                if let Some(message) = &query.message
                    && let Err(e) = self
                        .api
                        .edit_message_text(message.chat.id, message.message_id, done_text)
                        .await
                {
                    warn!("Failed to update challenge card: {}", e);
                }
                self.api
                    .answer_callback_query(&query.id, Some(done_text), false)
                    .await
            }
            Err(BantahError::Conflict(_) | BantahError::NotFound(_)) => {
                self.api
                    .answer_callback_query(&query.id, Some("❌ Challenge no longer available"), true)
                    .await
            }
            Err(BantahError::InsufficientFunds {
                required,
                available,
            }) => {
                self.api
                    .answer_callback_query(&query.id, Some("❌ Insufficient funds"), true)
                    .await?;
                let chat_id = query
                    .message
                    .as_ref()
                    .map(|m| m.chat.id)
                    .unwrap_or(query.from.id);
                self.reply(
                    chat_id,
                    format::insufficient_funds(required, available),
                    Some(keyboards::add_funds(&self.frontend)),
                )
                .await
            }
            Err(e) => {
                warn!("Challenge callback failed for {}: {}", user_id, e);
                self.api
                    .answer_callback_query(&query.id, Some("❌ An error occurred"), true)
                    .await
            }
        }
    }
}

#[async_trait]
impl UpdateHandler for BotHandler {
    async fn handle(&self, update: Update) -> Result<()> {
        if let Some(query) = update.callback_query {
            return self.handle_callback(query).await;
        }
        if let Some(message) = update.message {
            return self.handle_message(message).await;
        }
        Ok(())
    }
}
