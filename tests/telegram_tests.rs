//! Telegram linking, bot handler and notification outbox tests

mod common;

use std::sync::Arc;

use bantah::errors::BantahError;
use bantah::services::{CreateChallengeRequest, PendingLink};
use bantah::storage::{ChallengeStatus, DeliveryStatus};
use bantah::telegram::types::{CallbackQuery, Chat, Message, TgUser};
use bantah::telegram::{BotHandler, NotificationOutbox, OutboxStats, Update, UpdateHandler};

use common::{FakeTelegramApi, TestEnv, setup, setup_with_bot};

const ALICE_TG: i64 = 1001;
const BOB_TG: i64 = 2002;

fn pending(telegram_id: i64, username: &str) -> PendingLink {
    PendingLink {
        telegram_id,
        chat_id: telegram_id,
        username: Some(username.to_string()),
        first_name: username.to_string(),
    }
}

fn tg_user(id: i64, username: &str) -> TgUser {
    TgUser {
        id,
        is_bot: false,
        first_name: username.to_string(),
        last_name: None,
        username: Some(username.to_string()),
    }
}

fn private_chat(id: i64) -> Chat {
    Chat {
        id,
        kind: "private".to_string(),
        title: None,
        username: None,
        first_name: None,
    }
}

fn text_update(from: i64, text: &str) -> Update {
    Update {
        update_id: 1,
        message: Some(Message {
            message_id: 10,
            from: Some(tg_user(from, "tester")),
            chat: private_chat(from),
            date: 0,
            text: Some(text.to_string()),
        }),
        callback_query: None,
    }
}

fn callback_update(from: i64, data: &str) -> Update {
    Update {
        update_id: 2,
        message: None,
        callback_query: Some(CallbackQuery {
            id: "cb-1".to_string(),
            from: tg_user(from, "tester"),
            message: Some(Message {
                message_id: 11,
                from: None,
                chat: private_chat(from),
                date: 0,
                text: Some("card".to_string()),
            }),
            data: Some(data.to_string()),
        }),
    }
}

fn handler(env: &TestEnv, api: Arc<FakeTelegramApi>) -> BotHandler {
    BotHandler::new(
        api,
        env.services.clone(),
        env.config.frontend.clone(),
        "bantah_bot".to_string(),
    )
}

async fn link(env: &TestEnv, user_id: &str, telegram_id: i64, username: &str) {
    let token = env
        .services
        .linking
        .issue_token(pending(telegram_id, username))
        .await;
    env.services
        .linking
        .verify_link(user_id, &token)
        .await
        .expect("link");
}

// =============================================================================
// Linking
// =============================================================================

#[tokio::test]
async fn test_link_token_is_single_use() {
    let env = setup().await;
    env.user("u1", "alice").await;

    let token = env
        .services
        .linking
        .issue_token(pending(ALICE_TG, "alice_tg"))
        .await;
    let link = env.services.linking.verify_link("u1", &token).await.unwrap();
    assert_eq!(link.telegram_id, ALICE_TG);
    assert_eq!(link.telegram_username.as_deref(), Some("alice_tg"));

    let reused = env.services.linking.verify_link("u1", &token).await;
    assert!(matches!(reused, Err(BantahError::LinkExpired(_))));

    assert_eq!(
        env.services.linking.user_id_for_telegram(ALICE_TG).await.unwrap().as_deref(),
        Some("u1")
    );
    let notes = env.services.notifications.list("u1", false, 10).await.unwrap();
    assert_eq!(notes.notifications[0].kind, "account_linked");
}

#[tokio::test]
async fn test_unknown_token_is_rejected() {
    let env = setup().await;
    env.user("u1", "alice").await;
    assert!(matches!(
        env.services.linking.verify_link("u1", "not-a-token").await,
        Err(BantahError::LinkExpired(_))
    ));
}

#[tokio::test]
async fn test_unlink() {
    let env = setup().await;
    env.user("u1", "alice").await;
    link(&env, "u1", ALICE_TG, "alice_tg").await;

    assert!(env.services.linking.unlink("u1").await.unwrap());
    assert!(!env.services.linking.unlink("u1").await.unwrap());
    assert!(env.services.linking.link_for_user("u1").await.unwrap().is_none());
}

// =============================================================================
// Bot handler
// =============================================================================

#[tokio::test]
async fn test_start_sends_link_button() {
    let env = setup().await;
    let api = Arc::new(FakeTelegramApi::new());
    let bot = handler(&env, api.clone());

    bot.handle(text_update(ALICE_TG, "/start")).await.unwrap();

    let sent = api.sent();
    assert_eq!(sent.len(), 1);
    let keyboard = sent[0].keyboard.as_ref().expect("link keyboard");
    let url = &keyboard.inline_keyboard[0][0]
        .web_app
        .as_ref()
        .expect("web app button")
        .url;
    assert!(url.starts_with("https://bantah.test/telegram-link?token="));

    // The token in the button links the account
    env.user("u1", "alice").await;
    let token = url.rsplit('=').next().unwrap();
    env.services.linking.verify_link("u1", token).await.unwrap();

    bot.handle(text_update(ALICE_TG, "/start")).await.unwrap();
    assert!(api.sent()[1].keyboard.is_none());
}

#[tokio::test]
async fn test_balance_requires_link() {
    let env = setup().await;
    let api = Arc::new(FakeTelegramApi::new());
    let bot = handler(&env, api.clone());

    bot.handle(text_update(ALICE_TG, "/balance")).await.unwrap();
    let unlinked_reply = api.last_text();

    env.funded_user("u1", "alice", 12500).await;
    link(&env, "u1", ALICE_TG, "alice_tg").await;
    bot.handle(text_update(ALICE_TG, "/balance")).await.unwrap();
    let linked_reply = api.last_text();

    assert_ne!(unlinked_reply, linked_reply);
    assert!(linked_reply.contains("12,500"));
}

#[tokio::test]
async fn test_commands_for_other_bots_are_ignored() {
    let env = setup().await;
    let api = Arc::new(FakeTelegramApi::new());
    let bot = handler(&env, api.clone());

    bot.handle(text_update(ALICE_TG, "/start@some_other_bot")).await.unwrap();
    // Plain text gets the greeting, a foreign command is treated as plain text
    assert_eq!(api.sent().len(), 1);
    assert!(api.sent()[0].keyboard.is_some());
}

#[tokio::test]
async fn test_challenge_command_creates_challenge() {
    let env = setup().await;
    let api = Arc::new(FakeTelegramApi::new());
    let bot = handler(&env, api.clone());

    env.funded_user("u1", "alice", 5000).await;
    env.user("u2", "bob").await;
    link(&env, "u1", ALICE_TG, "alice_tg").await;

    bot.handle(text_update(ALICE_TG, "/challenge @bob 1000 Chess at noon"))
        .await
        .unwrap();

    let challenges = env.services.challenges.list_for_user("u2", true, 10).await.unwrap();
    assert_eq!(challenges.len(), 1);
    assert_eq!(challenges[0].title, "Chess at noon");
    assert_eq!(challenges[0].stake_amount, 1000);
    assert_eq!(env.balance("u1").await, 4000);

    // Bad amount creates nothing
    bot.handle(text_update(ALICE_TG, "/challenge @bob lots Chess"))
        .await
        .unwrap();
    assert_eq!(
        env.services.challenges.list_for_user("u2", true, 10).await.unwrap().len(),
        1
    );
}

#[tokio::test]
async fn test_accept_callback() {
    let env = setup().await;
    let api = Arc::new(FakeTelegramApi::new());
    let bot = handler(&env, api.clone());

    env.funded_user("u1", "alice", 5000).await;
    env.funded_user("u2", "bob", 5000).await;
    link(&env, "u2", BOB_TG, "bob_tg").await;

    let challenge = env
        .services
        .challenges
        .create_challenge(
            "u1",
            CreateChallengeRequest {
                challenged: Some("bob".to_string()),
                title: "Darts".to_string(),
                description: None,
                category: None,
                stake_amount: 500,
                due_date: None,
            },
        )
        .await
        .unwrap();

    bot.handle(callback_update(BOB_TG, &format!("accept_{}", challenge.id)))
        .await
        .unwrap();

    let accepted = env.services.challenges.get(challenge.id).await.unwrap();
    assert_eq!(accepted.status, ChallengeStatus::Active);
    assert_eq!(env.balance("u2").await, 4500);
    assert_eq!(api.edits.lock().unwrap().len(), 1);

    // Pressing again reports the challenge as gone
    bot.handle(callback_update(BOB_TG, &format!("accept_{}", challenge.id)))
        .await
        .unwrap();
    let answers = api.answers();
    let last = answers.last().unwrap();
    assert!(last.show_alert);
    assert!(last.text.as_deref().unwrap_or_default().contains("no longer available"));
}

#[tokio::test]
async fn test_callback_from_unlinked_user() {
    let env = setup().await;
    let api = Arc::new(FakeTelegramApi::new());
    let bot = handler(&env, api.clone());

    bot.handle(callback_update(BOB_TG, "decline_challenge_1")).await.unwrap();
    let answers = api.answers();
    assert_eq!(answers.len(), 1);
    assert!(answers[0].text.as_deref().unwrap_or_default().contains("not linked"));
}

// =============================================================================
// Outbox
// =============================================================================

fn outbox(env: &TestEnv, api: Arc<FakeTelegramApi>, max_attempts: i32) -> NotificationOutbox {
    NotificationOutbox::new(
        api,
        env.services.notifications.clone(),
        env.services.linking.clone(),
        env.config.frontend.clone(),
        "bantah_bot".to_string(),
        50,
        max_attempts,
    )
}

#[tokio::test]
async fn test_outbox_delivers_to_linked_chats() {
    let env = setup_with_bot().await;
    env.user("u1", "alice").await;
    env.user("u2", "bob").await;
    link(&env, "u1", ALICE_TG, "alice_tg").await;

    env.services.users.credit("u1", 1000, 0, None).await.unwrap();
    env.services.users.credit("u2", 1000, 0, None).await.unwrap();

    let api = Arc::new(FakeTelegramApi::new());
    let stats = outbox(&env, api.clone(), 3).run_once().await.unwrap();

    // account_linked + payment_received for alice, bob is not linked
    assert_eq!(
        stats,
        OutboxStats {
            sent: 2,
            skipped: 1,
            failed: 0
        }
    );
    assert!(api.sent().iter().all(|m| m.chat_id == ALICE_TG.into()));

    let alice = env.services.notifications.list("u1", false, 10).await.unwrap();
    assert!(
        alice
            .notifications
            .iter()
            .all(|n| n.telegram_status == DeliveryStatus::Sent)
    );
    let bob = env.services.notifications.list("u2", false, 10).await.unwrap();
    assert_eq!(bob.notifications[0].telegram_status, DeliveryStatus::Skipped);

    // Nothing left to deliver
    let again = outbox(&env, api, 3).run_once().await.unwrap();
    assert_eq!(again, OutboxStats::default());
}

#[tokio::test]
async fn test_outbox_gives_up_after_max_attempts() {
    let env = setup_with_bot().await;
    env.user("u1", "alice").await;
    link(&env, "u1", ALICE_TG, "alice_tg").await;

    let api = Arc::new(FakeTelegramApi::failing());
    let first = outbox(&env, api.clone(), 2).run_once().await.unwrap();
    assert_eq!(first.failed, 0);
    let second = outbox(&env, api, 2).run_once().await.unwrap();
    assert_eq!(second.failed, 1);

    let notes = env.services.notifications.list("u1", false, 10).await.unwrap();
    assert_eq!(notes.notifications[0].telegram_status, DeliveryStatus::Failed);
    assert_eq!(notes.notifications[0].attempts, 2);
}

#[tokio::test]
async fn test_notifications_skip_telegram_without_bot() {
    let env = setup().await;
    env.user("u1", "alice").await;
    env.services.users.credit("u1", 1000, 0, None).await.unwrap();

    let notes = env.services.notifications.list("u1", false, 10).await.unwrap();
    assert_eq!(notes.notifications[0].telegram_status, DeliveryStatus::Skipped);
    assert!(env.services.notifications.pending_deliveries(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_mark_read() {
    let env = setup().await;
    env.user("u1", "alice").await;
    env.services.users.credit("u1", 100, 0, None).await.unwrap();
    env.services.users.credit("u1", 200, 0, None).await.unwrap();

    let list = env.services.notifications.list("u1", true, 10).await.unwrap();
    assert_eq!(list.unread, 2);

    env.services
        .notifications
        .mark_read("u1", list.notifications[0].id)
        .await
        .unwrap();
    assert_eq!(env.services.notifications.unread_count("u1").await.unwrap(), 1);

    // Someone else's notification looks missing
    env.user("u2", "bob").await;
    assert!(
        env.services
            .notifications
            .mark_read("u2", list.notifications[1].id)
            .await
            .is_err()
    );

    assert_eq!(env.services.notifications.mark_all_read("u1").await.unwrap(), 1);
    assert_eq!(env.services.notifications.unread_count("u1").await.unwrap(), 0);
}
