//! Wallet and prediction event tests
//!
//! Exercises the service layer against a real SQLite database.

mod common;

use chrono::{Duration, Utc};

use bantah::errors::BantahError;
use bantah::services::CreateEventRequest;
use bantah::storage::{EventStatus, Prediction, TransactionKind};

use common::setup;

fn event_request(title: &str, entry_fee: i64) -> CreateEventRequest {
    CreateEventRequest {
        title: title.to_string(),
        description: None,
        category: Some("Sports".to_string()),
        entry_fee,
        max_participants: None,
        is_private: false,
        end_date: Utc::now() + Duration::hours(2),
    }
}

// =============================================================================
// Users and wallets
// =============================================================================

#[tokio::test]
async fn test_ensure_user_provisions_empty_wallet_once() {
    let env = setup().await;

    let first = env.services.users.ensure_user("u1", "@Alice_1", Some("Alice")).await.unwrap();
    assert_eq!(first.username, "Alice_1");
    assert!(!first.is_admin);

    // Second call returns the stored row untouched
    let again = env.services.users.ensure_user("u1", "other_name", None).await.unwrap();
    assert_eq!(again.username, "Alice_1");

    let wallet = env.services.users.wallet("u1").await.unwrap();
    assert_eq!(wallet.balance, 0);
    assert_eq!(wallet.coins, 0);
}

#[tokio::test]
async fn test_ensure_user_sanitizes_invalid_username() {
    let env = setup().await;

    let dotted = env.services.users.ensure_user("u1", "john.doe", None).await.unwrap();
    assert_eq!(dotted.username, "john_doe");

    let hopeless = env.services.users.ensure_user("did:privy:x9", "a b", None).await.unwrap();
    assert_eq!(hopeless.username, "user_didprivyx9");

    // The session keeps working on later requests
    let again = env.services.users.ensure_user("u1", "john.doe", None).await.unwrap();
    assert_eq!(again.id, "u1");
}

#[tokio::test]
async fn test_ensure_user_deduplicates_taken_username() {
    let env = setup().await;
    env.user("u1", "alice").await;

    let second = env.services.users.ensure_user("u2", "Alice", None).await.unwrap();
    assert_eq!(second.username, "Alice_2");
    let third = env.services.users.ensure_user("u3", "alice", None).await.unwrap();
    assert_eq!(third.username, "alice_3");

    // Retrying the same identity returns the stored row
    let retry = env.services.users.ensure_user("u2", "Alice", None).await.unwrap();
    assert_eq!(retry.username, "Alice_2");
    assert_eq!(env.balance("u2").await, 0);
}

#[tokio::test]
async fn test_resolve_by_id_or_username() {
    let env = setup().await;
    env.user("u1", "alice").await;

    assert_eq!(env.services.users.resolve("u1").await.unwrap().id, "u1");
    assert_eq!(env.services.users.resolve("@ALICE").await.unwrap().id, "u1");
    assert!(matches!(
        env.services.users.resolve("nobody").await,
        Err(BantahError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_credit_records_transaction_and_notification() {
    let env = setup().await;
    env.user("u1", "alice").await;

    let wallet = env.services.users.credit("u1", 5000, 10, Some("bank-ref")).await.unwrap();
    assert_eq!(wallet.balance, 5000);
    assert_eq!(wallet.coins, 10);

    let txs = env.services.users.transactions("u1", 10).await.unwrap();
    assert_eq!(txs.len(), 1);
    assert_eq!(txs[0].kind, TransactionKind::Deposit);
    assert_eq!(txs[0].balance_after, 5000);
    assert_eq!(txs[0].reference.as_deref(), Some("bank-ref"));

    let list = env.services.notifications.list("u1", false, 10).await.unwrap();
    assert_eq!(list.unread, 1);
    assert_eq!(list.notifications[0].kind, "payment_received");
}

#[tokio::test]
async fn test_credit_validation() {
    let env = setup().await;
    env.user("u1", "alice").await;

    assert!(env.services.users.credit("u1", 0, 0, None).await.is_err());
    assert!(env.services.users.credit("u1", -5, 0, None).await.is_err());
    assert!(matches!(
        env.services.users.credit("ghost", 100, 0, None).await,
        Err(BantahError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_profile_counts_active_challenges() {
    let env = setup().await;
    env.funded_user("u1", "alice", 1000).await;
    let profile = env.services.users.profile("u1").await.unwrap();
    assert_eq!(profile.wallet.balance, 1000);
    assert_eq!(profile.active_challenges, 0);
}

// =============================================================================
// Events
// =============================================================================

#[tokio::test]
async fn test_create_event_normalizes_fields() {
    let env = setup().await;
    env.user("u1", "alice").await;

    let mut req = event_request("  Will it rain?  ", 100);
    req.description = Some("   ".to_string());
    let event = env.services.events.create_event("u1", req).await.unwrap();

    assert_eq!(event.title, "Will it rain?");
    assert_eq!(event.category, "sports");
    assert_eq!(event.description, None);
    assert_eq!(event.status, EventStatus::Open);
    assert_eq!(event.total_pool(), 0);
}

#[tokio::test]
async fn test_create_event_validation() {
    let env = setup().await;
    env.user("u1", "alice").await;

    assert!(env.services.events.create_event("u1", event_request("", 100)).await.is_err());
    assert!(env.services.events.create_event("u1", event_request("Rain", 0)).await.is_err());

    let mut past = event_request("Rain", 100);
    past.end_date = Utc::now() - Duration::minutes(1);
    assert!(env.services.events.create_event("u1", past).await.is_err());

    let mut tiny = event_request("Rain", 100);
    tiny.max_participants = Some(1);
    assert!(env.services.events.create_event("u1", tiny).await.is_err());
}

#[tokio::test]
async fn test_join_event_debits_and_grows_pool() {
    let env = setup().await;
    env.user("creator", "creator").await;
    env.funded_user("u1", "alice", 1000).await;

    let event = env
        .services
        .events
        .create_event("creator", event_request("Derby", 100))
        .await
        .unwrap();

    let participant = env
        .services
        .events
        .join_event("u1", event.id, Prediction::Yes, 300)
        .await
        .unwrap();
    assert_eq!(participant.amount, 300);
    assert_eq!(env.balance("u1").await, 700);

    let details = env.services.events.get_event(None, event.id).await.unwrap();
    assert_eq!(details.event.yes_pool, 300);
    assert_eq!(details.event.no_pool, 0);
    assert_eq!(details.participants.len(), 1);

    // One entry per user
    let err = env
        .services
        .events
        .join_event("u1", event.id, Prediction::No, 100)
        .await
        .unwrap_err();
    assert!(matches!(err, BantahError::Conflict(_)));
    assert_eq!(env.balance("u1").await, 700);
}

#[tokio::test]
async fn test_join_event_rejections_leave_wallet_untouched() {
    let env = setup().await;
    env.user("creator", "creator").await;
    env.funded_user("u1", "alice", 150).await;

    let event = env
        .services
        .events
        .create_event("creator", event_request("Derby", 100))
        .await
        .unwrap();

    let below_fee = env.services.events.join_event("u1", event.id, Prediction::Yes, 50).await;
    assert!(matches!(below_fee, Err(BantahError::Validation(_))));

    let too_much = env.services.events.join_event("u1", event.id, Prediction::Yes, 500).await;
    assert!(matches!(
        too_much,
        Err(BantahError::InsufficientFunds {
            required: 500,
            available: 150
        })
    ));
    assert_eq!(env.balance("u1").await, 150);
}

#[tokio::test]
async fn test_event_capacity() {
    let env = setup().await;
    env.user("creator", "creator").await;
    for (id, name) in [("u1", "alice"), ("u2", "bob"), ("u3", "carol")] {
        env.funded_user(id, name, 1000).await;
    }

    let mut req = event_request("Small room", 100);
    req.max_participants = Some(2);
    let event = env.services.events.create_event("creator", req).await.unwrap();

    env.services.events.join_event("u1", event.id, Prediction::Yes, 100).await.unwrap();
    env.services.events.join_event("u2", event.id, Prediction::No, 100).await.unwrap();
    let full = env.services.events.join_event("u3", event.id, Prediction::Yes, 100).await;
    assert!(matches!(full, Err(BantahError::Conflict(_))));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_joins_never_overfill_event() {
    let env = setup().await;
    env.user("creator", "creator").await;
    let players = ["p1", "p2", "p3", "p4", "p5", "p6"];
    for id in players {
        env.funded_user(id, &format!("player_{}", id), 1000).await;
    }

    let mut req = event_request("Two seats only", 100);
    req.max_participants = Some(2);
    let event = env.services.events.create_event("creator", req).await.unwrap();

    let mut handles = Vec::new();
    for id in players {
        let events = env.services.events.clone();
        handles.push(tokio::spawn(async move {
            (id, events.join_event(id, event.id, Prediction::Yes, 100).await)
        }));
    }

    let mut joined = Vec::new();
    for handle in handles {
        let (id, result) = handle.await.unwrap();
        if result.is_ok() {
            joined.push(id);
        }
    }

    let details = env.services.events.get_event(Some("creator"), event.id).await.unwrap();
    assert!(joined.len() <= 2);
    assert_eq!(details.participants.len(), joined.len());
    assert_eq!(details.event.yes_pool, 100 * joined.len() as i64);

    // Whoever did not get a seat keeps their money
    for id in players {
        let expected = if joined.contains(&id) { 900 } else { 1000 };
        assert_eq!(env.balance(id).await, expected);
    }
}

#[tokio::test]
async fn test_private_event_hidden_from_outsiders() {
    let env = setup().await;
    env.user("creator", "creator").await;
    env.funded_user("u1", "alice", 1000).await;
    env.user("u2", "bob").await;

    let mut req = event_request("Office pool", 100);
    req.is_private = true;
    let event = env.services.events.create_event("creator", req).await.unwrap();
    env.services.events.join_event("u1", event.id, Prediction::Yes, 100).await.unwrap();

    assert!(env.services.events.get_event(Some("creator"), event.id).await.is_ok());
    assert!(env.services.events.get_event(Some("u1"), event.id).await.is_ok());
    assert!(matches!(
        env.services.events.get_event(Some("u2"), event.id).await,
        Err(BantahError::NotFound(_))
    ));
    assert!(matches!(
        env.services.events.get_event(None, event.id).await,
        Err(BantahError::NotFound(_))
    ));

    let public_view = env.services.events.list_events(Some("u2"), None, None, 50).await.unwrap();
    assert!(public_view.iter().all(|e| e.id != event.id));
    let member_view = env.services.events.list_events(Some("u1"), None, None, 50).await.unwrap();
    assert!(member_view.iter().any(|e| e.id == event.id));
}

#[tokio::test]
async fn test_resolve_event_pays_winners_pro_rata() {
    let env = setup().await;
    env.admin("admin", "admin_user").await;
    env.funded_user("u1", "alice", 1000).await;
    env.funded_user("u2", "bob", 1000).await;
    env.funded_user("u3", "carol", 1000).await;

    let event = env
        .services
        .events
        .create_event("admin", event_request("Final score", 100))
        .await
        .unwrap();
    env.services.events.join_event("u1", event.id, Prediction::Yes, 100).await.unwrap();
    env.services.events.join_event("u2", event.id, Prediction::Yes, 300).await.unwrap();
    env.services.events.join_event("u3", event.id, Prediction::No, 400).await.unwrap();

    let (resolved, settlement) = env
        .services
        .events
        .resolve_event("admin", event.id, Prediction::Yes)
        .await
        .unwrap();
    assert_eq!(resolved.status, EventStatus::Resolved);
    assert_eq!(resolved.outcome, Some(Prediction::Yes));
    assert_eq!(settlement.total_pool, 800);

    // 800 split 1:3 between the two YES stakes
    assert_eq!(env.balance("u1").await, 900 + 200);
    assert_eq!(env.balance("u2").await, 700 + 600);
    assert_eq!(env.balance("u3").await, 600);

    let winner = env.services.users.get_user("u2").await.unwrap();
    assert_eq!(winner.total_wins, 1);
    assert_eq!(winner.total_earnings, 600);

    let loser_notes = env.services.notifications.list("u3", false, 10).await.unwrap();
    assert!(loser_notes.notifications.iter().any(|n| n.kind == "event_result"));

    // Settling twice is refused
    let again = env.services.events.resolve_event("admin", event.id, Prediction::No).await;
    assert!(matches!(again, Err(BantahError::Conflict(_))));
}

#[tokio::test]
async fn test_resolve_event_requires_admin() {
    let env = setup().await;
    env.user("u1", "alice").await;
    let event = env
        .services
        .events
        .create_event("u1", event_request("Mine", 100))
        .await
        .unwrap();

    let err = env
        .services
        .events
        .resolve_event("u1", event.id, Prediction::Yes)
        .await
        .unwrap_err();
    assert!(matches!(err, BantahError::Forbidden(_)));
}

#[tokio::test]
async fn test_cancel_event_refunds_everyone() {
    let env = setup().await;
    env.admin("admin", "admin_user").await;
    env.funded_user("u1", "alice", 500).await;
    env.funded_user("u2", "bob", 500).await;

    let event = env
        .services
        .events
        .create_event("admin", event_request("Called off", 100))
        .await
        .unwrap();
    env.services.events.join_event("u1", event.id, Prediction::Yes, 200).await.unwrap();
    env.services.events.join_event("u2", event.id, Prediction::No, 300).await.unwrap();

    let cancelled = env.services.events.cancel_event("admin", event.id).await.unwrap();
    assert_eq!(cancelled.status, EventStatus::Cancelled);
    assert_eq!(env.balance("u1").await, 500);
    assert_eq!(env.balance("u2").await, 500);

    let txs = env.services.users.transactions("u1", 10).await.unwrap();
    assert!(txs.iter().any(|t| t.kind == TransactionKind::Refund && t.amount == 200));
}

#[tokio::test]
async fn test_close_due_events_and_ending_soon() {
    let env = setup().await;
    env.user("creator", "creator").await;
    env.funded_user("u1", "alice", 500).await;

    let event = env
        .services
        .events
        .create_event("creator", event_request("Soon", 100))
        .await
        .unwrap();
    env.services.events.join_event("u1", event.id, Prediction::Yes, 100).await.unwrap();

    // Reminder fires once per event
    let now = Utc::now();
    let window = Duration::hours(3);
    assert_eq!(env.services.events.notify_ending_soon(now, window).await.unwrap(), 1);
    assert_eq!(env.services.events.notify_ending_soon(now, window).await.unwrap(), 0);

    let later = now + Duration::hours(3);
    assert_eq!(env.services.events.close_due_events(later).await.unwrap(), 1);
    assert_eq!(env.services.events.close_due_events(later).await.unwrap(), 0);

    let details = env.services.events.get_event(None, event.id).await.unwrap();
    assert_eq!(details.event.status, EventStatus::Closed);

    let kinds: Vec<String> = env
        .services
        .notifications
        .list("u1", false, 10)
        .await
        .unwrap()
        .notifications
        .into_iter()
        .map(|n| n.kind)
        .collect();
    assert!(kinds.contains(&"event_ending_soon".to_string()));
    assert!(kinds.contains(&"event_closed".to_string()));
}
