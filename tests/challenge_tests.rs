//! Peer-to-peer challenge tests

mod common;

use chrono::{Duration, Utc};

use bantah::errors::BantahError;
use bantah::services::CreateChallengeRequest;
use bantah::storage::{ChallengeResult, ChallengeStatus, TransactionKind};

use common::setup;

fn challenge_request(opponent: Option<&str>, stake: i64) -> CreateChallengeRequest {
    CreateChallengeRequest {
        challenged: opponent.map(str::to_string),
        title: "FIFA match".to_string(),
        description: Some("Best of three".to_string()),
        category: Some("Gaming".to_string()),
        stake_amount: stake,
        due_date: None,
    }
}

#[tokio::test]
async fn test_create_challenge_escrows_creator_stake() {
    let env = setup().await;
    env.funded_user("u1", "alice", 5000).await;
    env.user("u2", "bob").await;

    let challenge = env
        .services
        .challenges
        .create_challenge("u1", challenge_request(Some("@bob"), 2000))
        .await
        .unwrap();

    assert_eq!(challenge.status, ChallengeStatus::Pending);
    assert_eq!(challenge.challenged_id.as_deref(), Some("u2"));
    assert_eq!(challenge.category, "gaming");
    assert_eq!(env.balance("u1").await, 3000);

    let received = env.services.notifications.list("u2", false, 10).await.unwrap();
    assert_eq!(received.notifications[0].kind, "challenge_received");
}

#[tokio::test]
async fn test_create_challenge_validation() {
    let env = setup().await;
    env.funded_user("u1", "alice", 5000).await;

    let below_min = env
        .services
        .challenges
        .create_challenge("u1", challenge_request(None, 10))
        .await;
    assert!(matches!(below_min, Err(BantahError::Validation(_))));

    let yourself = env
        .services
        .challenges
        .create_challenge("u1", challenge_request(Some("alice"), 500))
        .await;
    assert!(matches!(yourself, Err(BantahError::Validation(_))));

    let unknown = env
        .services
        .challenges
        .create_challenge("u1", challenge_request(Some("@ghost"), 500))
        .await;
    assert!(matches!(unknown, Err(BantahError::NotFound(_))));

    let mut past = challenge_request(None, 500);
    past.due_date = Some(Utc::now() - Duration::hours(1));
    assert!(env.services.challenges.create_challenge("u1", past).await.is_err());

    let broke = env
        .services
        .challenges
        .create_challenge("u1", challenge_request(None, 9000))
        .await;
    assert!(matches!(broke, Err(BantahError::InsufficientFunds { .. })));
    assert_eq!(env.balance("u1").await, 5000);
}

#[tokio::test]
async fn test_accept_then_resolve_pays_winner() {
    let env = setup().await;
    env.admin("admin", "admin_user").await;
    env.funded_user("u1", "alice", 5000).await;
    env.funded_user("u2", "bob", 5000).await;

    let challenge = env
        .services
        .challenges
        .create_challenge("u1", challenge_request(Some("bob"), 2000))
        .await
        .unwrap();

    let accepted = env.services.challenges.accept("u2", challenge.id).await.unwrap();
    assert_eq!(accepted.status, ChallengeStatus::Active);
    assert!(accepted.accepted_at.is_some());
    assert_eq!(env.balance("u2").await, 3000);
    assert_eq!(env.services.challenges.count_active("u1").await.unwrap(), 1);

    let resolution = env
        .services
        .challenges
        .resolve("admin", challenge.id, ChallengeResult::ChallengedWins)
        .await
        .unwrap();
    assert_eq!(resolution.winner_id.as_deref(), Some("u2"));
    assert_eq!(resolution.challenge.status, ChallengeStatus::Completed);

    assert_eq!(env.balance("u1").await, 3000);
    assert_eq!(env.balance("u2").await, 7000);
    let bob = env.services.users.get_user("u2").await.unwrap();
    assert_eq!(bob.total_wins, 1);
    assert_eq!(bob.total_earnings, 4000);

    let txs = env.services.users.transactions("u2", 10).await.unwrap();
    assert!(txs.iter().any(|t| t.kind == TransactionKind::Payout && t.amount == 4000));

    // Completed challenges stay completed
    let again = env
        .services
        .challenges
        .resolve("admin", challenge.id, ChallengeResult::Draw)
        .await;
    assert!(matches!(again, Err(BantahError::Conflict(_))));
}

#[tokio::test]
async fn test_draw_refunds_both_stakes() {
    let env = setup().await;
    env.admin("admin", "admin_user").await;
    env.funded_user("u1", "alice", 1000).await;
    env.funded_user("u2", "bob", 1000).await;

    let challenge = env
        .services
        .challenges
        .create_challenge("u1", challenge_request(Some("u2"), 400))
        .await
        .unwrap();
    env.services.challenges.accept("u2", challenge.id).await.unwrap();
    env.services
        .challenges
        .resolve("admin", challenge.id, ChallengeResult::Draw)
        .await
        .unwrap();

    assert_eq!(env.balance("u1").await, 1000);
    assert_eq!(env.balance("u2").await, 1000);
}

#[tokio::test]
async fn test_accept_rules() {
    let env = setup().await;
    env.funded_user("u1", "alice", 5000).await;
    env.funded_user("u2", "bob", 5000).await;
    env.funded_user("u3", "carol", 100).await;

    let direct = env
        .services
        .challenges
        .create_challenge("u1", challenge_request(Some("bob"), 500))
        .await
        .unwrap();
    let wrong_user = env.services.challenges.accept("u3", direct.id).await;
    assert!(matches!(wrong_user, Err(BantahError::Forbidden(_))));

    let open = env
        .services
        .challenges
        .create_challenge("u1", challenge_request(None, 500))
        .await
        .unwrap();
    let own = env.services.challenges.accept("u1", open.id).await;
    assert!(matches!(own, Err(BantahError::Forbidden(_))));

    // Failed debit rolls the status change back
    let poor = env.services.challenges.accept("u3", open.id).await;
    assert!(matches!(poor, Err(BantahError::InsufficientFunds { .. })));
    let still_open = env.services.challenges.get(open.id).await.unwrap();
    assert_eq!(still_open.status, ChallengeStatus::Pending);
    assert_eq!(still_open.challenged_id, None);

    let taken = env.services.challenges.accept("u2", open.id).await.unwrap();
    assert_eq!(taken.challenged_id.as_deref(), Some("u2"));

    let late = env.services.challenges.accept("u3", open.id).await;
    assert!(matches!(late, Err(BantahError::Conflict(_))));
}

#[tokio::test]
async fn test_decline_and_cancel_refund_creator() {
    let env = setup().await;
    env.funded_user("u1", "alice", 2000).await;
    env.user("u2", "bob").await;

    let declined = env
        .services
        .challenges
        .create_challenge("u1", challenge_request(Some("bob"), 500))
        .await
        .unwrap();
    // Only the challenged user may decline
    assert!(env.services.challenges.decline("u1", declined.id).await.is_err());
    let declined = env.services.challenges.decline("u2", declined.id).await.unwrap();
    assert_eq!(declined.status, ChallengeStatus::Declined);
    assert_eq!(env.balance("u1").await, 2000);

    let cancelled = env
        .services
        .challenges
        .create_challenge("u1", challenge_request(Some("bob"), 700))
        .await
        .unwrap();
    // Only the creator may cancel
    assert!(env.services.challenges.cancel("u2", cancelled.id).await.is_err());
    let cancelled = env.services.challenges.cancel("u1", cancelled.id).await.unwrap();
    assert_eq!(cancelled.status, ChallengeStatus::Cancelled);
    assert_eq!(env.balance("u1").await, 2000);

    let bob_notes = env.services.notifications.list("u2", false, 10).await.unwrap();
    assert!(bob_notes.notifications.iter().any(|n| n.kind == "challenge_cancelled"));
}

#[tokio::test]
async fn test_expire_pending_challenges() {
    let env = setup().await;
    env.funded_user("u1", "alice", 3000).await;

    let mut with_due = challenge_request(None, 500);
    with_due.due_date = Some(Utc::now() + Duration::hours(1));
    let due = env.services.challenges.create_challenge("u1", with_due).await.unwrap();
    let undated = env
        .services
        .challenges
        .create_challenge("u1", challenge_request(None, 500))
        .await
        .unwrap();
    assert_eq!(env.balance("u1").await, 2000);

    // Two hours on: the dated one is due, the undated one is within its TTL
    let now = Utc::now() + Duration::hours(2);
    let expired = env
        .services
        .challenges
        .expire_pending(now, Duration::hours(72))
        .await
        .unwrap();
    assert_eq!(expired, 1);
    assert_eq!(
        env.services.challenges.get(due.id).await.unwrap().status,
        ChallengeStatus::Expired
    );
    assert_eq!(
        env.services.challenges.get(undated.id).await.unwrap().status,
        ChallengeStatus::Pending
    );
    assert_eq!(env.balance("u1").await, 2500);

    let much_later = Utc::now() + Duration::hours(100);
    let expired = env
        .services
        .challenges
        .expire_pending(much_later, Duration::hours(72))
        .await
        .unwrap();
    assert_eq!(expired, 1);
    assert_eq!(env.balance("u1").await, 3000);
}

#[tokio::test]
async fn test_list_for_user_active_only() {
    let env = setup().await;
    env.funded_user("u1", "alice", 3000).await;
    env.user("u2", "bob").await;

    let a = env
        .services
        .challenges
        .create_challenge("u1", challenge_request(Some("bob"), 500))
        .await
        .unwrap();
    let b = env
        .services
        .challenges
        .create_challenge("u1", challenge_request(Some("bob"), 500))
        .await
        .unwrap();
    env.services.challenges.cancel("u1", a.id).await.unwrap();

    let all = env.services.challenges.list_for_user("u2", false, 10).await.unwrap();
    assert_eq!(all.len(), 2);
    let active = env.services.challenges.list_for_user("u2", true, 10).await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, b.id);
}
