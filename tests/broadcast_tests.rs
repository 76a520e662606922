//! Channel posts emitted by the event, challenge and leaderboard services

mod common;

use chrono::{Duration, Utc};

use bantah::services::{CreateChallengeRequest, CreateEventRequest};
use bantah::storage::ChallengeResult;
use bantah::telegram::ChannelPost;

use common::setup;

fn event_request(title: &str, is_private: bool) -> CreateEventRequest {
    CreateEventRequest {
        title: title.to_string(),
        description: None,
        category: Some("Crypto".to_string()),
        entry_fee: 100,
        max_participants: None,
        is_private,
        end_date: Utc::now() + Duration::hours(3),
    }
}

fn challenge_request(opponent: &str) -> CreateChallengeRequest {
    CreateChallengeRequest {
        challenged: Some(opponent.to_string()),
        title: "Chess blitz".to_string(),
        description: None,
        category: Some("Skill".to_string()),
        stake_amount: 500,
        due_date: None,
    }
}

#[tokio::test]
async fn test_only_public_events_are_broadcast() {
    let env = setup().await;
    env.user("u1", "alice").await;

    let public = env
        .services
        .events
        .create_event("u1", event_request("BTC above 100k", false))
        .await
        .unwrap();
    env.services
        .events
        .create_event("u1", event_request("Office pool", true))
        .await
        .unwrap();

    let posts = env.broadcasts.posts();
    assert_eq!(posts.len(), 1);
    match &posts[0] {
        ChannelPost::Event { event, creator } => {
            assert_eq!(event.id, public.id);
            assert_eq!(creator, "@alice");
        }
        other => panic!("unexpected post {:?}", other),
    }
}

#[tokio::test]
async fn test_challenge_lifecycle_posts_and_leaderboard_climb() {
    let env = setup().await;
    env.admin("admin", "admin_user").await;
    env.funded_user("u1", "alice", 2000).await;
    env.funded_user("u2", "bob", 2000).await;

    let challenge = env
        .services
        .challenges
        .create_challenge("u1", challenge_request("@bob"))
        .await
        .unwrap();
    env.services.challenges.accept("u2", challenge.id).await.unwrap();
    env.services
        .challenges
        .resolve("admin", challenge.id, ChallengeResult::ChallengedWins)
        .await
        .unwrap();

    assert_eq!(
        env.broadcasts.kinds(),
        vec!["challenge", "matchmaking", "challenge_result", "leaderboard"]
    );

    let posts = env.broadcasts.posts();
    match &posts[0] {
        ChannelPost::Challenge {
            challenger,
            challenged,
            ..
        } => {
            assert_eq!(challenger, "@alice");
            assert_eq!(challenged.as_deref(), Some("@bob"));
        }
        other => panic!("unexpected post {:?}", other),
    }
    match &posts[2] {
        ChannelPost::ChallengeResult {
            winner,
            loser,
            draw,
            ..
        } => {
            assert_eq!(winner, "@bob");
            assert_eq!(loser, "@alice");
            assert!(!draw);
        }
        other => panic!("unexpected post {:?}", other),
    }
    match &posts[3] {
        ChannelPost::Leaderboard {
            player,
            new_rank,
            old_rank,
            total_wins,
            total_earnings,
            achievement,
        } => {
            assert_eq!(player, "@bob");
            assert_eq!(*new_rank, 1);
            // admin, alice, bob joined in that order with equal stats
            assert_eq!(*old_rank, Some(3));
            assert_eq!(*total_wins, 1);
            assert_eq!(*total_earnings, 1000);
            assert_eq!(achievement.as_deref(), Some("Reached #1"));
        }
        other => panic!("unexpected post {:?}", other),
    }
}

#[tokio::test]
async fn test_draw_is_posted_without_leaderboard_change() {
    let env = setup().await;
    env.admin("admin", "admin_user").await;
    env.funded_user("u1", "alice", 2000).await;
    env.funded_user("u2", "bob", 2000).await;

    let challenge = env
        .services
        .challenges
        .create_challenge("u1", challenge_request("bob"))
        .await
        .unwrap();
    env.services.challenges.accept("u2", challenge.id).await.unwrap();
    env.services
        .challenges
        .resolve("admin", challenge.id, ChallengeResult::Draw)
        .await
        .unwrap();

    assert_eq!(
        env.broadcasts.kinds(),
        vec!["challenge", "matchmaking", "challenge_result"]
    );
    assert!(matches!(
        env.broadcasts.posts().last(),
        Some(ChannelPost::ChallengeResult { draw: true, .. })
    ));
}

#[tokio::test]
async fn test_rank_of_agrees_with_top_on_ties() {
    let env = setup().await;
    for (id, name) in [("u3", "carol"), ("u1", "alice"), ("u2", "bob")] {
        env.user(id, name).await;
    }

    let top = env.services.leaderboard.top(10).await.unwrap();
    assert_eq!(top.len(), 3);
    for entry in &top {
        let rank = env.services.leaderboard.rank_of(&entry.user_id).await.unwrap();
        assert_eq!(rank, Some(entry.rank), "rank of {}", entry.user_id);
    }
}
