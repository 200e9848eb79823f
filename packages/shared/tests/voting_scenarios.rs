use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use shared::clock::ManualClock;
use shared::models::user::{Role, User};
use shared::models::vote::VoteValue;
use shared::repositories::in_memory::InMemoryStore;
use shared::repositories::user_repository::UserRepository;
use shared::repositories::vote_repository::VoteRepository;
use shared::services::errors::rating_service_errors::RatingServiceError;
use shared::services::errors::voting_service_errors::VotingServiceError;
use shared::services::rating_service::RatingService;
use shared::services::voting_service::VotingService;

struct Harness {
    store: Arc<InMemoryStore>,
    clock: Arc<ManualClock>,
    voting: Arc<VotingService>,
    ratings: RatingService,
}

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap()
}

async fn harness(user_ids: &[&str]) -> Harness {
    let store = Arc::new(InMemoryStore::new());
    for id in user_ids {
        let mut user = User::new(
            format!("user-{}", id),
            "Test".to_string(),
            "User".to_string(),
            "hashed".to_string(),
        );
        user.id = id.to_string();
        store.create_user(&user).await.unwrap();
    }

    let clock = Arc::new(ManualClock::new(t0()));
    let voting = Arc::new(VotingService::new(
        store.clone(),
        clock.clone(),
        Duration::hours(1),
    ));
    let ratings = RatingService::new(store.clone(), store.clone());

    Harness {
        store,
        clock,
        voting,
        ratings,
    }
}

async fn rating_of(h: &Harness, subject_id: &str) -> i64 {
    h.ratings.get_rating(subject_id).await.unwrap().total_rating
}

#[tokio::test]
async fn test_cooldown_scenario_for_voter_42() {
    let h = harness(&["7", "9", "42"]).await;

    let vote = h.voting.cast_for("7", "42").await.unwrap();
    assert_eq!(vote.cast_at, t0());
    assert_eq!(rating_of(&h, "7").await, 1);

    h.clock.advance(Duration::minutes(30));
    match h.voting.cast_against("9", "42").await {
        Err(VotingServiceError::CooldownActive { last_vote_at }) => {
            assert_eq!(last_vote_at, t0(), "Cooldown should report the first vote")
        }
        other => panic!("Expected CooldownActive at T0+30m, got {:?}", other),
    }

    h.clock.advance(Duration::minutes(60));
    h.voting
        .cast_against("9", "42")
        .await
        .expect("Vote at T0+90m should be accepted");

    assert_eq!(rating_of(&h, "9").await, -1);
    assert_eq!(rating_of(&h, "7").await, 1, "Earlier vote must be unchanged");
}

#[tokio::test]
async fn test_withdraw_without_vote() {
    let h = harness(&["5", "7"]).await;

    let result = h.voting.withdraw("7", "5").await;
    assert!(matches!(result, Err(VotingServiceError::NoSuchVote)));
}

#[tokio::test]
async fn test_withdraw_then_cast_again() {
    let h = harness(&["5", "7"]).await;

    h.voting.cast_for("7", "5").await.unwrap();
    h.voting.withdraw("7", "5").await.unwrap();
    assert_eq!(rating_of(&h, "7").await, 0);

    h.voting
        .cast_for("7", "5")
        .await
        .expect("Withdrawing returns the pair to no-vote");
    assert_eq!(rating_of(&h, "7").await, 1);
}

#[tokio::test]
async fn test_withdraw_does_not_reset_cooldown_for_other_subjects() {
    let h = harness(&["a", "b", "v"]).await;

    h.voting.cast_for("a", "v").await.unwrap();
    h.clock.advance(Duration::minutes(1));
    h.voting.withdraw("a", "v").await.unwrap();

    match h.voting.cast_for("b", "v").await {
        Err(VotingServiceError::CooldownActive { last_vote_at }) => {
            assert_eq!(last_vote_at, t0(), "Cooldown runs from the withdrawn cast")
        }
        other => panic!("Expected CooldownActive after withdraw, got {:?}", other),
    }
    assert!(matches!(
        h.voting.change_vote("a", "b", "v").await,
        Err(VotingServiceError::CooldownActive { .. })
    ));

    h.voting
        .cast_against("a", "v")
        .await
        .expect("Casting again on the withdrawn pair is allowed");
    assert_eq!(rating_of(&h, "a").await, -1);
    assert_eq!(rating_of(&h, "b").await, 0);

    h.clock.advance(Duration::minutes(1));
    h.voting.withdraw("a", "v").await.unwrap();
    assert!(
        matches!(
            h.voting.cast_for("b", "v").await,
            Err(VotingServiceError::CooldownActive { .. })
        ),
        "The re-cast restarts the cooldown"
    );

    h.clock.advance(Duration::hours(2));
    h.voting.cast_for("b", "v").await.unwrap();
    assert_eq!(rating_of(&h, "b").await, 1);
}

#[tokio::test]
async fn test_deleted_subject_keeps_votes_but_takes_no_new_ones() {
    let h = harness(&["5", "6", "7"]).await;

    h.voting.cast_for("7", "5").await.unwrap();
    h.store
        .delete_user("7", t0() + Duration::minutes(1))
        .await
        .unwrap();

    h.clock.advance(Duration::hours(2));
    assert!(matches!(
        h.voting.cast_for("7", "6").await,
        Err(VotingServiceError::SubjectNotFound)
    ));
    assert!(matches!(
        h.ratings.get_rating("7").await,
        Err(RatingServiceError::SubjectNotFound)
    ));
    assert_eq!(h.store.list_votes_for_subject("7").await.unwrap().len(), 1);

    let all = h.ratings.get_all_ratings().await.unwrap();
    assert!(all.iter().all(|rating| rating.subject_id != "7"));
    assert_eq!(all.len(), 2);
}

#[tokio::test]
async fn test_deleted_voter_keeps_identity_in_details() {
    let h = harness(&["1", "7"]).await;

    h.voting.cast_against("7", "1").await.unwrap();
    h.store.delete_user("1", t0()).await.unwrap();

    let detailed = h
        .ratings
        .get_detailed_rating("7", Role::Moderator)
        .await
        .unwrap();
    assert_eq!(detailed.rating.total_rating, -1);
    assert_eq!(detailed.votes[0].voter_nickname.as_deref(), Some("user-1"));
}

#[tokio::test]
async fn test_duplicate_cast_rejected() {
    let h = harness(&["5", "7"]).await;

    h.voting.cast_for("7", "5").await.unwrap();
    let result = h.voting.cast_for("7", "5").await;
    assert!(matches!(result, Err(VotingServiceError::DuplicateVote)));

    h.clock.advance(Duration::hours(3));
    let result = h.voting.cast_against("7", "5").await;
    assert!(
        matches!(result, Err(VotingServiceError::DuplicateVote)),
        "Duplicate guard does not expire with the cooldown"
    );
}

#[tokio::test]
async fn test_self_vote_rejected() {
    let h = harness(&["5"]).await;

    assert!(matches!(
        h.voting.cast_for("5", "5").await,
        Err(VotingServiceError::SelfVote)
    ));
    assert!(matches!(
        h.voting.cast_against("5", "5").await,
        Err(VotingServiceError::SelfVote)
    ));
}

#[tokio::test]
async fn test_vote_for_unknown_subject() {
    let h = harness(&["5", "6"]).await;

    let result = h.voting.cast_for("ghost", "5").await;
    assert!(matches!(result, Err(VotingServiceError::SubjectNotFound)));

    h.voting
        .cast_for("6", "5")
        .await
        .expect("A failed cast must not start the cooldown");
}

#[tokio::test]
async fn test_change_vote_moves_edge() {
    let h = harness(&["5", "7", "9"]).await;

    h.voting.cast_against("7", "5").await.unwrap();

    h.clock.advance(Duration::minutes(10));
    assert!(matches!(
        h.voting.change_vote("7", "9", "5").await,
        Err(VotingServiceError::CooldownActive { .. })
    ));

    h.clock.advance(Duration::hours(1));
    let moved = h.voting.change_vote("7", "9", "5").await.unwrap();
    assert_eq!(moved.subject_id, "9");
    assert_eq!(moved.value, VoteValue::Against);
    assert_eq!(moved.cast_at, t0() + Duration::minutes(70));

    assert_eq!(rating_of(&h, "7").await, 0);
    assert_eq!(rating_of(&h, "9").await, -1);

    h.clock.advance(Duration::hours(2));
    assert!(matches!(
        h.voting.change_vote("7", "9", "5").await,
        Err(VotingServiceError::DuplicateVote)
    ));
    assert!(matches!(
        h.voting.change_vote("7", "5", "5").await,
        Err(VotingServiceError::SelfVote)
    ));
}

#[tokio::test]
async fn test_rating_reads_are_idempotent() {
    let h = harness(&["1", "2", "3", "7"]).await;

    h.voting.cast_for("7", "1").await.unwrap();
    h.voting.cast_for("7", "2").await.unwrap();
    h.voting.cast_against("7", "3").await.unwrap();

    let first = h.ratings.get_rating("7").await.unwrap();
    let second = h.ratings.get_rating("7").await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first.total_rating, 1);

    let all_first = h.ratings.get_all_ratings().await.unwrap();
    let all_second = h.ratings.get_all_ratings().await.unwrap();
    assert_eq!(all_first, all_second);
    assert_eq!(all_first[0].subject_id, "7");
    assert_eq!(all_first.len(), 4);
}

#[tokio::test]
async fn test_detailed_rating_requires_privilege() {
    let h = harness(&["1", "7"]).await;
    h.voting.cast_for("7", "1").await.unwrap();

    assert!(matches!(
        h.ratings.get_detailed_rating("7", Role::User).await,
        Err(RatingServiceError::PermissionDenied)
    ));

    let detailed = h
        .ratings
        .get_detailed_rating("7", Role::Admin)
        .await
        .unwrap();
    assert_eq!(detailed.rating.total_rating, 1);
    assert_eq!(detailed.votes.len(), 1);
    assert_eq!(detailed.votes[0].voter_nickname.as_deref(), Some("user-1"));
    assert_eq!(detailed.votes[0].cast_at, t0());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_casts_from_one_voter() {
    const N: usize = 16;
    let subjects: Vec<String> = (0..N).map(|i| format!("s{}", i)).collect();
    let mut ids: Vec<&str> = subjects.iter().map(String::as_str).collect();
    ids.push("voter");
    let h = harness(&ids).await;

    let mut handles = Vec::with_capacity(N);
    for subject in subjects.clone() {
        let voting = h.voting.clone();
        handles.push(tokio::spawn(async move {
            voting.cast_for(&subject, "voter").await
        }));
    }

    let mut accepted = 0;
    let mut cooldowns = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => accepted += 1,
            Err(VotingServiceError::CooldownActive { .. }) => cooldowns += 1,
            Err(other) => panic!("Unexpected outcome: {:?}", other),
        }
    }

    assert_eq!(accepted, 1, "Exactly one concurrent cast may win");
    assert_eq!(cooldowns, N - 1);

    let total: i64 = h
        .ratings
        .get_all_ratings()
        .await
        .unwrap()
        .iter()
        .map(|r| r.total_rating)
        .sum();
    assert_eq!(total, 1);
    assert!(h.store.find_last_vote_time("voter").await.unwrap().is_some());
}
