//! Ratings are never stored: every read sums the subject's votes as they are
//! in the vote store at that moment.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, error};

use crate::models::rating::{DetailedRating, Rating, VoteDetail};
use crate::models::user::{Role, User};
use crate::repositories::errors::user_repository_errors::UserRepositoryError;
use crate::repositories::user_repository::UserRepository;
use crate::repositories::vote_repository::VoteRepository;
use crate::services::errors::rating_service_errors::RatingServiceError;

pub struct RatingService {
    users: Arc<dyn UserRepository>,
    votes: Arc<dyn VoteRepository>,
}

impl RatingService {
    pub fn new(users: Arc<dyn UserRepository>, votes: Arc<dyn VoteRepository>) -> Self {
        RatingService { users, votes }
    }

    async fn subject(&self, subject_id: &str) -> Result<User, RatingServiceError> {
        match self.users.get_user_by_id(subject_id).await {
            Ok(user) if !user.is_deleted() => Ok(user),
            Ok(_) | Err(UserRepositoryError::NotFound) => Err(RatingServiceError::SubjectNotFound),
            Err(e) => {
                error!(subject_id = %subject_id, error = %e, "Failed to load subject");
                Err(RatingServiceError::StoreFailure(e.to_string()))
            }
        }
    }

    pub async fn get_rating(&self, subject_id: &str) -> Result<Rating, RatingServiceError> {
        let subject = self.subject(subject_id).await?;
        let votes = self
            .votes
            .list_votes_for_subject(subject_id)
            .await
            .map_err(|e| RatingServiceError::StoreFailure(e.to_string()))?;

        Ok(Rating::from_votes(&subject.id, &subject.nickname, votes.iter()))
    }

    /// One entry per registered user that is not deleted, highest rating first. Ties are broken
    /// by nickname and then id so the order is stable between reads.
    pub async fn get_all_ratings(&self) -> Result<Vec<Rating>, RatingServiceError> {
        let users = self
            .users
            .list_users()
            .await
            .map_err(|e| RatingServiceError::StoreFailure(e.to_string()))?;
        let votes = self
            .votes
            .list_all_votes()
            .await
            .map_err(|e| RatingServiceError::StoreFailure(e.to_string()))?;

        let mut totals: HashMap<&str, i64> = HashMap::new();
        for vote in &votes {
            *totals.entry(vote.subject_id.as_str()).or_insert(0) += vote.value.signed();
        }

        let mut ratings: Vec<Rating> = users
            .into_iter()
            .filter(|user| !user.is_deleted())
            .map(|user| Rating {
                total_rating: totals.get(user.id.as_str()).copied().unwrap_or(0),
                subject_id: user.id,
                nickname: user.nickname,
            })
            .collect();
        ratings.sort_by(|a, b| {
            b.total_rating
                .cmp(&a.total_rating)
                .then_with(|| a.nickname.cmp(&b.nickname))
                .then_with(|| a.subject_id.cmp(&b.subject_id))
        });

        debug!(count = ratings.len(), "Computed all ratings");
        Ok(ratings)
    }

    /// Who voted and when. Only moderators and admins may ask, and the role is
    /// checked before anything is read.
    pub async fn get_detailed_rating(
        &self,
        subject_id: &str,
        requester_role: Role,
    ) -> Result<DetailedRating, RatingServiceError> {
        if !requester_role.is_privileged() {
            return Err(RatingServiceError::PermissionDenied);
        }

        let subject = self.subject(subject_id).await?;
        let mut votes = self
            .votes
            .list_votes_for_subject(subject_id)
            .await
            .map_err(|e| RatingServiceError::StoreFailure(e.to_string()))?;
        votes.sort_by(|a, b| {
            a.cast_at
                .cmp(&b.cast_at)
                .then_with(|| a.voter_id.cmp(&b.voter_id))
        });

        let rating = Rating::from_votes(&subject.id, &subject.nickname, votes.iter());

        let mut details = Vec::with_capacity(votes.len());
        for vote in votes {
            // Deleted voters are still found; only ids the store never knew lose their name.
            let voter_nickname = match self.users.get_user_by_id(&vote.voter_id).await {
                Ok(voter) => Some(voter.nickname),
                Err(UserRepositoryError::NotFound) => None,
                Err(e) => return Err(RatingServiceError::StoreFailure(e.to_string())),
            };
            details.push(VoteDetail {
                voter_id: vote.voter_id,
                voter_nickname,
                value: vote.value,
                cast_at: vote.cast_at,
            });
        }

        Ok(DetailedRating {
            rating,
            votes: details,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::vote::{Vote, VoteValue};
    use crate::repositories::errors::vote_repository_errors::VoteRepositoryError;
    use crate::repositories::user_repository::MockUserRepository;
    use crate::repositories::vote_repository::MockVoteRepository;
    use chrono::{Duration, TimeZone, Utc};

    fn user_with_id(id: &str, nickname: &str) -> User {
        let mut user = User::new(
            nickname.to_string(),
            "Test".to_string(),
            "User".to_string(),
            "hashed".to_string(),
        );
        user.id = id.to_string();
        user
    }

    fn vote(subject: &str, voter: &str, value: VoteValue, minutes: i64) -> Vote {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap();
        Vote::new(subject, voter, value, t0 + Duration::minutes(minutes))
    }

    #[tokio::test]
    async fn test_get_rating_sums_votes() {
        let mut users = MockUserRepository::new();
        users
            .expect_get_user_by_id()
            .returning(|id| Ok(user_with_id(id, "seven")));
        let mut votes = MockVoteRepository::new();
        votes.expect_list_votes_for_subject().returning(|_| {
            Ok(vec![
                vote("7", "1", VoteValue::For, 0),
                vote("7", "2", VoteValue::For, 5),
                vote("7", "3", VoteValue::Against, 10),
            ])
        });

        let service = RatingService::new(Arc::new(users), Arc::new(votes));
        let rating = service.get_rating("7").await.unwrap();

        assert_eq!(rating.subject_id, "7");
        assert_eq!(rating.nickname, "seven");
        assert_eq!(rating.total_rating, 1);
    }

    #[tokio::test]
    async fn test_get_rating_unknown_subject() {
        let mut users = MockUserRepository::new();
        users
            .expect_get_user_by_id()
            .returning(|_| Err(UserRepositoryError::NotFound));
        let mut votes = MockVoteRepository::new();
        votes.expect_list_votes_for_subject().never();

        let service = RatingService::new(Arc::new(users), Arc::new(votes));
        let result = service.get_rating("ghost").await;

        assert!(matches!(result, Err(RatingServiceError::SubjectNotFound)));
    }

    #[tokio::test]
    async fn test_get_rating_store_failure() {
        let mut users = MockUserRepository::new();
        users
            .expect_get_user_by_id()
            .returning(|id| Ok(user_with_id(id, "seven")));
        let mut votes = MockVoteRepository::new();
        votes
            .expect_list_votes_for_subject()
            .returning(|_| Err(VoteRepositoryError::DynamoDb("timeout".to_string())));

        let service = RatingService::new(Arc::new(users), Arc::new(votes));
        let result = service.get_rating("7").await;

        assert!(matches!(result, Err(RatingServiceError::StoreFailure(_))));
    }

    #[tokio::test]
    async fn test_get_all_ratings_ordering() {
        let mut users = MockUserRepository::new();
        users.expect_list_users().returning(|| {
            Ok(vec![
                user_with_id("a", "zoe"),
                user_with_id("b", "bob"),
                user_with_id("c", "amy"),
                user_with_id("d", "dan"),
            ])
        });
        let mut votes = MockVoteRepository::new();
        votes.expect_list_all_votes().returning(|| {
            Ok(vec![
                vote("a", "b", VoteValue::For, 0),
                vote("a", "c", VoteValue::For, 1),
                vote("d", "a", VoteValue::Against, 2),
            ])
        });

        let service = RatingService::new(Arc::new(users), Arc::new(votes));
        let ratings = service.get_all_ratings().await.unwrap();

        let summary: Vec<(&str, i64)> = ratings
            .iter()
            .map(|r| (r.nickname.as_str(), r.total_rating))
            .collect();
        assert_eq!(
            summary,
            vec![("zoe", 2), ("amy", 0), ("bob", 0), ("dan", -1)]
        );
    }

    #[tokio::test]
    async fn test_deleted_users_drop_out_of_ratings() {
        let mut users = MockUserRepository::new();
        users.expect_list_users().returning(|| {
            let mut gone = user_with_id("g", "gone");
            gone.deleted_at = Some(Utc::now());
            Ok(vec![user_with_id("a", "amy"), gone])
        });
        users.expect_get_user_by_id().returning(|id| {
            let mut user = user_with_id(id, "gone");
            user.deleted_at = Some(Utc::now());
            Ok(user)
        });
        let mut votes = MockVoteRepository::new();
        votes
            .expect_list_all_votes()
            .returning(|| Ok(vec![vote("g", "a", VoteValue::For, 0)]));
        votes.expect_list_votes_for_subject().never();

        let service = RatingService::new(Arc::new(users), Arc::new(votes));
        let ratings = service.get_all_ratings().await.unwrap();
        assert_eq!(ratings.len(), 1);
        assert_eq!(ratings[0].subject_id, "a");

        assert!(matches!(
            service.get_rating("g").await,
            Err(RatingServiceError::SubjectNotFound)
        ));
        assert!(matches!(
            service.get_detailed_rating("g", Role::Admin).await,
            Err(RatingServiceError::SubjectNotFound)
        ));
    }

    #[tokio::test]
    async fn test_detailed_rating_denied_before_any_read() {
        let mut users = MockUserRepository::new();
        users.expect_get_user_by_id().never();
        let mut votes = MockVoteRepository::new();
        votes.expect_list_votes_for_subject().never();

        let service = RatingService::new(Arc::new(users), Arc::new(votes));
        let result = service.get_detailed_rating("7", Role::User).await;

        assert!(matches!(result, Err(RatingServiceError::PermissionDenied)));
    }

    #[tokio::test]
    async fn test_detailed_rating_for_moderator() {
        let mut users = MockUserRepository::new();
        users.expect_get_user_by_id().returning(|id| match id {
            "7" => Ok(user_with_id("7", "seven")),
            "1" => Ok(user_with_id("1", "one")),
            "2" => {
                let mut former = user_with_id("2", "former");
                former.deleted_at = Some(Utc::now());
                Ok(former)
            }
            _ => Err(UserRepositoryError::NotFound),
        });
        let mut votes = MockVoteRepository::new();
        votes.expect_list_votes_for_subject().returning(|_| {
            Ok(vec![
                vote("7", "gone", VoteValue::Against, 30),
                vote("7", "1", VoteValue::For, 0),
                vote("7", "2", VoteValue::For, 10),
            ])
        });

        let service = RatingService::new(Arc::new(users), Arc::new(votes));
        let detailed = service
            .get_detailed_rating("7", Role::Moderator)
            .await
            .unwrap();

        assert_eq!(detailed.rating.total_rating, 1);
        assert_eq!(detailed.votes.len(), 3);
        assert_eq!(detailed.votes[0].voter_id, "1");
        assert_eq!(detailed.votes[0].voter_nickname.as_deref(), Some("one"));
        assert_eq!(detailed.votes[1].voter_nickname.as_deref(), Some("former"));
        assert_eq!(detailed.votes[2].voter_id, "gone");
        assert!(detailed.votes[2].voter_nickname.is_none());
    }
}
