//! Thread-safe in-memory storage for tests and local runs.
//!
//! Users and votes sit behind one mutex, so every repository call is a single
//! critical section: the check-then-write sequences that DynamoDB performs in
//! a transaction are atomic here too.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::models::user::User;
use crate::models::vote::Vote;
use crate::repositories::errors::user_repository_errors::UserRepositoryError;
use crate::repositories::errors::vote_repository_errors::VoteRepositoryError;
use crate::repositories::user_repository::UserRepository;
use crate::repositories::vote_repository::VoteRepository;

#[derive(Default)]
struct VoterActivity {
    last_cast_at: Option<DateTime<Utc>>,
    last_withdrawn: Option<String>,
}

#[derive(Default)]
struct State {
    users: HashMap<String, User>,
    // keyed by (subject_id, voter_id)
    votes: BTreeMap<(String, String), Vote>,
    voters: HashMap<String, VoterActivity>,
}

impl State {
    fn last_cast_at(&self, voter_id: &str) -> Option<DateTime<Utc>> {
        self.voters
            .get(voter_id)
            .and_then(|activity| activity.last_cast_at)
    }

    fn is_live_user(&self, user_id: &str) -> bool {
        self.users
            .get(user_id)
            .is_some_and(|user| !user.is_deleted())
    }

    fn nickname_taken(&self, nickname: &str, except_id: &str) -> bool {
        self.users
            .values()
            .any(|user| user.nickname == nickname && user.id != except_id)
    }

    fn record_cast(&mut self, voter_id: &str, cast_at: DateTime<Utc>) {
        let activity = self.voters.entry(voter_id.to_string()).or_default();
        activity.last_cast_at = Some(cast_at);
        activity.last_withdrawn = None;
    }
}

#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn create_user(&self, user: &User) -> Result<(), UserRepositoryError> {
        let mut state = self.state.lock().await;
        if state.users.contains_key(&user.id) {
            return Err(UserRepositoryError::AlreadyExists);
        }
        if state.nickname_taken(&user.nickname, &user.id) {
            return Err(UserRepositoryError::NicknameTaken);
        }
        state.users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn get_user_by_id(&self, user_id: &str) -> Result<User, UserRepositoryError> {
        let state = self.state.lock().await;
        state
            .users
            .get(user_id)
            .cloned()
            .ok_or(UserRepositoryError::NotFound)
    }

    async fn get_user_by_nickname(&self, nickname: &str) -> Result<User, UserRepositoryError> {
        let state = self.state.lock().await;
        state
            .users
            .values()
            .find(|user| user.nickname == nickname)
            .cloned()
            .ok_or(UserRepositoryError::NotFound)
    }

    async fn list_users(&self) -> Result<Vec<User>, UserRepositoryError> {
        let state = self.state.lock().await;
        Ok(state.users.values().cloned().collect())
    }

    async fn update_user(&self, user: &User) -> Result<(), UserRepositoryError> {
        let mut state = self.state.lock().await;
        if !state.users.contains_key(&user.id) {
            return Err(UserRepositoryError::NotFound);
        }
        if state.nickname_taken(&user.nickname, &user.id) {
            return Err(UserRepositoryError::NicknameTaken);
        }
        state.users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn delete_user(
        &self,
        user_id: &str,
        deleted_at: DateTime<Utc>,
    ) -> Result<(), UserRepositoryError> {
        let mut state = self.state.lock().await;
        match state.users.get_mut(user_id) {
            Some(user) if !user.is_deleted() => {
                user.deleted_at = Some(deleted_at);
                Ok(())
            }
            _ => Err(UserRepositoryError::NotFound),
        }
    }
}

#[async_trait]
impl VoteRepository for InMemoryStore {
    async fn insert_vote(
        &self,
        vote: &Vote,
        observed_last_vote: Option<DateTime<Utc>>,
    ) -> Result<(), VoteRepositoryError> {
        let mut state = self.state.lock().await;
        let key = (vote.subject_id.clone(), vote.voter_id.clone());
        if state.votes.contains_key(&key) {
            return Err(VoteRepositoryError::AlreadyExists);
        }
        if !state.is_live_user(&vote.subject_id) {
            return Err(VoteRepositoryError::SubjectNotFound);
        }
        if state.last_cast_at(&vote.voter_id) != observed_last_vote {
            return Err(VoteRepositoryError::ConcurrentModification);
        }
        state.votes.insert(key, vote.clone());
        state.record_cast(&vote.voter_id, vote.cast_at);
        Ok(())
    }

    async fn find_vote_pair(
        &self,
        subject_id: &str,
        voter_id: &str,
    ) -> Result<bool, VoteRepositoryError> {
        let state = self.state.lock().await;
        Ok(state
            .votes
            .contains_key(&(subject_id.to_string(), voter_id.to_string())))
    }

    async fn find_last_vote_time(
        &self,
        voter_id: &str,
    ) -> Result<Option<DateTime<Utc>>, VoteRepositoryError> {
        let state = self.state.lock().await;
        Ok(state.last_cast_at(voter_id))
    }

    async fn find_last_withdrawn(
        &self,
        voter_id: &str,
    ) -> Result<Option<String>, VoteRepositoryError> {
        let state = self.state.lock().await;
        Ok(state
            .voters
            .get(voter_id)
            .and_then(|activity| activity.last_withdrawn.clone()))
    }

    async fn delete_vote(
        &self,
        subject_id: &str,
        voter_id: &str,
    ) -> Result<(), VoteRepositoryError> {
        let mut state = self.state.lock().await;
        state
            .votes
            .remove(&(subject_id.to_string(), voter_id.to_string()))
            .ok_or(VoteRepositoryError::NotFound)?;
        state
            .voters
            .entry(voter_id.to_string())
            .or_default()
            .last_withdrawn = Some(subject_id.to_string());
        Ok(())
    }

    async fn retarget_vote(
        &self,
        voter_id: &str,
        old_subject_id: &str,
        new_subject_id: &str,
        cast_at: DateTime<Utc>,
        observed_last_vote: Option<DateTime<Utc>>,
    ) -> Result<Vote, VoteRepositoryError> {
        let mut state = self.state.lock().await;
        let old_key = (old_subject_id.to_string(), voter_id.to_string());
        let new_key = (new_subject_id.to_string(), voter_id.to_string());

        let value = match state.votes.get(&old_key) {
            Some(vote) => vote.value,
            None => return Err(VoteRepositoryError::NotFound),
        };
        if state.votes.contains_key(&new_key) {
            return Err(VoteRepositoryError::AlreadyExists);
        }
        if !state.is_live_user(new_subject_id) {
            return Err(VoteRepositoryError::SubjectNotFound);
        }
        if state.last_cast_at(voter_id) != observed_last_vote {
            return Err(VoteRepositoryError::ConcurrentModification);
        }

        let vote = Vote::new(new_subject_id, voter_id, value, cast_at);
        state.votes.remove(&old_key);
        state.votes.insert(new_key, vote.clone());
        state.record_cast(voter_id, cast_at);
        Ok(vote)
    }

    async fn list_votes_for_subject(
        &self,
        subject_id: &str,
    ) -> Result<Vec<Vote>, VoteRepositoryError> {
        let state = self.state.lock().await;
        Ok(state
            .votes
            .values()
            .filter(|vote| vote.subject_id == subject_id)
            .cloned()
            .collect())
    }

    async fn list_all_votes(&self) -> Result<Vec<Vote>, VoteRepositoryError> {
        let state = self.state.lock().await;
        Ok(state.votes.values().cloned().collect())
    }
}
