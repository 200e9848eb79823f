use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::repositories::errors::vote_repository_errors::VoteRepositoryError;
use crate::services::eligibility::Rejection;

/// Outcome of a vote operation that did not go through.
///
/// Guard rejections are never retried. `StoreFailure` is the only variant that
/// wraps an underlying error.
#[derive(Debug, Error)]
pub enum VotingServiceError {
    #[error("you are not allowed to vote for yourself")]
    SelfVote,
    #[error("user cannot vote for the same candidate twice")]
    DuplicateVote,
    #[error("user only allowed to vote once per cooldown window, last vote was at {}", .last_vote_at.format("%Y-%m-%d %H:%M:%S UTC"))]
    CooldownActive { last_vote_at: DateTime<Utc> },
    #[error("there is no such vote to delete")]
    NoSuchVote,
    #[error("there is no user with that ID")]
    SubjectNotFound,
    #[error("Validation error: {0}")]
    ValidationError(String),
    /// Another request for the same voter committed first and this one is
    /// still eligible; the caller may try again.
    #[error("concurrent update, try again")]
    ConcurrentUpdate,
    #[error("Vote store failure: {0}")]
    StoreFailure(#[source] VoteRepositoryError),
}

impl From<Rejection> for VotingServiceError {
    fn from(rejection: Rejection) -> Self {
        match rejection {
            Rejection::SelfVote => VotingServiceError::SelfVote,
            Rejection::DuplicateVote => VotingServiceError::DuplicateVote,
            Rejection::CooldownActive { last_vote_at } => {
                VotingServiceError::CooldownActive { last_vote_at }
            }
        }
    }
}
