//! Cast, withdraw and change votes.
//!
//! Every write follows the same sequence: read the voter's history from the
//! vote store, ask the [`EligibilityEvaluator`] for a verdict, then write
//! with the history that was read as a precondition. If another request for
//! the same voter committed in between, the store refuses the write and the
//! request is re-evaluated against the fresh history instead of retried.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, error, info};

use crate::clock::Clock;
use crate::models::vote::{Vote, VoteAction, VoteValue};
use crate::repositories::errors::vote_repository_errors::VoteRepositoryError;
use crate::repositories::vote_repository::VoteRepository;
use crate::services::eligibility::{EligibilityEvaluator, Verdict, VoterHistory};
use crate::services::errors::voting_service_errors::VotingServiceError;

pub struct VotingService {
    votes: Arc<dyn VoteRepository>,
    clock: Arc<dyn Clock>,
    evaluator: EligibilityEvaluator,
}

fn require_id(field: &str, value: &str) -> Result<(), VotingServiceError> {
    if value.trim().is_empty() {
        return Err(VotingServiceError::ValidationError(format!(
            "{} cannot be empty",
            field
        )));
    }
    Ok(())
}

fn store_failure(e: VoteRepositoryError) -> VotingServiceError {
    error!(error = %e, "Vote store failure");
    VotingServiceError::StoreFailure(e)
}

impl VotingService {
    pub fn new(votes: Arc<dyn VoteRepository>, clock: Arc<dyn Clock>, cooldown: Duration) -> Self {
        VotingService {
            votes,
            clock,
            evaluator: EligibilityEvaluator::new(cooldown),
        }
    }

    pub async fn cast_for(&self, subject_id: &str, voter_id: &str) -> Result<Vote, VotingServiceError> {
        self.cast(subject_id, voter_id, VoteValue::For).await
    }

    pub async fn cast_against(
        &self,
        subject_id: &str,
        voter_id: &str,
    ) -> Result<Vote, VotingServiceError> {
        self.cast(subject_id, voter_id, VoteValue::Against).await
    }

    /// Removes the voter's vote for `subject_id`, returning the pair to the
    /// no-vote state.
    pub async fn withdraw(&self, subject_id: &str, voter_id: &str) -> Result<(), VotingServiceError> {
        require_id("Subject ID", subject_id)?;
        require_id("Voter ID", voter_id)?;

        match self.votes.delete_vote(subject_id, voter_id).await {
            Ok(()) => {
                info!(voter_id = %voter_id, subject_id = %subject_id, "Vote withdrawn");
                Ok(())
            }
            Err(VoteRepositoryError::NotFound) => {
                debug!(voter_id = %voter_id, subject_id = %subject_id, "No vote to withdraw");
                Err(VotingServiceError::NoSuchVote)
            }
            Err(VoteRepositoryError::ConcurrentModification) => {
                // Another write for this voter landed first; it may have been
                // the same withdrawal.
                if self
                    .votes
                    .find_vote_pair(subject_id, voter_id)
                    .await
                    .map_err(store_failure)?
                {
                    debug!(voter_id = %voter_id, subject_id = %subject_id, "Withdrawal lost a race");
                    Err(VotingServiceError::ConcurrentUpdate)
                } else {
                    Err(VotingServiceError::NoSuchVote)
                }
            }
            Err(e) => Err(store_failure(e)),
        }
    }

    /// Moves the voter's vote from `old_subject_id` to `new_subject_id`. The
    /// value is kept and the vote is re-stamped with the current time.
    pub async fn change_vote(
        &self,
        old_subject_id: &str,
        new_subject_id: &str,
        voter_id: &str,
    ) -> Result<Vote, VotingServiceError> {
        require_id("Old subject ID", old_subject_id)?;
        require_id("New subject ID", new_subject_id)?;
        require_id("Voter ID", voter_id)?;
        if old_subject_id == new_subject_id {
            return Err(VotingServiceError::ValidationError(
                "New subject must differ from the current one".to_string(),
            ));
        }

        let now = self.clock.now();
        let history = self.history(new_subject_id, voter_id).await?;
        self.check(voter_id, new_subject_id, VoteAction::Change, &history, now)?;
        if history.pair_exists {
            debug!(voter_id = %voter_id, subject_id = %new_subject_id, "Change target already voted");
            return Err(VotingServiceError::DuplicateVote);
        }

        match self
            .votes
            .retarget_vote(
                voter_id,
                old_subject_id,
                new_subject_id,
                now,
                history.last_vote_at,
            )
            .await
        {
            Ok(vote) => {
                info!(
                    voter_id = %voter_id,
                    from = %old_subject_id,
                    to = %new_subject_id,
                    "Vote changed"
                );
                Ok(vote)
            }
            Err(VoteRepositoryError::NotFound) => Err(VotingServiceError::NoSuchVote),
            Err(VoteRepositoryError::AlreadyExists) => Err(VotingServiceError::DuplicateVote),
            Err(VoteRepositoryError::SubjectNotFound) => Err(VotingServiceError::SubjectNotFound),
            Err(VoteRepositoryError::ConcurrentModification) => {
                self.resolve_conflict(voter_id, new_subject_id, VoteAction::Change, now)
                    .await
            }
            Err(e) => Err(store_failure(e)),
        }
    }

    async fn cast(
        &self,
        subject_id: &str,
        voter_id: &str,
        value: VoteValue,
    ) -> Result<Vote, VotingServiceError> {
        require_id("Subject ID", subject_id)?;
        require_id("Voter ID", voter_id)?;

        let action = VoteAction::Cast(value);
        let now = self.clock.now();
        let history = self.history(subject_id, voter_id).await?;
        self.check(voter_id, subject_id, action, &history, now)?;

        let vote = Vote::new(subject_id, voter_id, value, now);
        match self.votes.insert_vote(&vote, history.last_vote_at).await {
            Ok(()) => {
                info!(
                    voter_id = %voter_id,
                    subject_id = %subject_id,
                    value = value.signed(),
                    "Vote accepted"
                );
                Ok(vote)
            }
            Err(VoteRepositoryError::AlreadyExists) => Err(VotingServiceError::DuplicateVote),
            Err(VoteRepositoryError::SubjectNotFound) => Err(VotingServiceError::SubjectNotFound),
            Err(VoteRepositoryError::ConcurrentModification) => {
                self.resolve_conflict(voter_id, subject_id, action, now)
                    .await
            }
            Err(e) => Err(store_failure(e)),
        }
    }

    async fn history(
        &self,
        subject_id: &str,
        voter_id: &str,
    ) -> Result<VoterHistory, VotingServiceError> {
        let pair_exists = self
            .votes
            .find_vote_pair(subject_id, voter_id)
            .await
            .map_err(store_failure)?;
        let last_vote_at = self
            .votes
            .find_last_vote_time(voter_id)
            .await
            .map_err(store_failure)?;
        let last_withdrawn = self
            .votes
            .find_last_withdrawn(voter_id)
            .await
            .map_err(store_failure)?;
        Ok(VoterHistory {
            last_vote_at,
            pair_exists,
            pair_just_withdrawn: last_withdrawn.as_deref() == Some(subject_id),
        })
    }

    fn check(
        &self,
        voter_id: &str,
        subject_id: &str,
        action: VoteAction,
        history: &VoterHistory,
        now: DateTime<Utc>,
    ) -> Result<(), VotingServiceError> {
        match self
            .evaluator
            .evaluate(voter_id, subject_id, action, history, now)
        {
            Verdict::Accept => Ok(()),
            Verdict::Reject(rejection) => {
                debug!(
                    voter_id = %voter_id,
                    subject_id = %subject_id,
                    reason = ?rejection,
                    "Vote rejected"
                );
                Err(rejection.into())
            }
        }
    }

    /// The write lost a race with another request from the same voter.
    /// Whatever that request did is now in the history, so evaluating again
    /// yields the rejection this request should have had. If there is none,
    /// the caller is told to try again.
    async fn resolve_conflict<T>(
        &self,
        voter_id: &str,
        subject_id: &str,
        action: VoteAction,
        now: DateTime<Utc>,
    ) -> Result<T, VotingServiceError> {
        let history = self.history(subject_id, voter_id).await?;
        self.check(voter_id, subject_id, action, &history, now)?;
        if action == VoteAction::Change && history.pair_exists {
            return Err(VotingServiceError::DuplicateVote);
        }
        debug!(voter_id = %voter_id, subject_id = %subject_id, "Write lost a race, still eligible");
        Err(VotingServiceError::ConcurrentUpdate)
    }
}
