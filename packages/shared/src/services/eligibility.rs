//! Decides whether a vote may be accepted.
//!
//! The evaluator is a pure function of the request and the voter's history as
//! read from the vote store; it holds no state of its own. Rules run in a
//! fixed order and the first failure wins:
//!
//! 1. self-vote guard
//! 2. duplicate-candidate guard (fresh casts only)
//! 3. cooldown guard
//!
//! The cooldown runs from the voter's last cast and is not reset by
//! withdrawing. The only exception is casting again on the pair the voter
//! has just withdrawn, which puts the voter back where they were.
//!
//! [`EligibilityEvaluator::violations`] reports every failing rule, which is
//! what the tests use to check the rules independently.

use chrono::{DateTime, Duration, Utc};

use crate::models::vote::VoteAction;

pub const DEFAULT_COOLDOWN_SECS: i64 = 60 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    SelfVote,
    DuplicateVote,
    /// Carries the last accepted vote so the caller can tell the user when
    /// they may vote again.
    CooldownActive { last_vote_at: DateTime<Utc> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    Reject(Rejection),
}

/// What the store knows about the voter, relative to the requested target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VoterHistory {
    /// Most recent cast or change by this voter, for any subject, whether or
    /// not that vote is still active.
    pub last_vote_at: Option<DateTime<Utc>>,
    /// A vote for the (target subject, voter) pair already exists.
    pub pair_exists: bool,
    /// The target pair is the one the voter withdrew most recently, with no
    /// cast since.
    pub pair_just_withdrawn: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct EligibilityEvaluator {
    cooldown: Duration,
}

impl EligibilityEvaluator {
    pub fn new(cooldown: Duration) -> Self {
        EligibilityEvaluator { cooldown }
    }

    pub fn evaluate(
        &self,
        voter_id: &str,
        subject_id: &str,
        action: VoteAction,
        history: &VoterHistory,
        now: DateTime<Utc>,
    ) -> Verdict {
        match self
            .violations(voter_id, subject_id, action, history, now)
            .into_iter()
            .next()
        {
            Some(rejection) => Verdict::Reject(rejection),
            None => Verdict::Accept,
        }
    }

    /// Every rule the request breaks, in rule order.
    pub fn violations(
        &self,
        voter_id: &str,
        subject_id: &str,
        action: VoteAction,
        history: &VoterHistory,
        now: DateTime<Utc>,
    ) -> Vec<Rejection> {
        let mut violations = Vec::new();

        if voter_id == subject_id {
            violations.push(Rejection::SelfVote);
        }

        if history.pair_exists && matches!(action, VoteAction::Cast(_)) {
            violations.push(Rejection::DuplicateVote);
        }

        let recast = history.pair_just_withdrawn && matches!(action, VoteAction::Cast(_));
        if let Some(last_vote_at) = history.last_vote_at.filter(|_| !recast) {
            if self.within_cooldown(last_vote_at, now) {
                violations.push(Rejection::CooldownActive { last_vote_at });
            }
        }

        violations
    }

    /// Inclusive at the boundary: exactly one cooldown after the last vote is
    /// still too early.
    fn within_cooldown(&self, last_vote_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(last_vote_at) <= self.cooldown
    }
}
