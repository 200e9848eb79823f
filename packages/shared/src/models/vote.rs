use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The sign of a vote. Stored and transmitted as `1` or `-1`; nothing else
/// deserializes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(into = "i8", try_from = "i8")]
pub enum VoteValue {
    For,
    Against,
}

impl VoteValue {
    pub fn signed(&self) -> i64 {
        match self {
            VoteValue::For => 1,
            VoteValue::Against => -1,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("vote value must be 1 or -1, got {0}")]
pub struct InvalidVoteValue(pub i8);

impl From<VoteValue> for i8 {
    fn from(value: VoteValue) -> Self {
        match value {
            VoteValue::For => 1,
            VoteValue::Against => -1,
        }
    }
}

impl TryFrom<i8> for VoteValue {
    type Error = InvalidVoteValue;

    fn try_from(raw: i8) -> Result<Self, Self::Error> {
        match raw {
            1 => Ok(VoteValue::For),
            -1 => Ok(VoteValue::Against),
            other => Err(InvalidVoteValue(other)),
        }
    }
}

/// A directed rating edge from `voter_id` to `subject_id`.
///
/// DynamoDB layout: partition key `subject_id`, sort key `voter_id`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Vote {
    pub subject_id: String,
    pub voter_id: String,
    pub value: VoteValue,
    pub cast_at: DateTime<Utc>,
}

impl Vote {
    pub fn new(subject_id: &str, voter_id: &str, value: VoteValue, cast_at: DateTime<Utc>) -> Self {
        Vote {
            subject_id: subject_id.to_string(),
            voter_id: voter_id.to_string(),
            value,
            cast_at,
        }
    }
}

/// What a voter is asking for. A change moves an existing vote, so it is not
/// subject to the duplicate guard for the pair it already occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteAction {
    Cast(VoteValue),
    Change,
}

/// Body of a change-vote request. The current subject comes from the path.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChangeVoteRequest {
    pub new_subject_id: String,
}
