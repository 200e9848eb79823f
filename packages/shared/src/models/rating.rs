use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::vote::{Vote, VoteValue};

/// Aggregate rating of one user. Always derived from the stored votes.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct Rating {
    pub subject_id: String,
    pub nickname: String,
    pub total_rating: i64,
}

impl Rating {
    pub fn from_votes<'a, I>(subject_id: &str, nickname: &str, votes: I) -> Self
    where
        I: IntoIterator<Item = &'a Vote>,
    {
        let total_rating = votes
            .into_iter()
            .filter(|vote| vote.subject_id == subject_id)
            .map(|vote| vote.value.signed())
            .sum();
        Rating {
            subject_id: subject_id.to_string(),
            nickname: nickname.to_string(),
            total_rating,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct VoteDetail {
    pub voter_id: String,
    /// `None` when the voter's account no longer exists.
    pub voter_nickname: Option<String>,
    pub value: VoteValue,
    pub cast_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct DetailedRating {
    #[serde(flatten)]
    pub rating: Rating,
    pub votes: Vec<VoteDetail>,
}
