//! Persistence for the voting ledger.
//!
//! Besides one item per vote, the votes table holds one ledger item per voter
//! (partition key [`LEDGER_PARTITION`], sort key = voter id) with the time of
//! the voter's last cast, the subject they last withdrew from and a revision
//! number. Every write that touches a voter's votes rewrites that ledger item
//! in the same transaction under a `revision = :seen` condition, so writes for
//! one voter are serialized while writes from different voters never contend.

use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_dynamodb::error::SdkError;
use aws_sdk_dynamodb::operation::transact_write_items::TransactWriteItemsError;
use aws_sdk_dynamodb::types::{AttributeValue, ConditionCheck, Delete, Put, TransactWriteItem};
use aws_sdk_dynamodb::Client;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_dynamo::{from_item, to_attribute_value, to_item};
use tracing::debug;

use crate::models::vote::Vote;
use crate::repositories::errors::vote_repository_errors::VoteRepositoryError;

#[cfg(test)]
use mockall::automock;

pub const LEDGER_PARTITION: &str = "#voter-ledger";

#[cfg_attr(test, automock)]
#[async_trait]
pub trait VoteRepository: Send + Sync {
    /// Stores `vote`. `observed_last_vote` is the voter's last vote time as
    /// read before deciding to accept; the write fails with
    /// `ConcurrentModification` if it no longer matches.
    async fn insert_vote(
        &self,
        vote: &Vote,
        observed_last_vote: Option<DateTime<Utc>>,
    ) -> Result<(), VoteRepositoryError>;

    async fn find_vote_pair(
        &self,
        subject_id: &str,
        voter_id: &str,
    ) -> Result<bool, VoteRepositoryError>;

    /// Time of the voter's last cast or change, kept when that vote is later
    /// withdrawn. `None` means the voter has never voted.
    async fn find_last_vote_time(
        &self,
        voter_id: &str,
    ) -> Result<Option<DateTime<Utc>>, VoteRepositoryError>;

    /// Subject of the voter's most recent withdrawal, cleared by their next
    /// cast or change.
    async fn find_last_withdrawn(
        &self,
        voter_id: &str,
    ) -> Result<Option<String>, VoteRepositoryError>;

    async fn delete_vote(&self, subject_id: &str, voter_id: &str)
        -> Result<(), VoteRepositoryError>;

    /// Moves the voter's vote from `old_subject_id` to `new_subject_id`,
    /// keeping its value and stamping `cast_at`.
    async fn retarget_vote(
        &self,
        voter_id: &str,
        old_subject_id: &str,
        new_subject_id: &str,
        cast_at: DateTime<Utc>,
        observed_last_vote: Option<DateTime<Utc>>,
    ) -> Result<Vote, VoteRepositoryError>;

    async fn list_votes_for_subject(
        &self,
        subject_id: &str,
    ) -> Result<Vec<Vote>, VoteRepositoryError>;

    async fn list_all_votes(&self) -> Result<Vec<Vote>, VoteRepositoryError>;
}

/// Per-voter bookkeeping item stored next to the votes.
#[derive(Debug, Clone, Deserialize, Serialize)]
struct VoterLedger {
    subject_id: String,
    voter_id: String,
    revision: u64,
    #[serde(default)]
    last_cast_at: Option<DateTime<Utc>>,
    #[serde(default)]
    last_withdrawn: Option<String>,
}

impl VoterLedger {
    fn empty(voter_id: &str) -> Self {
        VoterLedger {
            subject_id: LEDGER_PARTITION.to_string(),
            voter_id: voter_id.to_string(),
            revision: 0,
            last_cast_at: None,
            last_withdrawn: None,
        }
    }

    fn next(&self) -> Self {
        VoterLedger {
            revision: self.revision + 1,
            ..self.clone()
        }
    }

    fn after_cast(&self, cast_at: DateTime<Utc>) -> Self {
        VoterLedger {
            last_cast_at: Some(cast_at),
            last_withdrawn: None,
            ..self.next()
        }
    }

    fn after_withdraw(&self, subject_id: &str) -> Self {
        VoterLedger {
            last_withdrawn: Some(subject_id.to_string()),
            ..self.next()
        }
    }
}

/// Which condition a transaction item enforces, in item order.
#[derive(Debug, Clone, Copy)]
enum Guard {
    VoteAbsent,
    VotePresent,
    SubjectExists,
    LedgerUnchanged,
}

impl Guard {
    fn violation(self) -> VoteRepositoryError {
        match self {
            Guard::VoteAbsent => VoteRepositoryError::AlreadyExists,
            Guard::VotePresent => VoteRepositoryError::NotFound,
            Guard::SubjectExists => VoteRepositoryError::SubjectNotFound,
            Guard::LedgerUnchanged => VoteRepositoryError::ConcurrentModification,
        }
    }
}

fn transaction_error<R: std::fmt::Debug>(
    err: SdkError<TransactWriteItemsError, R>,
    guards: &[Guard],
) -> VoteRepositoryError {
    if let SdkError::ServiceError(service_err) = &err {
        if let TransactWriteItemsError::TransactionCanceledException(cancelled) = service_err.err()
        {
            for (reason, guard) in cancelled.cancellation_reasons().iter().zip(guards) {
                if reason.code() == Some("ConditionalCheckFailed") {
                    return guard.violation();
                }
            }
        }
    }
    VoteRepositoryError::DynamoDb(err.to_string())
}

fn build_error(e: impl std::fmt::Display) -> VoteRepositoryError {
    VoteRepositoryError::DynamoDb(e.to_string())
}

fn serialization_error(e: impl std::fmt::Display) -> VoteRepositoryError {
    VoteRepositoryError::Serialization(e.to_string())
}

pub struct DynamoDbVoteRepository {
    pub client: Client,
    pub table_name: String,
    pub users_table_name: String,
}

impl DynamoDbVoteRepository {
    pub fn new(
        client: Client,
        table_name: impl Into<String>,
        users_table_name: impl Into<String>,
    ) -> Self {
        Self {
            client,
            table_name: table_name.into(),
            users_table_name: users_table_name.into(),
        }
    }

    fn vote_key(subject_id: &str, voter_id: &str) -> HashMap<String, AttributeValue> {
        HashMap::from([
            (
                "subject_id".to_string(),
                AttributeValue::S(subject_id.to_string()),
            ),
            ("voter_id".to_string(), AttributeValue::S(voter_id.to_string())),
        ])
    }

    async fn get_vote(
        &self,
        subject_id: &str,
        voter_id: &str,
    ) -> Result<Option<Vote>, VoteRepositoryError> {
        let output = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .set_key(Some(Self::vote_key(subject_id, voter_id)))
            .consistent_read(true)
            .send()
            .await
            .map_err(|e| VoteRepositoryError::DynamoDb(e.to_string()))?;
        output
            .item
            .map(|item| from_item(item).map_err(serialization_error))
            .transpose()
    }

    async fn load_ledger(&self, voter_id: &str) -> Result<VoterLedger, VoteRepositoryError> {
        let output = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .set_key(Some(Self::vote_key(LEDGER_PARTITION, voter_id)))
            .consistent_read(true)
            .send()
            .await
            .map_err(|e| VoteRepositoryError::DynamoDb(e.to_string()))?;
        match output.item {
            Some(item) => from_item(item).map_err(serialization_error),
            None => Ok(VoterLedger::empty(voter_id)),
        }
    }

    /// Writes `next` in place of `seen`, conditional on nobody else having
    /// written the ledger since it was read.
    fn ledger_write(
        &self,
        seen: &VoterLedger,
        next: &VoterLedger,
    ) -> Result<TransactWriteItem, VoteRepositoryError> {
        let revision_condition = if seen.revision == 0 {
            "attribute_not_exists(revision)"
        } else {
            "revision = :seen"
        };

        let item = to_item(next).map_err(serialization_error)?;
        let mut put = Put::builder()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .condition_expression(revision_condition);
        if seen.revision != 0 {
            put = put.expression_attribute_values(
                ":seen",
                AttributeValue::N(seen.revision.to_string()),
            );
        }
        Ok(TransactWriteItem::builder()
            .put(put.build().map_err(build_error)?)
            .build())
    }

    fn subject_check(&self, subject_id: &str) -> Result<TransactWriteItem, VoteRepositoryError> {
        let check = ConditionCheck::builder()
            .table_name(&self.users_table_name)
            .key("id", AttributeValue::S(subject_id.to_string()))
            .condition_expression("attribute_exists(id) AND attribute_not_exists(deleted_at)")
            .build()
            .map_err(build_error)?;
        Ok(TransactWriteItem::builder().condition_check(check).build())
    }

    fn vote_put(&self, vote: &Vote) -> Result<TransactWriteItem, VoteRepositoryError> {
        let item = to_item(vote).map_err(serialization_error)?;
        let put = Put::builder()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .condition_expression("attribute_not_exists(voter_id)")
            .build()
            .map_err(build_error)?;
        Ok(TransactWriteItem::builder().put(put).build())
    }

    fn vote_delete(
        &self,
        subject_id: &str,
        voter_id: &str,
    ) -> Result<TransactWriteItem, VoteRepositoryError> {
        let delete = Delete::builder()
            .table_name(&self.table_name)
            .set_key(Some(Self::vote_key(subject_id, voter_id)))
            .condition_expression("attribute_exists(voter_id)")
            .build()
            .map_err(build_error)?;
        Ok(TransactWriteItem::builder().delete(delete).build())
    }

    async fn scan_votes(&self) -> Result<Vec<Vote>, VoteRepositoryError> {
        let mut votes = Vec::new();
        let mut start_key = None;
        loop {
            let output = self
                .client
                .scan()
                .table_name(&self.table_name)
                .filter_expression("subject_id <> :ledger")
                .expression_attribute_values(
                    ":ledger",
                    AttributeValue::S(LEDGER_PARTITION.to_string()),
                )
                .set_exclusive_start_key(start_key)
                .send()
                .await
                .map_err(|e| VoteRepositoryError::DynamoDb(e.to_string()))?;
            for item in output.items.unwrap_or_default() {
                votes.push(from_item(item).map_err(serialization_error)?);
            }
            start_key = output.last_evaluated_key;
            if start_key.is_none() {
                break;
            }
        }
        Ok(votes)
    }
}

#[async_trait]
impl VoteRepository for DynamoDbVoteRepository {
    async fn insert_vote(
        &self,
        vote: &Vote,
        observed_last_vote: Option<DateTime<Utc>>,
    ) -> Result<(), VoteRepositoryError> {
        let ledger = self.load_ledger(&vote.voter_id).await?;
        if ledger.last_cast_at != observed_last_vote {
            return Err(VoteRepositoryError::ConcurrentModification);
        }
        let next = ledger.after_cast(vote.cast_at);

        self.client
            .transact_write_items()
            .transact_items(self.vote_put(vote)?)
            .transact_items(self.subject_check(&vote.subject_id)?)
            .transact_items(self.ledger_write(&ledger, &next)?)
            .send()
            .await
            .map_err(|e| {
                transaction_error(
                    e,
                    &[Guard::VoteAbsent, Guard::SubjectExists, Guard::LedgerUnchanged],
                )
            })?;
        debug!(
            subject_id = %vote.subject_id,
            voter_id = %vote.voter_id,
            revision = next.revision,
            "vote stored"
        );
        Ok(())
    }

    async fn find_vote_pair(
        &self,
        subject_id: &str,
        voter_id: &str,
    ) -> Result<bool, VoteRepositoryError> {
        Ok(self.get_vote(subject_id, voter_id).await?.is_some())
    }

    async fn find_last_vote_time(
        &self,
        voter_id: &str,
    ) -> Result<Option<DateTime<Utc>>, VoteRepositoryError> {
        Ok(self.load_ledger(voter_id).await?.last_cast_at)
    }

    async fn find_last_withdrawn(
        &self,
        voter_id: &str,
    ) -> Result<Option<String>, VoteRepositoryError> {
        Ok(self.load_ledger(voter_id).await?.last_withdrawn)
    }

    async fn delete_vote(
        &self,
        subject_id: &str,
        voter_id: &str,
    ) -> Result<(), VoteRepositoryError> {
        let ledger = self.load_ledger(voter_id).await?;
        let next = ledger.after_withdraw(subject_id);

        self.client
            .transact_write_items()
            .transact_items(self.vote_delete(subject_id, voter_id)?)
            .transact_items(self.ledger_write(&ledger, &next)?)
            .send()
            .await
            .map_err(|e| transaction_error(e, &[Guard::VotePresent, Guard::LedgerUnchanged]))?;
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
        let old_vote = self
            .get_vote(old_subject_id, voter_id)
            .await?
            .ok_or(VoteRepositoryError::NotFound)?;
        let ledger = self.load_ledger(voter_id).await?;
        if ledger.last_cast_at != observed_last_vote {
            return Err(VoteRepositoryError::ConcurrentModification);
        }

        let new_vote = Vote::new(new_subject_id, voter_id, old_vote.value, cast_at);
        let next = ledger.after_cast(cast_at);

        self.client
            .transact_write_items()
            .transact_items(self.vote_delete(old_subject_id, voter_id)?)
            .transact_items(self.vote_put(&new_vote)?)
            .transact_items(self.subject_check(new_subject_id)?)
            .transact_items(self.ledger_write(&ledger, &next)?)
            .send()
            .await
            .map_err(|e| {
                transaction_error(
                    e,
                    &[
                        Guard::VotePresent,
                        Guard::VoteAbsent,
                        Guard::SubjectExists,
                        Guard::LedgerUnchanged,
                    ],
                )
            })?;
        Ok(new_vote)
    }

    async fn list_votes_for_subject(
        &self,
        subject_id: &str,
    ) -> Result<Vec<Vote>, VoteRepositoryError> {
        let mut votes = Vec::new();
        let mut start_key = None;
        loop {
            let output = self
                .client
                .query()
                .table_name(&self.table_name)
                .key_condition_expression("subject_id = :subject_id")
                .expression_attribute_values(
                    ":subject_id",
                    to_attribute_value(subject_id).map_err(serialization_error)?,
                )
                .set_exclusive_start_key(start_key)
                .send()
                .await
                .map_err(|e| VoteRepositoryError::DynamoDb(e.to_string()))?;
            for item in output.items.unwrap_or_default() {
                votes.push(from_item(item).map_err(serialization_error)?);
            }
            start_key = output.last_evaluated_key;
            if start_key.is_none() {
                break;
            }
        }
        Ok(votes)
    }

    async fn list_all_votes(&self) -> Result<Vec<Vote>, VoteRepositoryError> {
        self.scan_votes().await
    }
}
