use thiserror::Error;

#[derive(Debug, Error)]
pub enum VoteRepositoryError {
    /// No vote exists for the requested (subject, voter) pair.
    #[error("Vote not found")]
    NotFound,
    #[error("Subject user not found")]
    SubjectNotFound,
    /// A vote for the (subject, voter) pair is already stored.
    #[error("Vote already exists")]
    AlreadyExists,
    /// The voter's last vote time moved between read and write.
    #[error("Voter history changed concurrently")]
    ConcurrentModification,
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("DynamoDB error: {0}")]
    DynamoDb(String),
}
