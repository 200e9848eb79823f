use thiserror::Error;

#[derive(Debug, Error)]
pub enum UserRepositoryError {
    #[error("User not found")]
    NotFound,
    #[error("User already exists")]
    AlreadyExists,
    #[error("Nickname already taken")]
    NicknameTaken,
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("DynamoDB error: {0}")]
    DynamoDb(String),
}
