use thiserror::Error;

#[derive(Debug, Error)]
pub enum RatingServiceError {
    #[error("there is no user with that ID")]
    SubjectNotFound,
    #[error("only moderators and admins may see vote details")]
    PermissionDenied,
    #[error("Store failure: {0}")]
    StoreFailure(String),
}
