use thiserror::Error;

#[derive(Debug, Error)]
pub enum UserServiceError {
    #[error("Repository error: {0}")]
    RepositoryError(String),
    #[error("User already exists")]
    UserAlreadyExists,
    #[error("User not found")]
    UserNotFound,
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Permission denied")]
    PermissionDenied,
    #[error("Password hashing error: {0}")]
    PasswordHash(String),
}
