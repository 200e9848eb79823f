use thiserror::Error;

use crate::services::errors::user_service_errors::UserServiceError;

#[derive(Debug, Error)]
pub enum AuthServiceError {
    #[error("User service error: {0}")]
    UserServiceError(#[from] UserServiceError),
    #[error("Invalid nickname or password")]
    InvalidCredentials,
    #[error("JWT error: {0}")]
    JwtError(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Invalid JWT token")]
    InvalidToken,
    #[error("JWT token has expired")]
    ExpiredToken,
}
