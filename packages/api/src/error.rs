use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use shared::services::errors::{
    auth_service_errors::AuthServiceError, rating_service_errors::RatingServiceError,
    user_service_errors::UserServiceError, voting_service_errors::VotingServiceError,
};

#[derive(Debug)]
pub enum ApiError {
    UserService(UserServiceError),
    AuthService(AuthServiceError),
    VotingService(VotingServiceError),
    RatingService(RatingServiceError),
    Unauthorized,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_vote_at: Option<DateTime<Utc>>,
}

impl From<UserServiceError> for ApiError {
    fn from(error: UserServiceError) -> Self {
        ApiError::UserService(error)
    }
}

impl From<AuthServiceError> for ApiError {
    fn from(error: AuthServiceError) -> Self {
        ApiError::AuthService(error)
    }
}

impl From<VotingServiceError> for ApiError {
    fn from(error: VotingServiceError) -> Self {
        ApiError::VotingService(error)
    }
}

impl From<RatingServiceError> for ApiError {
    fn from(error: RatingServiceError) -> Self {
        ApiError::RatingService(error)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::UserService(UserServiceError::UserAlreadyExists) => StatusCode::CONFLICT,
            ApiError::UserService(UserServiceError::UserNotFound) => StatusCode::NOT_FOUND,
            ApiError::UserService(UserServiceError::ValidationError(_)) => StatusCode::BAD_REQUEST,
            ApiError::UserService(UserServiceError::PermissionDenied) => StatusCode::FORBIDDEN,
            ApiError::UserService(
                UserServiceError::RepositoryError(_) | UserServiceError::PasswordHash(_),
            ) => StatusCode::INTERNAL_SERVER_ERROR,

            ApiError::AuthService(AuthServiceError::InvalidCredentials) => StatusCode::UNAUTHORIZED,
            ApiError::AuthService(AuthServiceError::ValidationError(_)) => StatusCode::BAD_REQUEST,
            ApiError::AuthService(AuthServiceError::UserServiceError(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::AuthService(AuthServiceError::JwtError(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::AuthService(
                AuthServiceError::InvalidToken | AuthServiceError::ExpiredToken,
            ) => StatusCode::UNAUTHORIZED,

            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,

            ApiError::VotingService(
                VotingServiceError::SelfVote | VotingServiceError::ValidationError(_),
            ) => StatusCode::BAD_REQUEST,
            ApiError::VotingService(
                VotingServiceError::DuplicateVote | VotingServiceError::ConcurrentUpdate,
            ) => StatusCode::CONFLICT,
            ApiError::VotingService(VotingServiceError::CooldownActive { .. }) => {
                StatusCode::TOO_MANY_REQUESTS
            }
            ApiError::VotingService(
                VotingServiceError::NoSuchVote | VotingServiceError::SubjectNotFound,
            ) => StatusCode::NOT_FOUND,
            ApiError::VotingService(VotingServiceError::StoreFailure(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }

            ApiError::RatingService(RatingServiceError::SubjectNotFound) => StatusCode::NOT_FOUND,
            ApiError::RatingService(RatingServiceError::PermissionDenied) => StatusCode::FORBIDDEN,
            ApiError::RatingService(RatingServiceError::StoreFailure(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::UserService(e) => e.to_string(),
            ApiError::AuthService(e) => e.to_string(),
            ApiError::VotingService(e) => e.to_string(),
            ApiError::RatingService(e) => e.to_string(),
            ApiError::Unauthorized => "Missing or malformed bearer token".to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Store details stay in the logs.
        let error = if status == StatusCode::INTERNAL_SERVER_ERROR {
            "Internal server error".to_string()
        } else {
            self.message()
        };
        let last_vote_at = match self {
            ApiError::VotingService(VotingServiceError::CooldownActive { last_vote_at }) => {
                Some(last_vote_at)
            }
            _ => None,
        };

        (
            status,
            Json(ErrorResponse {
                error,
                last_vote_at,
            }),
        )
            .into_response()
    }
}
