use axum::{extract::FromRequestParts, http::header::AUTHORIZATION, http::request::Parts};

use crate::{error::ApiError, state::AppState};
use shared::models::user::{Requester, Role};
use shared::services::errors::auth_service_errors::AuthServiceError;

/// Identity taken from a verified bearer token. Handlers pass it into the
/// services explicitly; nothing downstream looks at the token again.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: String,
    pub nickname: String,
    pub role: Role,
}

impl AuthenticatedUser {
    pub fn requester(&self) -> Requester {
        Requester::new(self.user_id.clone(), self.role)
    }
}

impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or(ApiError::Unauthorized)?
            .to_str()
            .map_err(|_| {
                ApiError::AuthService(AuthServiceError::ValidationError(
                    "Invalid header format".to_string(),
                ))
            })?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(ApiError::Unauthorized)?;

        let claims = state.auth_service.verify_token(token)?;

        Ok(AuthenticatedUser {
            user_id: claims.sub,
            nickname: claims.nickname,
            role: claims.role,
        })
    }
}
