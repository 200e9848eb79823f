use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use std::sync::Arc;
use tracing::debug;

use crate::models::auth::responses::{LoginResponse, TokenClaims};
use crate::models::user::User;

use crate::services::errors::auth_service_errors::AuthServiceError;
use crate::services::errors::user_service_errors::UserServiceError;
use crate::services::password::verify_password;
use crate::services::user_service::UserService;

pub struct AuthService {
    user_service: Arc<UserService>,
    jwt_secret: String,
    token_ttl: Duration,
}

impl AuthService {
    pub fn new(user_service: Arc<UserService>, jwt_secret: String, token_ttl: Duration) -> Self {
        AuthService {
            user_service,
            jwt_secret,
            token_ttl,
        }
    }

    pub async fn authenticate_user(
        &self,
        nickname: &str,
        password: &str,
    ) -> Result<LoginResponse, AuthServiceError> {
        if nickname.is_empty() || password.is_empty() {
            return Err(AuthServiceError::ValidationError(
                "Nickname or password cannot be empty".to_string(),
            ));
        }

        match self.user_service.get_user_by_nickname(nickname).await {
            Ok(user) => {
                if verify_password(password, &user.password) {
                    self.generate_token(&user)
                } else {
                    debug!(nickname = %nickname, "Password mismatch");
                    Err(AuthServiceError::InvalidCredentials)
                }
            }
            Err(UserServiceError::UserNotFound) => Err(AuthServiceError::InvalidCredentials),
            Err(err) => Err(AuthServiceError::UserServiceError(err)),
        }
    }

    pub fn generate_token(&self, user: &User) -> Result<LoginResponse, AuthServiceError> {
        let now = Utc::now();
        let exp = (now + self.token_ttl).timestamp() as usize;
        let iat = now.timestamp() as usize;

        let claims = TokenClaims {
            sub: user.id.clone(),
            nickname: user.nickname.clone(),
            role: user.role,
            exp,
            iat,
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_ref()),
        )
        .map_err(|e| AuthServiceError::JwtError(format!("{:#?}", e)))?;

        Ok(LoginResponse {
            token,
            token_type: "Bearer".to_string(),
            expires_in: self.token_ttl.num_seconds(),
        })
    }

    pub fn verify_token(&self, token: &str) -> Result<TokenClaims, AuthServiceError> {
        let decoding_key = DecodingKey::from_secret(self.jwt_secret.as_ref());
        let validation = Validation::default();

        match decode::<TokenClaims>(token, &decoding_key, &validation) {
            Ok(token_data) => {
                let now = Utc::now().timestamp() as usize;
                if token_data.claims.exp < now {
                    Err(AuthServiceError::ExpiredToken)
                } else {
                    Ok(token_data.claims)
                }
            }
            Err(err) => match err.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    Err(AuthServiceError::ExpiredToken)
                }
                _ => Err(AuthServiceError::InvalidToken),
            },
        }
    }
}
