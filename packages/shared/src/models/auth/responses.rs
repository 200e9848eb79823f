use serde::{Deserialize, Serialize};

use crate::models::user::Role;

#[derive(Debug, Deserialize, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub token_type: String,
    pub expires_in: i64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TokenClaims {
    pub sub: String, // subject (user ID)
    pub nickname: String,
    pub role: Role,
    pub exp: usize, // expiration time
    pub iat: usize, // issued at
}
