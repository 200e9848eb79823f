use serde::{Deserialize, Serialize};

use crate::models::user::Role;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CreateUserRequest {
    pub nickname: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoginRequest {
    pub nickname: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AssignRoleRequest {
    pub role: Role,
}
