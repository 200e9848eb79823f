use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use lambda_http::tracing::{debug, error};

use crate::{error::ApiError, state::AppState};
use shared::models::auth::requests::{CreateUserRequest, LoginRequest};
use shared::models::auth::responses::LoginResponse;
use shared::models::user::UserProfile;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/user", post(create_user))
        .route("/login", post(login))
}

async fn create_user(
    State(state): State<AppState>,
    Json(user_data): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserProfile>), ApiError> {
    let user = state
        .user_service
        .create_user(
            &user_data.nickname,
            &user_data.first_name,
            &user_data.last_name,
            &user_data.password,
        )
        .await
        .map_err(|e| {
            error!("Failed to create user {}: {}", user_data.nickname, e);
            ApiError::from(e)
        })?;
    debug!("User created successfully: {}", user_data.nickname);
    Ok((StatusCode::CREATED, Json(UserProfile::from(user))))
}

async fn login(
    State(state): State<AppState>,
    Json(login_data): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    state
        .auth_service
        .authenticate_user(&login_data.nickname, &login_data.password)
        .await
        .map(Json)
        .map_err(|e| {
            error!("Failed to authenticate user {}: {}", login_data.nickname, e);
            ApiError::from(e)
        })
}
