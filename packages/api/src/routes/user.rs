use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use lambda_http::tracing::{debug, error};

use crate::{error::ApiError, middleware::auth::AuthenticatedUser, state::AppState};
use shared::models::auth::requests::AssignRoleRequest;
use shared::models::user::{UserProfile, UserUpdate};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route(
            "/user/{id}",
            get(get_user).put(update_user).delete(delete_user),
        )
        .route("/user/{id}/role", put(assign_role))
}

async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<UserProfile>>, ApiError> {
    let users = state.user_service.list_users().await.map_err(|e| {
        error!("Failed to list users: {}", e);
        ApiError::from(e)
    })?;
    Ok(Json(users.into_iter().map(UserProfile::from).collect()))
}

async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<UserProfile>, ApiError> {
    state
        .user_service
        .get_user_by_id(&user_id)
        .await
        .map(|user| Json(UserProfile::from(user)))
        .map_err(|e| {
            error!("Failed to retrieve user {}: {}", user_id, e);
            ApiError::from(e)
        })
}

async fn update_user(
    State(state): State<AppState>,
    authenticated_user: AuthenticatedUser,
    Path(user_id): Path<String>,
    Json(changes): Json<UserUpdate>,
) -> Result<Json<UserProfile>, ApiError> {
    let user = state
        .user_service
        .update_user(&authenticated_user.requester(), &user_id, changes)
        .await
        .map_err(|e| {
            error!(
                "User {} failed to update user {}: {}",
                authenticated_user.user_id, user_id, e
            );
            ApiError::from(e)
        })?;
    debug!("User updated successfully: {}", user_id);
    Ok(Json(UserProfile::from(user)))
}

async fn delete_user(
    State(state): State<AppState>,
    authenticated_user: AuthenticatedUser,
    Path(user_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state
        .user_service
        .delete_user(&authenticated_user.requester(), &user_id)
        .await
        .map_err(|e| {
            error!(
                "User {} failed to delete user {}: {}",
                authenticated_user.user_id, user_id, e
            );
            ApiError::from(e)
        })?;
    debug!("User deleted successfully: {}", user_id);
    Ok(StatusCode::NO_CONTENT)
}

async fn assign_role(
    State(state): State<AppState>,
    authenticated_user: AuthenticatedUser,
    Path(user_id): Path<String>,
    Json(request): Json<AssignRoleRequest>,
) -> Result<Json<UserProfile>, ApiError> {
    let user = state
        .user_service
        .assign_role(&authenticated_user.requester(), &user_id, request.role)
        .await
        .map_err(|e| {
            error!(
                "User {} failed to assign role to {}: {}",
                authenticated_user.user_id, user_id, e
            );
            ApiError::from(e)
        })?;
    debug!("Role {:?} assigned to {}", user.role, user_id);
    Ok(Json(UserProfile::from(user)))
}
