use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use lambda_http::tracing::error;

use crate::{error::ApiError, middleware::auth::AuthenticatedUser, state::AppState};
use shared::models::rating::{DetailedRating, Rating};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/ratings", get(get_all_ratings))
        .route("/user/{id}/rating", get(get_rating))
        .route("/user/{id}/rating/details", get(get_detailed_rating))
}

async fn get_rating(
    State(state): State<AppState>,
    Path(subject_id): Path<String>,
) -> Result<Json<Rating>, ApiError> {
    state
        .rating_service
        .get_rating(&subject_id)
        .await
        .map(Json)
        .map_err(|e| {
            error!("Failed to get rating of {}: {}", subject_id, e);
            ApiError::from(e)
        })
}

async fn get_all_ratings(State(state): State<AppState>) -> Result<Json<Vec<Rating>>, ApiError> {
    state
        .rating_service
        .get_all_ratings()
        .await
        .map(Json)
        .map_err(|e| {
            error!("Failed to list ratings: {}", e);
            ApiError::from(e)
        })
}

async fn get_detailed_rating(
    State(state): State<AppState>,
    authenticated_user: AuthenticatedUser,
    Path(subject_id): Path<String>,
) -> Result<Json<DetailedRating>, ApiError> {
    state
        .rating_service
        .get_detailed_rating(&subject_id, authenticated_user.role)
        .await
        .map(Json)
        .map_err(|e| {
            error!(
                "User {} failed to get rating details of {}: {}",
                authenticated_user.user_id, subject_id, e
            );
            ApiError::from(e)
        })
}
