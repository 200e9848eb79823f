use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{post, put},
    Json, Router,
};
use lambda_http::tracing::{debug, error};

use crate::{error::ApiError, middleware::auth::AuthenticatedUser, state::AppState};
use shared::models::vote::{ChangeVoteRequest, Vote};
use shared::services::errors::voting_service_errors::VotingServiceError;

/// `{id}` is always the subject being voted on; the voter is the caller.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/user/{id}/vote_for", post(vote_for))
        .route("/user/{id}/vote_against", post(vote_against))
        .route("/user/{id}/vote", put(change_vote).delete(withdraw_vote))
}

fn log_failure(voter_id: &str, subject_id: &str, e: VotingServiceError) -> ApiError {
    match &e {
        VotingServiceError::StoreFailure(_) => {
            error!("Vote by {} on {} failed: {}", voter_id, subject_id, e)
        }
        _ => debug!("Vote by {} on {} rejected: {}", voter_id, subject_id, e),
    }
    ApiError::from(e)
}

async fn vote_for(
    State(state): State<AppState>,
    authenticated_user: AuthenticatedUser,
    Path(subject_id): Path<String>,
) -> Result<(StatusCode, Json<Vote>), ApiError> {
    let vote = state
        .voting_service
        .cast_for(&subject_id, &authenticated_user.user_id)
        .await
        .map_err(|e| log_failure(&authenticated_user.user_id, &subject_id, e))?;
    Ok((StatusCode::CREATED, Json(vote)))
}

async fn vote_against(
    State(state): State<AppState>,
    authenticated_user: AuthenticatedUser,
    Path(subject_id): Path<String>,
) -> Result<(StatusCode, Json<Vote>), ApiError> {
    let vote = state
        .voting_service
        .cast_against(&subject_id, &authenticated_user.user_id)
        .await
        .map_err(|e| log_failure(&authenticated_user.user_id, &subject_id, e))?;
    Ok((StatusCode::CREATED, Json(vote)))
}

async fn change_vote(
    State(state): State<AppState>,
    authenticated_user: AuthenticatedUser,
    Path(subject_id): Path<String>,
    Json(request): Json<ChangeVoteRequest>,
) -> Result<Json<Vote>, ApiError> {
    state
        .voting_service
        .change_vote(
            &subject_id,
            &request.new_subject_id,
            &authenticated_user.user_id,
        )
        .await
        .map(Json)
        .map_err(|e| log_failure(&authenticated_user.user_id, &subject_id, e))
}

async fn withdraw_vote(
    State(state): State<AppState>,
    authenticated_user: AuthenticatedUser,
    Path(subject_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state
        .voting_service
        .withdraw(&subject_id, &authenticated_user.user_id)
        .await
        .map_err(|e| log_failure(&authenticated_user.user_id, &subject_id, e))?;
    Ok(StatusCode::NO_CONTENT)
}
