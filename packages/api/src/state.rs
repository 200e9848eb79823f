use std::sync::Arc;

use shared::services::auth_service::AuthService;
use shared::services::rating_service::RatingService;
use shared::services::user_service::UserService;
use shared::services::voting_service::VotingService;

#[derive(Clone)]
pub struct AppState {
    pub auth_service: Arc<AuthService>,
    pub user_service: Arc<UserService>,
    pub voting_service: Arc<VotingService>,
    pub rating_service: Arc<RatingService>,
}
