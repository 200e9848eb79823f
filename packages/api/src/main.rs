use lambda_http::{run, tracing, Error};
use std::env::set_var;
use std::sync::Arc;

use api::{create_app, state::AppState};
use shared::clock::SystemClock;
use shared::config::AppConfig;
use shared::repositories::user_repository::DynamoDbUserRepository;
use shared::repositories::vote_repository::DynamoDbVoteRepository;
use shared::services::auth_service::AuthService;
use shared::services::rating_service::RatingService;
use shared::services::user_service::UserService;
use shared::services::voting_service::VotingService;

#[tokio::main]
async fn main() -> Result<(), Error> {
    set_var("AWS_LAMBDA_HTTP_IGNORE_STAGE_IN_PATH", "true");

    // required to enable CloudWatch error logging by the runtime
    tracing::init_default_subscriber();

    let app_config = AppConfig::from_env()?;

    // Set up services
    let config = aws_config::load_from_env().await;
    let client = aws_sdk_dynamodb::Client::new(&config);

    let user_repository = Arc::new(DynamoDbUserRepository::new(
        client.clone(),
        app_config.users_table.clone(),
    ));
    let vote_repository = Arc::new(DynamoDbVoteRepository::new(
        client,
        app_config.votes_table.clone(),
        app_config.users_table.clone(),
    ));

    let user_service = Arc::new(UserService::new(user_repository.clone()));
    let auth_service = Arc::new(AuthService::new(
        user_service.clone(),
        app_config.jwt_secret.clone(),
        app_config.token_ttl,
    ));
    let voting_service = Arc::new(VotingService::new(
        vote_repository.clone(),
        Arc::new(SystemClock),
        app_config.vote_cooldown,
    ));
    let rating_service = Arc::new(RatingService::new(user_repository, vote_repository));

    let app_state = AppState {
        auth_service,
        user_service,
        voting_service,
        rating_service,
    };

    run(create_app(app_state)).await
}
