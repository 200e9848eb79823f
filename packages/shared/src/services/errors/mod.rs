pub mod auth_service_errors;
pub mod rating_service_errors;
pub mod user_service_errors;
pub mod voting_service_errors;
