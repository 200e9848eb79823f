pub mod auth_service;
pub mod eligibility;
pub mod errors;
pub mod password;
pub mod rating_service;
pub mod user_service;
pub mod voting_service;
