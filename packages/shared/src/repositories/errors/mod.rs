pub mod user_repository_errors;
pub mod vote_repository_errors;
