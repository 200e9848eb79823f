pub mod errors;
pub mod in_memory;
pub mod user_repository;
pub mod vote_repository;
