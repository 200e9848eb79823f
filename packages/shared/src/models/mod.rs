pub mod auth;
pub mod rating;
pub mod user;
pub mod vote;
