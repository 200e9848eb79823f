pub mod auth;
pub mod health;
pub mod rating;
pub mod user;
pub mod vote;
