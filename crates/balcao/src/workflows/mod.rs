pub mod application;
pub mod auth;
