pub mod access;
pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod openapi;
pub mod query;
pub mod repo;
pub mod routes;
pub mod service;

// Re-export commonly used items for tests / external users
pub use routes::{config, AppState};
pub use service::ForumService;
