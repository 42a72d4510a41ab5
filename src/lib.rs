pub mod config;
pub mod error;
pub mod models;
pub mod openapi;
pub mod page;
pub mod repo;
pub mod routes;
pub mod search;
pub mod service;

// Re-export commonly used items for tests / external users
pub use config::AppConfig;
pub use routes::{config as configure, AppState};
