// Core modules
pub mod api;
pub mod config;
pub mod error;
pub mod execution;
pub mod feed;
pub mod indicators;
pub mod models;
pub mod portfolio;
pub mod strategy;

// Re-export commonly used types
pub use error::{ConfigError, ExecutionError, FeedError};
pub use models::*;
pub use strategy::Strategy;

// Error handling
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;
