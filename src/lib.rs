// NAYA travel journal - places, reviews, photos and the people who write them

// Configuration and failure types
pub mod config;
pub mod error;

// SQLite pool and schema
pub mod database;

// Records, views, patches and input coercion
pub mod models;

// Security, blob storage and request middleware
pub mod infrastructure;

// Aggregate managers
pub mod services;

// HTTP surface
pub mod api;
pub mod app_state;

// Re-exports for convenience
pub use error::{AppError, AppResult};
