// TAP Console - terminal client for the TAP Toolbox backend

pub mod api;
pub mod config;
pub mod controllers;
pub mod tui;
pub mod types;

// Re-exports for convenience
pub use api::ApiGateway;
pub use config::Config;
// Note: Import specific items from types instead of glob to avoid name conflicts
// e.g., use tap_console::types::{AppError, AppResult, ExperimentResult};
