//! HTTP serving layer around the potability prediction engine

pub mod api;
pub mod config;

pub use api::{create_router, serve, ApiError, AppState};
pub use config::ServiceConfig;
