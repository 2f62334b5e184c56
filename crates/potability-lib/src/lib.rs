//! Water potability prediction library
//!
//! This crate provides the core functionality for:
//! - The nine-feature water sample schema and its validation
//! - Random forest training with grid search and evaluation
//! - A hot-swappable prediction engine with a rule-based fallback
//! - Health checks and observability

pub mod dataset;
pub mod error;
pub mod evaluation;
pub mod health;
pub mod observability;
pub mod predictor;
pub mod schema;
pub mod synthetic;
pub mod training;
pub mod validator;

pub use error::{ArtifactError, PersistenceError, PredictError, TrainError, ValidationError};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use observability::{ServiceMetrics, StructuredLogger};
pub use predictor::{ModelDescription, PredictionEngine, PredictionResult};
pub use schema::{FeatureInput, FeatureRecord, FEATURE_NAMES, NUM_FEATURES};
