//! Error taxonomy for validation, artifact handling, inference and training
//!
//! Every variant here is recoverable: validation failures are surfaced to the
//! caller as structured rejections, artifact failures trigger the fallback
//! pair, and persistence failures leave the training result intact.

use thiserror::Error;

/// Data validation failures, shared by training-set and inference checks
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("schema error: {0}")]
    Schema(String),

    #[error("target error: {0}")]
    Target(String),

    #[error("range error: {0}")]
    Range(String),

    #[error("shape error: expected {expected} features, got {received}")]
    Shape { expected: usize, received: usize },

    #[error("non-finite value: {0}")]
    NonFinite(String),

    #[error("missing values: {0}")]
    MissingValue(String),

    #[error("insufficient data: {0}")]
    InsufficientData(String),
}

impl ValidationError {
    /// Short machine-readable kind, used in API error bodies and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            ValidationError::Schema(_) => "schema_error",
            ValidationError::Target(_) => "target_error",
            ValidationError::Range(_) => "range_error",
            ValidationError::Shape { .. } => "shape_error",
            ValidationError::NonFinite(_) => "non_finite_error",
            ValidationError::MissingValue(_) => "missing_value_error",
            ValidationError::InsufficientData(_) => "insufficient_data_error",
        }
    }
}

/// Failures while reading an artifact set from disk
#[derive(Debug, Error)]
pub enum ArtifactError {
    /// Scaler or classifier file absent. A normal condition, not corruption.
    #[error("model files not found in {0}")]
    NotFound(String),

    #[error("failed to read artifact {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt artifact set: {0}")]
    Corrupt(String),
}

/// Failures while writing an artifact set
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("model or scaler not trained")]
    NotTrained,

    #[error("inconsistent artifact pair: {0}")]
    Inconsistent(String),

    #[error("failed to write {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize {what}: {source}")]
    Serialize {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Failures surfaced by the prediction engine
#[derive(Debug, Error)]
pub enum PredictError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("predictor not available")]
    Unavailable,

    #[error("prediction failed")]
    Failed(String),
}

/// Failures of the offline training pipeline
#[derive(Debug, Error)]
pub enum TrainError {
    #[error("failed to read training data {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse training data: {0}")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("training failed: {0}")]
    Training(String),
}
