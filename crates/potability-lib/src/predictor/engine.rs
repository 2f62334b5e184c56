//! Prediction engine
//!
//! Owns the single active [`ArtifactPair`]. Readers take a snapshot of the
//! active model and release the lock before computing; `reload` swaps a new
//! snapshot in under a brief write lock, so a prediction never sees a scaler
//! from one artifact set paired with a classifier from another.

use super::artifact::{ArtifactPair, ArtifactStore};
use super::output::{OutputFormatter, PredictionResult};
use super::Classify;
use crate::error::{ArtifactError, PredictError, ValidationError};
use crate::observability::{ServiceMetrics, StructuredLogger};
use crate::schema::FeatureInput;
use crate::validator::{validate_inference_vector, validate_model_output};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Instant;
use tracing::{debug, warn};

/// Maximum inference latency before warning
pub const MAX_INFERENCE_MS: u128 = 5;

/// The active pair plus whether it came from disk
#[derive(Debug)]
struct ActiveModel {
    artifact: Arc<ArtifactPair>,
    is_loaded: bool,
}

impl ActiveModel {
    fn fallback() -> Self {
        Self {
            artifact: Arc::new(ArtifactPair::fallback()),
            is_loaded: false,
        }
    }
}

/// Read-only view of the engine state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDescription {
    pub model_loaded: bool,
    pub version: String,
    pub feature_names: Vec<String>,
    pub model_kind: String,
    pub scaler_kind: String,
}

/// Inference statistics
#[derive(Debug, Clone)]
pub struct InferenceStats {
    pub total_inferences: u64,
    pub slow_inferences: u64,
}

/// Serves predictions from the active artifact pair
pub struct PredictionEngine {
    store: ArtifactStore,
    active: RwLock<Arc<ActiveModel>>,
    formatter: OutputFormatter,
    metrics: ServiceMetrics,
    logger: StructuredLogger,
    inference_count: AtomicU64,
    slow_inference_count: AtomicU64,
}

impl PredictionEngine {
    /// Create an engine serving the fallback pair without touching disk
    pub fn new(model_dir: impl Into<PathBuf>) -> Self {
        Self {
            store: ArtifactStore::new(model_dir),
            active: RwLock::new(Arc::new(ActiveModel::fallback())),
            formatter: OutputFormatter::new(),
            metrics: ServiceMetrics::new(),
            logger: StructuredLogger::new("potability-engine"),
            inference_count: AtomicU64::new(0),
            slow_inference_count: AtomicU64::new(0),
        }
    }

    pub fn with_logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn with_formatter(mut self, formatter: OutputFormatter) -> Self {
        self.formatter = formatter;
        self
    }

    /// Create an engine and load the model directory, falling back to the
    /// rule-based pair if it holds no usable artifact set. Never fails.
    pub fn initialize(model_dir: impl Into<PathBuf>) -> Self {
        let engine = Self::new(model_dir);
        engine.install_from_store();
        engine
    }

    pub fn model_dir(&self) -> &Path {
        self.store.dir()
    }

    /// Load from the configured model directory
    pub fn load(&self) -> bool {
        self.try_load(&self.store).is_ok()
    }

    /// Load from another directory. On failure the active pair is kept.
    pub fn load_from(&self, dir: impl AsRef<Path>) -> bool {
        self.try_load(&ArtifactStore::new(dir.as_ref())).is_ok()
    }

    /// Load the configured directory, installing the fallback pair if it
    /// holds no usable artifact set
    pub fn load_or_fallback(&self) -> bool {
        self.install_from_store();
        self.is_loaded()
    }

    /// Re-run initialisation against the configured directory
    pub fn reload(&self) -> ModelDescription {
        let old_version = self.version();
        self.install_from_store();
        let description = self.describe();

        self.metrics.inc_model_reloads();
        self.logger
            .log_reload(&old_version, &description.version, description.model_loaded);
        description
    }

    fn install_from_store(&self) {
        if let Err(e) = self.try_load(&self.store) {
            self.logger
                .log_fallback_installed(&self.store.dir().display().to_string(), &e.to_string());
            self.swap(ActiveModel::fallback());
        }
    }

    fn try_load(&self, store: &ArtifactStore) -> Result<(), ArtifactError> {
        let pair = store.load().map_err(|e| {
            match &e {
                ArtifactError::NotFound(_) => debug!(error = %e, "No artifact set"),
                _ => warn!(dir = %store.dir().display(), error = %e, "Failed to load artifact set"),
            }
            e
        })?;

        self.logger.log_model_loaded(
            &store.dir().display().to_string(),
            pair.version(),
            pair.classifier().kind(),
            pair.feature_names().len(),
        );
        self.swap(ActiveModel {
            artifact: Arc::new(pair),
            is_loaded: true,
        });
        Ok(())
    }

    fn swap(&self, model: ActiveModel) {
        self.metrics.set_active_model(
            model.artifact.version(),
            model.artifact.classifier().kind(),
            model.is_loaded,
        );
        let mut active = self.active.write().unwrap_or_else(|e| e.into_inner());
        *active = Arc::new(model);
    }

    fn snapshot(&self) -> Arc<ActiveModel> {
        self.active.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// The currently active pair
    pub fn artifact(&self) -> Arc<ArtifactPair> {
        self.snapshot().artifact.clone()
    }

    pub fn is_loaded(&self) -> bool {
        self.snapshot().is_loaded
    }

    pub fn version(&self) -> String {
        self.snapshot().artifact.version().to_string()
    }

    pub fn describe(&self) -> ModelDescription {
        let model = self.snapshot();
        let pair = &model.artifact;
        ModelDescription {
            model_loaded: model.is_loaded,
            version: pair.version().to_string(),
            feature_names: pair.feature_names().to_vec(),
            model_kind: pair.classifier().kind().to_string(),
            scaler_kind: pair.scaler().kind().to_string(),
        }
    }

    /// Classify one sample
    pub fn predict(&self, input: impl Into<FeatureInput>) -> Result<PredictionResult, PredictError> {
        let model = self.snapshot();
        let result = Self::prepare(input.into(), &model.artifact)
            .map_err(PredictError::from)
            .and_then(|vector| self.infer(&model.artifact, &vector));

        match &result {
            Ok(r) => self.logger.log_prediction(
                r.prediction,
                r.probability,
                r.confidence,
                &r.model_version,
                self.formatter.low_confidence_reason(r).as_deref(),
            ),
            Err(e) => self.record_error(e),
        }
        result
    }

    /// Classify samples in order. Every sample is validated before any is
    /// classified; one bad sample fails the whole batch.
    pub fn predict_batch<I, T>(&self, inputs: I) -> Result<Vec<PredictionResult>, PredictError>
    where
        I: IntoIterator<Item = T>,
        T: Into<FeatureInput>,
    {
        let start = Instant::now();
        let model = self.snapshot();

        let vectors = inputs
            .into_iter()
            .enumerate()
            .map(|(i, input)| {
                Self::prepare(input.into(), &model.artifact).map_err(|e| {
                    warn!(index = i, error = %e, "Batch rejected");
                    PredictError::from(e)
                })
            })
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| {
                self.record_error(&e);
                e
            })?;

        let results = vectors
            .iter()
            .map(|v| self.infer(&model.artifact, v))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| {
                self.record_error(&e);
                e
            })?;

        let positives = results.iter().filter(|r| r.prediction == 1).count();
        self.metrics.observe_batch_size(results.len());
        self.logger.log_batch(
            results.len(),
            positives,
            model.artifact.version(),
            start.elapsed().as_millis(),
        );
        Ok(results)
    }

    /// Normalise and validate one input against the pair's feature order
    fn prepare(input: FeatureInput, pair: &ArtifactPair) -> Result<Vec<f64>, ValidationError> {
        let record = input.into_record()?;
        let vector = record.to_vector(pair.feature_names())?;
        validate_inference_vector(&vector, pair.feature_names())?;
        Ok(vector)
    }

    fn infer(&self, pair: &ArtifactPair, vector: &[f64]) -> Result<PredictionResult, PredictError> {
        let start = Instant::now();

        let scaled = pair.scaler().transform_row(vector);
        let classifier = pair.classifier();
        let label = classifier.predict_row(&scaled);
        let proba = classifier.predict_proba_row(&scaled);

        validate_model_output(&[label], &[proba]).map_err(|e| {
            warn!(error = %e, version = %pair.version(), "Classifier produced invalid output");
            PredictError::Failed(e.to_string())
        })?;

        let result = self
            .formatter
            .format(label, proba, pair.version(), pair.feature_names());

        let elapsed = start.elapsed();
        self.inference_count.fetch_add(1, Ordering::Relaxed);
        self.metrics.observe_prediction_latency(elapsed.as_secs_f64());
        self.metrics.inc_predictions(&result.label);

        if elapsed.as_millis() > MAX_INFERENCE_MS {
            self.slow_inference_count.fetch_add(1, Ordering::Relaxed);
            warn!(elapsed_ms = elapsed.as_millis() as u64, "Inference exceeded {}ms target", MAX_INFERENCE_MS);
        } else {
            debug!(elapsed_us = elapsed.as_micros() as u64, "Inference completed");
        }

        Ok(result)
    }

    fn record_error(&self, error: &PredictError) {
        let kind = match error {
            PredictError::Validation(v) => v.kind(),
            PredictError::Unavailable => "unavailable",
            PredictError::Failed(_) => "failed",
        };
        self.metrics.inc_prediction_errors(kind);
    }

    /// Get inference statistics
    pub fn stats(&self) -> InferenceStats {
        InferenceStats {
            total_inferences: self.inference_count.load(Ordering::Relaxed),
            slow_inferences: self.slow_inference_count.load(Ordering::Relaxed),
        }
    }
}
