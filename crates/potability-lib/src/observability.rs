//! Observability infrastructure for the prediction service
//!
//! Provides:
//! - Prometheus metrics (prediction latency, outcomes, batch sizes, active model)
//! - Structured JSON logging of domain events with tracing

use prometheus::{
    register_gauge_vec, register_histogram, register_int_counter, register_int_counter_vec,
    register_int_gauge, Encoder, GaugeVec, Histogram, IntCounter, IntCounterVec, IntGauge,
    TextEncoder,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for inference latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.00005, 0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25,
];

/// Histogram buckets for batch request sizes
const BATCH_SIZE_BUCKETS: &[f64] = &[1.0, 2.0, 5.0, 10.0, 25.0, 50.0, 100.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<ServiceMetricsInner> = OnceLock::new();

struct ServiceMetricsInner {
    prediction_latency_seconds: Histogram,
    predictions_total: IntCounterVec,
    prediction_errors_total: IntCounterVec,
    batch_size: Histogram,
    model_reloads_total: IntCounter,
    model_info: GaugeVec,
    model_loaded: IntGauge,
}

impl ServiceMetricsInner {
    fn new() -> Self {
        Self {
            prediction_latency_seconds: register_histogram!(
                "potability_prediction_latency_seconds",
                "Time spent scaling and classifying one record",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register prediction_latency_seconds"),

            predictions_total: register_int_counter_vec!(
                "potability_predictions_total",
                "Predictions served, by predicted label",
                &["label"]
            )
            .expect("Failed to register predictions_total"),

            prediction_errors_total: register_int_counter_vec!(
                "potability_prediction_errors_total",
                "Rejected or failed predictions, by error kind",
                &["kind"]
            )
            .expect("Failed to register prediction_errors_total"),

            batch_size: register_histogram!(
                "potability_batch_size",
                "Number of records per batch prediction request",
                BATCH_SIZE_BUCKETS.to_vec()
            )
            .expect("Failed to register batch_size"),

            model_reloads_total: register_int_counter!(
                "potability_model_reloads_total",
                "Number of model reloads"
            )
            .expect("Failed to register model_reloads_total"),

            model_info: register_gauge_vec!(
                "potability_model_info",
                "Information about the active artifact pair",
                &["version", "kind"]
            )
            .expect("Failed to register model_info"),

            model_loaded: register_int_gauge!(
                "potability_model_loaded",
                "1 when a trained artifact serves, 0 while the fallback serves"
            )
            .expect("Failed to register model_loaded"),
        }
    }
}

/// Service metrics for Prometheus exposition
///
/// A lightweight handle to the global metrics instance; clones share the
/// same underlying metrics.
#[derive(Clone)]
pub struct ServiceMetrics {
    _private: (),
}

impl Default for ServiceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(ServiceMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &ServiceMetricsInner {
        GLOBAL_METRICS.get_or_init(ServiceMetricsInner::new)
    }

    pub fn observe_prediction_latency(&self, duration_secs: f64) {
        self.inner().prediction_latency_seconds.observe(duration_secs);
    }

    pub fn inc_predictions(&self, label: &str) {
        self.inner().predictions_total.with_label_values(&[label]).inc();
    }

    pub fn inc_prediction_errors(&self, kind: &str) {
        self.inner().prediction_errors_total.with_label_values(&[kind]).inc();
    }

    pub fn observe_batch_size(&self, size: usize) {
        self.inner().batch_size.observe(size as f64);
    }

    pub fn inc_model_reloads(&self) {
        self.inner().model_reloads_total.inc();
    }

    /// Replace the active model info series
    pub fn set_active_model(&self, version: &str, kind: &str, loaded: bool) {
        let inner = self.inner();
        inner.model_info.reset();
        inner.model_info.with_label_values(&[version, kind]).set(1.0);
        inner.model_loaded.set(i64::from(loaded));
    }

    /// Default registry in text exposition format
    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let families = prometheus::gather();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&families, &mut buffer) {
            warn!(error = %e, "Failed to encode metrics");
            return String::new();
        }
        String::from_utf8_lossy(&buffer).into_owned()
    }
}

/// Structured logger for domain events
///
/// Every event carries an `event` field and the instance name so log
/// pipelines can filter without parsing messages.
#[derive(Clone)]
pub struct StructuredLogger {
    instance: String,
}

impl StructuredLogger {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }

    pub fn instance(&self) -> &str {
        &self.instance
    }

    pub fn log_prediction(
        &self,
        prediction: u8,
        probability: f64,
        confidence: f64,
        model_version: &str,
        low_confidence_reason: Option<&str>,
    ) {
        info!(
            event = "prediction_made",
            instance = %self.instance,
            prediction = prediction,
            probability = probability,
            confidence = confidence,
            low_confidence = low_confidence_reason.is_some(),
            low_confidence_reason = ?low_confidence_reason,
            model_version = %model_version,
            "Prediction made"
        );
    }

    pub fn log_batch(&self, size: usize, positives: usize, model_version: &str, elapsed_ms: u128) {
        info!(
            event = "batch_prediction_completed",
            instance = %self.instance,
            batch_size = size,
            positives = positives,
            model_version = %model_version,
            elapsed_ms = elapsed_ms as u64,
            "Batch prediction completed"
        );
    }

    pub fn log_model_loaded(&self, dir: &str, version: &str, model_kind: &str, n_features: usize) {
        info!(
            event = "model_loaded",
            instance = %self.instance,
            dir = %dir,
            version = %version,
            model_kind = %model_kind,
            n_features = n_features,
            "Model loaded"
        );
    }

    pub fn log_fallback_installed(&self, dir: &str, reason: &str) {
        warn!(
            event = "fallback_installed",
            instance = %self.instance,
            dir = %dir,
            reason = %reason,
            "No usable trained model, serving rule-based fallback"
        );
    }

    pub fn log_reload(&self, old_version: &str, new_version: &str, model_loaded: bool) {
        if model_loaded {
            info!(
                event = "model_reloaded",
                instance = %self.instance,
                old_version = %old_version,
                new_version = %new_version,
                "Model reloaded"
            );
        } else {
            warn!(
                event = "model_reloaded",
                instance = %self.instance,
                old_version = %old_version,
                new_version = %new_version,
                "Model reloaded onto fallback"
            );
        }
    }

    pub fn log_training_completed(
        &self,
        version: &str,
        test_f1: f64,
        overfitting_score: f64,
        model_saved: bool,
    ) {
        info!(
            event = "training_completed",
            instance = %self.instance,
            version = %version,
            test_f1 = test_f1,
            overfitting_score = overfitting_score,
            model_saved = model_saved,
            "Training completed"
        );
    }

    pub fn log_startup(&self, service_version: &str, model_version: &str, port: u16) {
        info!(
            event = "service_started",
            instance = %self.instance,
            service_version = %service_version,
            model_version = %model_version,
            port = port,
            "Potability service started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "service_shutdown",
            instance = %self.instance,
            reason = %reason,
            "Potability service shutting down"
        );
    }
}
