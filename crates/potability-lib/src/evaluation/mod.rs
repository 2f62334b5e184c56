//! Model evaluation: metrics, calibration, intervals and reporting

mod evaluator;
mod metrics;
mod report;

pub use evaluator::{
    calibration, feature_importance, overfitting_score, prediction_intervals, CalibrationReport,
    CrossValidationSummary, EvaluationReport, ModelEvaluator, PredictionIntervals, SplitMetrics,
    DEFAULT_CALIBRATION_BINS, DEFAULT_CONFIDENCE_LEVEL, OVERFITTING_WARN_THRESHOLD,
};
pub use metrics::{
    accuracy, f1, precision, recall, roc_auc, ClassMetrics, ClassificationReport, ConfusionMatrix,
};
pub use report::generate_report;
