//! Human-readable evaluation summary

use super::evaluator::{EvaluationReport, OVERFITTING_WARN_THRESHOLD};
use std::fmt::Write;

const RULE_WIDTH: usize = 60;
const TOP_FEATURES: usize = 5;

/// Render the fixed-section text report: performance, overfitting,
/// top feature importances and cross-validation.
pub fn generate_report(report: &EvaluationReport, feature_importance: &[(String, f64)]) -> String {
    let rule = "=".repeat(RULE_WIDTH);
    let mut out = String::new();

    // writing into a String cannot fail
    let _ = writeln!(out, "{}", rule);
    let _ = writeln!(out, "MODEL EVALUATION REPORT");
    let _ = writeln!(out, "{}", rule);

    let test = &report.test;
    let _ = writeln!(out, "\nPERFORMANCE METRICS:");
    let _ = writeln!(out, "Train F1 Score: {:.4}", report.train.f1);
    let _ = writeln!(out, "Test Accuracy:  {:.4}", test.accuracy);
    let _ = writeln!(out, "Test Precision: {:.4}", test.precision);
    let _ = writeln!(out, "Test Recall:    {:.4}", test.recall);
    let _ = writeln!(out, "Test F1 Score:  {:.4}", test.f1);
    if let Some(auc) = test.auc {
        let _ = writeln!(out, "Test AUC:       {:.4}", auc);
    }
    if let Some(calibration) = &report.calibration {
        let _ = writeln!(out, "Test ECE:       {:.4}", calibration.expected_calibration_error);
    }

    let _ = writeln!(out, "\nOVERFITTING SCORE: {:.4}", report.overfitting_score);
    if report.is_overfitting(OVERFITTING_WARN_THRESHOLD) {
        let _ = writeln!(out, "WARNING: Model may be overfitting!");
    }

    if !feature_importance.is_empty() {
        let _ = writeln!(out, "\nTOP {} IMPORTANT FEATURES:", TOP_FEATURES);
        for (i, (name, importance)) in feature_importance.iter().take(TOP_FEATURES).enumerate() {
            let _ = writeln!(out, "{}. {}: {:.4}", i + 1, name, importance);
        }
    }

    if let Some(cv) = &report.cross_validation {
        let _ = writeln!(out, "\nCROSS-VALIDATION:");
        let _ = writeln!(out, "Mean F1: {:.4} (+/- {:.4})", cv.mean, cv.std * 2.0);
    }

    let _ = write!(out, "\n{}", rule);
    out
}
