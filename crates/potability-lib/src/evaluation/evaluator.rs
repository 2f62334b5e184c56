//! Model evaluation
//!
//! [`ModelEvaluator`] holds no model state. Every optional quantity (AUC,
//! calibration, importances, cross-validation) is an explicit `Option` or
//! empty collection in the report.

use super::metrics::{roc_auc, ClassificationReport, ConfusionMatrix};
use crate::predictor::Classify;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Overfitting scores above this are flagged
pub const OVERFITTING_WARN_THRESHOLD: f64 = 0.1;

/// Default number of calibration bins
pub const DEFAULT_CALIBRATION_BINS: usize = 10;

/// Default prediction interval confidence level
pub const DEFAULT_CONFIDENCE_LEVEL: f64 = 0.95;

/// Metrics for one data split
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub confusion_matrix: ConfusionMatrix,
    pub classification_report: ClassificationReport,
    /// Absent when the split holds a single class
    pub auc: Option<f64>,
}

impl SplitMetrics {
    pub fn compute(y_true: &[u8], y_pred: &[u8], positive_scores: &[f64]) -> Self {
        let cm = ConfusionMatrix::from_labels(y_true, y_pred);
        Self {
            accuracy: cm.accuracy(),
            precision: cm.precision(),
            recall: cm.recall(),
            f1: cm.f1(),
            confusion_matrix: cm,
            classification_report: ClassificationReport::from_labels(y_true, y_pred),
            auc: roc_auc(y_true, positive_scores),
        }
    }
}

/// Reliability curve and expected calibration error
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationReport {
    pub n_bins: usize,
    /// Empirical positive rate of each non-empty bin
    pub fraction_of_positives: Vec<f64>,
    /// Mean predicted probability of each non-empty bin
    pub mean_predicted_value: Vec<f64>,
    pub expected_calibration_error: f64,
}

/// Cross-validated F1 of the selected parameters on the training split
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossValidationSummary {
    pub scores: Vec<f64>,
    pub mean: f64,
    pub std: f64,
}

impl CrossValidationSummary {
    /// Mean and population standard deviation of fold scores
    pub fn from_scores(scores: Vec<f64>) -> Self {
        let n = scores.len().max(1) as f64;
        let mean = scores.iter().sum::<f64>() / n;
        let var = scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n;
        Self {
            scores,
            mean,
            std: var.sqrt(),
        }
    }
}

/// Lower and upper bound per row; both empty for non-ensembles
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PredictionIntervals {
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

impl PredictionIntervals {
    pub fn is_empty(&self) -> bool {
        self.lower.is_empty()
    }
}

/// Everything known about a trained model after one training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub train: SplitMetrics,
    pub test: SplitMetrics,
    pub overfitting_score: f64,
    pub calibration: Option<CalibrationReport>,
    /// Sorted by importance, descending. Empty when unsupported.
    pub feature_importance: Vec<(String, f64)>,
    pub cross_validation: Option<CrossValidationSummary>,
}

impl EvaluationReport {
    pub fn is_overfitting(&self, threshold: f64) -> bool {
        self.overfitting_score > threshold
    }
}

/// Relative F1 degradation from train to test, floored at 0
pub fn overfitting_score(train_f1: f64, test_f1: f64) -> f64 {
    if train_f1 == 0.0 {
        return 0.0;
    }
    ((train_f1 - test_f1) / train_f1).max(0.0)
}

/// Evaluates a fitted classifier on train and test splits
#[derive(Debug, Clone)]
pub struct ModelEvaluator {
    feature_names: Vec<String>,
    calibration_bins: usize,
}

impl ModelEvaluator {
    pub fn new(feature_names: Vec<String>) -> Self {
        Self {
            feature_names,
            calibration_bins: DEFAULT_CALIBRATION_BINS,
        }
    }

    pub fn with_calibration_bins(mut self, n_bins: usize) -> Self {
        self.calibration_bins = n_bins;
        self
    }

    /// Score both splits. Calibration is measured on the test split.
    pub fn evaluate<C: Classify + ?Sized>(
        &self,
        classifier: &C,
        x_train: &Array2<f64>,
        x_test: &Array2<f64>,
        y_train: &[u8],
        y_test: &[u8],
    ) -> EvaluationReport {
        let train_scores: Vec<f64> = classifier.predict_proba(x_train).iter().map(|p| p[1]).collect();
        let test_scores: Vec<f64> = classifier.predict_proba(x_test).iter().map(|p| p[1]).collect();

        let train = SplitMetrics::compute(y_train, &classifier.predict(x_train), &train_scores);
        let test = SplitMetrics::compute(y_test, &classifier.predict(x_test), &test_scores);

        if train.auc.is_none() || test.auc.is_none() {
            warn!("AUC undefined for a single-class split, omitted from report");
        }

        let overfitting_score = overfitting_score(train.f1, test.f1);
        let calibration = calibration(y_test, &test_scores, self.calibration_bins);
        let feature_importance = feature_importance(classifier, &self.feature_names);

        info!(
            test_f1 = test.f1,
            test_accuracy = test.accuracy,
            overfitting_score = overfitting_score,
            "Model evaluation completed"
        );

        EvaluationReport {
            train,
            test,
            overfitting_score,
            calibration,
            feature_importance,
            cross_validation: None,
        }
    }
}

/// Importances paired with names, sorted descending. Empty when the
/// classifier exposes none.
pub fn feature_importance<C: Classify + ?Sized>(
    classifier: &C,
    feature_names: &[String],
) -> Vec<(String, f64)> {
    let Some(importances) = classifier.feature_importances() else {
        return Vec::new();
    };
    let mut pairs: Vec<(String, f64)> = feature_names.iter().cloned().zip(importances).collect();
    pairs.sort_by(|a, b| b.1.total_cmp(&a.1));
    pairs
}

/// Equal-width reliability curve over [0, 1] and the expected calibration
/// error. Curve bins put a probability `p` in the bin whose upper edge is
/// the first edge `>= p`; ECE buckets are `(lo, hi]`, so `p == 0` falls in
/// none. None when there is nothing to bin.
pub fn calibration(y_true: &[u8], proba: &[f64], n_bins: usize) -> Option<CalibrationReport> {
    let n = y_true.len().min(proba.len());
    if n == 0 || n_bins == 0 {
        return None;
    }
    let edges: Vec<f64> = (0..=n_bins).map(|i| i as f64 / n_bins as f64).collect();

    let mut sums = vec![0.0; n_bins];
    let mut positives = vec![0.0; n_bins];
    let mut counts = vec![0usize; n_bins];
    for (&t, &p) in y_true.iter().zip(proba).take(n) {
        let bin = edges[1..n_bins].partition_point(|&e| e < p);
        sums[bin] += p;
        positives[bin] += f64::from(t);
        counts[bin] += 1;
    }
    let (fraction_of_positives, mean_predicted_value) = (0..n_bins)
        .filter(|&b| counts[b] > 0)
        .map(|b| (positives[b] / counts[b] as f64, sums[b] / counts[b] as f64))
        .unzip();

    let mut ece = 0.0;
    for w in edges.windows(2) {
        let (lo, hi) = (w[0], w[1]);
        let members: Vec<(u8, f64)> = y_true
            .iter()
            .zip(proba)
            .take(n)
            .filter(|(_, &p)| p > lo && p <= hi)
            .map(|(&t, &p)| (t, p))
            .collect();
        if members.is_empty() {
            continue;
        }
        let m = members.len() as f64;
        let rate = members.iter().map(|(t, _)| f64::from(*t)).sum::<f64>() / m;
        let confidence = members.iter().map(|(_, p)| p).sum::<f64>() / m;
        ece += (confidence - rate).abs() * (m / n as f64);
    }

    Some(CalibrationReport {
        n_bins,
        fraction_of_positives,
        mean_predicted_value,
        expected_calibration_error: ece,
    })
}

/// Per-row spread of estimator predictions at `confidence_level`
pub fn prediction_intervals<C: Classify + ?Sized>(
    classifier: &C,
    x: &Array2<f64>,
    confidence_level: f64,
) -> PredictionIntervals {
    let Some(per_estimator) = classifier.estimator_predictions(x) else {
        warn!("Classifier does not support prediction intervals");
        return PredictionIntervals::default();
    };
    if per_estimator.is_empty() {
        return PredictionIntervals::default();
    }

    let alpha = 1.0 - confidence_level;
    let (lo_q, hi_q) = (alpha / 2.0, 1.0 - alpha / 2.0);

    let mut lower = Vec::with_capacity(x.nrows());
    let mut upper = Vec::with_capacity(x.nrows());
    for row in 0..x.nrows() {
        let mut column: Vec<f64> = per_estimator.iter().map(|e| e[row]).collect();
        column.sort_by(f64::total_cmp);
        lower.push(percentile(&column, lo_q));
        upper.push(percentile(&column, hi_q));
    }
    PredictionIntervals { lower, upper }
}

/// Linear-interpolated quantile of sorted values, `q` in [0, 1]
fn percentile(sorted: &[f64], q: f64) -> f64 {
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predictor::{ForestParams, RandomForest, RuleBasedClassifier};

    fn forest_fixture() -> (RandomForest, Array2<f64>, Vec<u8>) {
        let x = Array2::from_shape_fn((120, 3), |(i, j)| match j {
            0 => (i % 60) as f64,
            1 => ((i * 13) % 7) as f64,
            _ => ((i * 5) % 11) as f64,
        });
        let y: Vec<u8> = (0..120).map(|i| u8::from(i % 60 >= 30)).collect();
        let params = ForestParams {
            n_estimators: 12,
            max_depth: Some(5),
            ..Default::default()
        };
        (RandomForest::fit(&x, &y, params), x, y)
    }

    #[test]
    fn test_overfitting_score() {
        assert_eq!(overfitting_score(0.8, 0.8), 0.0);
        assert_eq!(overfitting_score(0.8, 0.9), 0.0);
        assert_eq!(overfitting_score(0.0, 0.5), 0.0);
        assert!((overfitting_score(0.8, 0.4) - 0.5).abs() < 1e-12);
        assert!((overfitting_score(0.8, 0.0) - 1.0).abs() < 1e-12);
        assert!(overfitting_score(0.8, 0.1) > overfitting_score(0.8, 0.3));
    }

    #[test]
    fn test_evaluate_forest() {
        let (forest, x, y) = forest_fixture();
        let names = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let report = ModelEvaluator::new(names).evaluate(&forest, &x, &x, &y, &y);

        assert!(report.train.accuracy > 0.85);
        assert_eq!(report.train, report.test);
        assert_eq!(report.overfitting_score, 0.0);
        assert!(report.test.auc.is_some());
        assert!(report.calibration.is_some());
        assert_eq!(report.feature_importance.len(), 3);
        assert_eq!(report.feature_importance[0].0, "a");
        assert!(report.cross_validation.is_none());
    }

    #[test]
    fn test_single_class_split_omits_auc() {
        let (forest, x, y) = forest_fixture();
        let names = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let idx: Vec<usize> = (0..120).filter(|i| y[*i] == 1).collect();
        let x_pos = x.select(ndarray::Axis(0), &idx);
        let y_pos = vec![1u8; idx.len()];

        let report = ModelEvaluator::new(names).evaluate(&forest, &x, &x_pos, &y, &y_pos);
        assert!(report.train.auc.is_some());
        assert!(report.test.auc.is_none());
    }

    #[test]
    fn test_fallback_has_no_importances_or_intervals() {
        let x = Array2::from_elem((3, 9), 1.0);
        assert!(feature_importance(&RuleBasedClassifier, &["pH".to_string()]).is_empty());
        assert!(prediction_intervals(&RuleBasedClassifier, &x, 0.95).is_empty());
    }

    #[test]
    fn test_forest_intervals_bracket() {
        let (forest, x, _) = forest_fixture();
        let intervals = prediction_intervals(&forest, &x, DEFAULT_CONFIDENCE_LEVEL);
        assert_eq!(intervals.lower.len(), 120);
        assert_eq!(intervals.upper.len(), 120);
        assert!(intervals
            .lower
            .iter()
            .zip(&intervals.upper)
            .all(|(lo, hi)| lo <= hi));
    }

    #[test]
    fn test_percentile_interpolates() {
        let v = [0.0, 1.0, 2.0, 3.0, 4.0];
        assert_eq!(percentile(&v, 0.5), 2.0);
        assert_eq!(percentile(&v, 0.0), 0.0);
        assert_eq!(percentile(&v, 1.0), 4.0);
        assert!((percentile(&v, 0.125) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_perfect_calibration_has_zero_ece() {
        let y = [0, 0, 0, 1, 1, 1, 1, 0];
        let p = [0.25, 0.25, 0.25, 0.25, 0.75, 0.75, 0.75, 0.75];
        let report = calibration(&y, &p, 10).unwrap();
        assert_eq!(report.expected_calibration_error, 0.0);
        assert_eq!(report.fraction_of_positives, vec![0.25, 0.75]);
        assert_eq!(report.mean_predicted_value, vec![0.25, 0.75]);
    }

    #[test]
    fn test_overconfident_calibration() {
        let y = [0, 0];
        let p = [0.9, 0.9];
        let report = calibration(&y, &p, 5).unwrap();
        assert!((report.expected_calibration_error - 0.9).abs() < 1e-12);
    }

    #[test]
    fn test_calibration_empty_input() {
        assert!(calibration(&[], &[], 10).is_none());
    }

    #[test]
    fn test_cross_validation_summary() {
        let cv = CrossValidationSummary::from_scores(vec![0.6, 0.8]);
        assert!((cv.mean - 0.7).abs() < 1e-12);
        assert!((cv.std - 0.1).abs() < 1e-12);
    }
}
