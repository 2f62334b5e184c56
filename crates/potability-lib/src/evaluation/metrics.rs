//! Binary classification metrics
//!
//! The positive class is 1. Undefined ratios (no predicted or no actual
//! positives) evaluate to 0 instead of failing.

use serde::{Deserialize, Serialize};

fn ratio(num: u64, den: u64) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

fn harmonic(precision: f64, recall: f64) -> f64 {
    if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    }
}

/// 2x2 confusion matrix, rows are the true class
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub true_negatives: u64,
    pub false_positives: u64,
    pub false_negatives: u64,
    pub true_positives: u64,
}

impl ConfusionMatrix {
    pub fn from_labels(y_true: &[u8], y_pred: &[u8]) -> Self {
        let mut cm = Self::default();
        for (&t, &p) in y_true.iter().zip(y_pred) {
            match (t, p) {
                (1, 1) => cm.true_positives += 1,
                (1, _) => cm.false_negatives += 1,
                (_, 1) => cm.false_positives += 1,
                _ => cm.true_negatives += 1,
            }
        }
        cm
    }

    /// `[[tn, fp], [fn, tp]]`
    pub fn as_rows(&self) -> [[u64; 2]; 2] {
        [
            [self.true_negatives, self.false_positives],
            [self.false_negatives, self.true_positives],
        ]
    }

    pub fn total(&self) -> u64 {
        self.true_negatives + self.false_positives + self.false_negatives + self.true_positives
    }

    pub fn accuracy(&self) -> f64 {
        ratio(self.true_positives + self.true_negatives, self.total())
    }

    pub fn precision(&self) -> f64 {
        ratio(self.true_positives, self.true_positives + self.false_positives)
    }

    pub fn recall(&self) -> f64 {
        ratio(self.true_positives, self.true_positives + self.false_negatives)
    }

    pub fn f1(&self) -> f64 {
        harmonic(self.precision(), self.recall())
    }
}

pub fn accuracy(y_true: &[u8], y_pred: &[u8]) -> f64 {
    ConfusionMatrix::from_labels(y_true, y_pred).accuracy()
}

pub fn precision(y_true: &[u8], y_pred: &[u8]) -> f64 {
    ConfusionMatrix::from_labels(y_true, y_pred).precision()
}

pub fn recall(y_true: &[u8], y_pred: &[u8]) -> f64 {
    ConfusionMatrix::from_labels(y_true, y_pred).recall()
}

pub fn f1(y_true: &[u8], y_pred: &[u8]) -> f64 {
    ConfusionMatrix::from_labels(y_true, y_pred).f1()
}

/// Precision, recall, F1 and support for one class
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: u64,
}

/// Per-class breakdown with macro and weighted averages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    pub negative: ClassMetrics,
    pub positive: ClassMetrics,
    pub accuracy: f64,
    pub macro_avg: ClassMetrics,
    pub weighted_avg: ClassMetrics,
}

impl ClassificationReport {
    pub fn from_labels(y_true: &[u8], y_pred: &[u8]) -> Self {
        let cm = ConfusionMatrix::from_labels(y_true, y_pred);

        let positive = ClassMetrics {
            precision: cm.precision(),
            recall: cm.recall(),
            f1: cm.f1(),
            support: cm.true_positives + cm.false_negatives,
        };
        let neg_precision = ratio(cm.true_negatives, cm.true_negatives + cm.false_negatives);
        let neg_recall = ratio(cm.true_negatives, cm.true_negatives + cm.false_positives);
        let negative = ClassMetrics {
            precision: neg_precision,
            recall: neg_recall,
            f1: harmonic(neg_precision, neg_recall),
            support: cm.true_negatives + cm.false_positives,
        };

        let total = cm.total();
        let macro_avg = ClassMetrics {
            precision: (negative.precision + positive.precision) / 2.0,
            recall: (negative.recall + positive.recall) / 2.0,
            f1: (negative.f1 + positive.f1) / 2.0,
            support: total,
        };
        let weight = |neg: f64, pos: f64| {
            if total == 0 {
                0.0
            } else {
                (neg * negative.support as f64 + pos * positive.support as f64) / total as f64
            }
        };
        let weighted_avg = ClassMetrics {
            precision: weight(negative.precision, positive.precision),
            recall: weight(negative.recall, positive.recall),
            f1: weight(negative.f1, positive.f1),
            support: total,
        };

        Self {
            negative,
            positive,
            accuracy: cm.accuracy(),
            macro_avg,
            weighted_avg,
        }
    }
}

/// Area under the ROC curve via the rank-sum statistic, with tied scores
/// given their average rank. None when only one class is present.
pub fn roc_auc(y_true: &[u8], scores: &[f64]) -> Option<f64> {
    let n = y_true.len().min(scores.len());
    let n_pos = y_true[..n].iter().filter(|&&t| t == 1).count();
    let n_neg = n - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut ranks = vec![0.0; n];
    let mut i = 0;
    while i < n {
        let mut j = i;
        while j + 1 < n && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        // ranks are 1-based
        let avg = (i + j) as f64 / 2.0 + 1.0;
        for k in i..=j {
            ranks[order[k]] = avg;
        }
        i = j + 1;
    }

    let pos_rank_sum: f64 = (0..n).filter(|&k| y_true[k] == 1).map(|k| ranks[k]).sum();
    let n_pos = n_pos as f64;
    let u = pos_rank_sum - n_pos * (n_pos + 1.0) / 2.0;
    Some(u / (n_pos * n_neg as f64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_metrics() {
        let y_true = [1, 1, 1, 0, 0, 0, 1, 0];
        let y_pred = [1, 1, 0, 0, 1, 0, 1, 0];
        let cm = ConfusionMatrix::from_labels(&y_true, &y_pred);
        assert_eq!(cm.as_rows(), [[3, 1], [1, 3]]);
        assert_eq!(accuracy(&y_true, &y_pred), 0.75);
        assert_eq!(precision(&y_true, &y_pred), 0.75);
        assert_eq!(recall(&y_true, &y_pred), 0.75);
        assert!((f1(&y_true, &y_pred) - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_zero_division_defaults_to_zero() {
        let y_true = [0, 0, 0];
        let y_pred = [0, 0, 0];
        assert_eq!(precision(&y_true, &y_pred), 0.0);
        assert_eq!(recall(&y_true, &y_pred), 0.0);
        assert_eq!(f1(&y_true, &y_pred), 0.0);
        assert_eq!(accuracy(&y_true, &y_pred), 1.0);
        assert_eq!(accuracy(&[], &[]), 0.0);
    }

    #[test]
    fn test_classification_report_supports() {
        let y_true = [1, 1, 0, 0, 0];
        let y_pred = [1, 0, 0, 0, 1];
        let report = ClassificationReport::from_labels(&y_true, &y_pred);
        assert_eq!(report.positive.support, 2);
        assert_eq!(report.negative.support, 3);
        assert_eq!(report.macro_avg.support, 5);
        assert!((report.negative.recall - 2.0 / 3.0).abs() < 1e-12);
        assert!((report.accuracy - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_auc_perfect_and_reversed() {
        let y = [0, 0, 1, 1];
        assert_eq!(roc_auc(&y, &[0.1, 0.2, 0.8, 0.9]), Some(1.0));
        assert_eq!(roc_auc(&y, &[0.9, 0.8, 0.2, 0.1]), Some(0.0));
    }

    #[test]
    fn test_auc_ties_count_half() {
        let y = [0, 1];
        assert_eq!(roc_auc(&y, &[0.5, 0.5]), Some(0.5));
    }

    #[test]
    fn test_auc_single_class_is_none() {
        assert_eq!(roc_auc(&[1, 1, 1], &[0.2, 0.4, 0.9]), None);
    }
}
