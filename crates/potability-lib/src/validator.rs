//! Validation of training sets, inference vectors and model outputs
//!
//! Training-time domains are hard failures. At inference time only the lower
//! bounds are enforced; values above a feature's typical maximum are logged
//! and let through.

use crate::dataset::{Column, TrainingFrame};
use crate::error::ValidationError;
use crate::schema::{domain_at, domain_of, TARGET_COLUMN};
use ndarray::Array2;
use tracing::{debug, info, warn};

/// Minimum number of rows in a training set
pub const MIN_TRAINING_ROWS: usize = 100;

/// Minimum number of rows per class in a training set
pub const MIN_ROWS_PER_CLASS: usize = 10;

/// Maximum tolerated fraction of nulls in a feature column
pub const MAX_NULL_RATIO: f64 = 0.5;

/// Tolerance for two-class probability rows summing to one
pub const PROBABILITY_SUM_TOLERANCE: f64 = 1e-5;

/// Validate a raw training table against the expected feature columns
pub fn validate_training_record_set(
    data: &TrainingFrame,
    expected_features: &[&str],
) -> Result<(), ValidationError> {
    if data.is_empty() {
        return Err(ValidationError::Schema("training data is empty".to_string()));
    }

    let missing: Vec<&str> = expected_features
        .iter()
        .copied()
        .chain(std::iter::once(TARGET_COLUMN))
        .filter(|name| data.column(name).is_none())
        .collect();
    if !missing.is_empty() {
        return Err(ValidationError::Schema(format!(
            "missing required columns: {:?}",
            missing
        )));
    }

    let (negatives, positives) = target_counts(data.column(TARGET_COLUMN))?;

    if data.len() < MIN_TRAINING_ROWS {
        return Err(ValidationError::InsufficientData(format!(
            "training data must have at least {} samples, got {}",
            MIN_TRAINING_ROWS,
            data.len()
        )));
    }

    if negatives.min(positives) < MIN_ROWS_PER_CLASS {
        return Err(ValidationError::InsufficientData(format!(
            "each class must have at least {} samples (class 0: {}, class 1: {})",
            MIN_ROWS_PER_CLASS, negatives, positives
        )));
    }

    for name in expected_features {
        if !data.column(name).map_or(false, Column::is_numeric) {
            return Err(ValidationError::Schema(format!(
                "feature '{}' must be numeric",
                name
            )));
        }
    }

    for name in expected_features {
        if let Some(column) = data.column(name) {
            let ratio = column.null_count() as f64 / data.len() as f64;
            if ratio > MAX_NULL_RATIO {
                return Err(ValidationError::MissingValue(format!(
                    "feature '{}' has too many missing values ({:.2}%)",
                    name,
                    ratio * 100.0
                )));
            }
        }
    }

    for name in expected_features {
        let values = data
            .column(name)
            .and_then(Column::as_numeric)
            .unwrap_or_default();
        if let Some(value) = values.iter().flatten().find(|v| !v.is_finite()) {
            return Err(ValidationError::NonFinite(format!(
                "feature '{}' contains {}",
                name, value
            )));
        }

        let Some(domain) = domain_of(name) else {
            continue;
        };
        for value in values.iter().flatten() {
            if *value < domain.min {
                return Err(ValidationError::Range(format!(
                    "feature '{}' has values below minimum ({})",
                    name, domain.min
                )));
            }
            if let Some(max) = domain.max {
                if *value > max {
                    return Err(ValidationError::Range(format!(
                        "feature '{}' has values above maximum ({})",
                        name, max
                    )));
                }
            }
        }
    }

    info!(rows = data.len(), negatives, positives, "Training data validation passed");
    Ok(())
}

fn target_counts(column: Option<&Column>) -> Result<(usize, usize), ValidationError> {
    let invalid = || {
        ValidationError::Target(format!(
            "target column '{}' must contain only 0 and 1 values",
            TARGET_COLUMN
        ))
    };

    let values = column.and_then(Column::as_numeric).ok_or_else(invalid)?;
    let mut counts = (0, 0);
    for value in values {
        match value {
            Some(v) if *v == 0.0 => counts.0 += 1,
            Some(v) if *v == 1.0 => counts.1 += 1,
            _ => return Err(invalid()),
        }
    }
    Ok(counts)
}

/// Validate a single inference vector ordered by `feature_names`
pub fn validate_inference_vector(
    vector: &[f64],
    feature_names: &[String],
) -> Result<(), ValidationError> {
    if vector.len() != feature_names.len() {
        return Err(ValidationError::Shape {
            expected: feature_names.len(),
            received: vector.len(),
        });
    }

    if let Some((i, v)) = vector.iter().enumerate().find(|(_, v)| v.is_nan()) {
        return Err(ValidationError::NonFinite(format!(
            "feature '{}' is {}",
            feature_names[i], v
        )));
    }
    if let Some((i, v)) = vector.iter().enumerate().find(|(_, v)| v.is_infinite()) {
        return Err(ValidationError::NonFinite(format!(
            "feature '{}' is {}",
            feature_names[i], v
        )));
    }

    for (i, (value, name)) in vector.iter().zip(feature_names).enumerate() {
        let Some(domain) = domain_of(name).or_else(|| domain_at(i)) else {
            continue;
        };
        if *value < domain.min {
            return Err(ValidationError::Range(format!(
                "feature '{}' has values below minimum ({})",
                name, domain.min
            )));
        }
        if *value > domain.typical_max {
            warn!(
                feature = %name,
                value = *value,
                typical_max = domain.typical_max,
                "Feature value above typical maximum"
            );
        }
    }

    debug!("Inference data validation passed");
    Ok(())
}

/// Validate classifier output: binary labels and normalised two-class rows
pub fn validate_model_output(labels: &[u8], probabilities: &[[f64; 2]]) -> Result<(), ValidationError> {
    if labels.len() != probabilities.len() {
        return Err(ValidationError::Shape {
            expected: labels.len(),
            received: probabilities.len(),
        });
    }
    if let Some(label) = labels.iter().find(|&&l| l > 1) {
        return Err(ValidationError::Target(format!("prediction {} is not 0 or 1", label)));
    }
    for row in probabilities {
        if row.iter().any(|p| !p.is_finite()) {
            return Err(ValidationError::NonFinite(format!("probabilities {:?}", row)));
        }
        if row.iter().any(|p| !(0.0..=1.0).contains(p)) {
            return Err(ValidationError::Range(format!(
                "probabilities {:?} must be between 0 and 1",
                row
            )));
        }
        if (row[0] + row[1] - 1.0).abs() > PROBABILITY_SUM_TOLERANCE {
            return Err(ValidationError::Range(format!(
                "probabilities {:?} must sum to 1",
                row
            )));
        }
    }
    Ok(())
}

/// Per-feature outcome of a drift check
#[derive(Debug, Clone, PartialEq)]
pub struct DriftReport {
    /// Two-sample Kolmogorov-Smirnov statistic per column
    pub statistics: Vec<f64>,
    /// Asymptotic p-value per column
    pub p_values: Vec<f64>,
    /// Columns whose p-value fell below the threshold
    pub drifted_features: Vec<usize>,
}

impl DriftReport {
    pub fn drift_detected(&self) -> bool {
        !self.drifted_features.is_empty()
    }
}

/// Compare each column of `current` against `reference` with a two-sample
/// Kolmogorov-Smirnov test
pub fn check_data_drift(reference: &Array2<f64>, current: &Array2<f64>, threshold: f64) -> DriftReport {
    let columns = reference.ncols().min(current.ncols());
    let mut report = DriftReport {
        statistics: Vec::with_capacity(columns),
        p_values: Vec::with_capacity(columns),
        drifted_features: Vec::new(),
    };

    for j in 0..columns {
        let a: Vec<f64> = reference.column(j).iter().copied().filter(|v| v.is_finite()).collect();
        let b: Vec<f64> = current.column(j).iter().copied().filter(|v| v.is_finite()).collect();
        let (statistic, p_value) = ks_two_sample(&a, &b);

        if p_value < threshold {
            warn!(feature = j, p_value, statistic, "Data drift detected");
            report.drifted_features.push(j);
        }
        report.statistics.push(statistic);
        report.p_values.push(p_value);
    }

    report
}

/// Two-sample KS statistic and its asymptotic p-value
pub fn ks_two_sample(a: &[f64], b: &[f64]) -> (f64, f64) {
    if a.is_empty() || b.is_empty() {
        return (0.0, 1.0);
    }

    let mut a = a.to_vec();
    let mut b = b.to_vec();
    a.sort_by(|x, y| x.total_cmp(y));
    b.sort_by(|x, y| x.total_cmp(y));

    let (n, m) = (a.len(), b.len());
    let (mut i, mut j) = (0, 0);
    let mut d: f64 = 0.0;
    while i < n && j < m {
        let x = a[i].min(b[j]);
        while i < n && a[i] <= x {
            i += 1;
        }
        while j < m && b[j] <= x {
            j += 1;
        }
        d = d.max((i as f64 / n as f64 - j as f64 / m as f64).abs());
    }

    let en = ((n * m) as f64 / (n + m) as f64).sqrt();
    let lambda = (en + 0.12 + 0.11 / en) * d;
    (d, kolmogorov_survival(lambda))
}

fn kolmogorov_survival(lambda: f64) -> f64 {
    if lambda < 1e-3 {
        return 1.0;
    }
    let mut sum = 0.0;
    let mut sign = 1.0;
    for k in 1..=100 {
        let k = k as f64;
        let term = sign * (-2.0 * k * k * lambda * lambda).exp();
        sum += term;
        if term.abs() < 1e-10 {
            break;
        }
        sign = -sign;
    }
    (2.0 * sum).clamp(0.0, 1.0)
}
