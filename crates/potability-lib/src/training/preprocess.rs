//! Missing-value imputation and scaling

use crate::dataset::Dataset;
use crate::predictor::StandardScaler;
use ndarray::{Array2, Axis};
use tracing::{debug, info};

/// Median of the finite values, averaging the two middle values for even
/// counts. None when there are no finite values.
pub fn median(values: impl IntoIterator<Item = f64>) -> Option<f64> {
    let mut finite: Vec<f64> = values.into_iter().filter(|v| !v.is_nan()).collect();
    if finite.is_empty() {
        return None;
    }
    finite.sort_by(f64::total_cmp);
    let mid = finite.len() / 2;
    Some(if finite.len() % 2 == 0 {
        (finite[mid - 1] + finite[mid]) / 2.0
    } else {
        finite[mid]
    })
}

/// Replace NaN cells with their column median. Returns the median used for
/// each column; columns with no observed value are left untouched.
pub fn impute_median(x: &mut Array2<f64>) -> Vec<Option<f64>> {
    x.axis_iter_mut(Axis(1))
        .enumerate()
        .map(|(j, mut column)| {
            let fill = median(column.iter().copied());
            if let Some(m) = fill {
                let mut filled = 0usize;
                column.iter_mut().filter(|v| v.is_nan()).for_each(|v| {
                    *v = m;
                    filled += 1;
                });
                if filled > 0 {
                    debug!(column = j, filled = filled, median = m, "Imputed missing values");
                }
            }
            fill
        })
        .collect()
}

/// Impute, then fit a scaler on the full matrix and scale it
pub fn preprocess(mut x: Array2<f64>, y: Vec<u8>) -> (Dataset, StandardScaler) {
    impute_median(&mut x);
    let scaler = StandardScaler::fit(&x);
    let scaled = scaler.transform(&x);
    let data = Dataset::new(scaled, y);

    let (negatives, positives) = data.class_counts();
    info!(
        rows = data.len(),
        features = data.features.ncols(),
        negatives = negatives,
        positives = positives,
        "Preprocessed training data"
    );
    (data, scaler)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_median_odd_and_even() {
        assert_eq!(median([3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median([4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median([f64::NAN, 5.0]), Some(5.0));
        assert_eq!(median([f64::NAN]), None);
    }

    #[test]
    fn test_impute_uses_non_missing_median() {
        let mut x = Array2::from_shape_vec(
            (5, 2),
            vec![1.0, 10.0, f64::NAN, 20.0, 3.0, f64::NAN, 100.0, 40.0, f64::NAN, 30.0],
        )
        .unwrap();
        let medians = impute_median(&mut x);
        // column 0 observed {1, 3, 100}: median 3, not the mean
        assert_eq!(medians, vec![Some(3.0), Some(25.0)]);
        assert_eq!(x[[1, 0]], 3.0);
        assert_eq!(x[[4, 0]], 3.0);
        assert_eq!(x[[2, 1]], 25.0);
        assert!(x.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_preprocess_scales_after_imputation() {
        let x = Array2::from_shape_vec((4, 1), vec![1.0, f64::NAN, 3.0, 5.0]).unwrap();
        let (data, scaler) = preprocess(x, vec![0, 1, 0, 1]);
        // imputed column is [1, 3, 3, 5]
        assert_eq!(scaler.mean, vec![3.0]);
        assert_eq!(data.features[[1, 0]], 0.0);
        assert_eq!(data.targets, vec![0, 1, 0, 1]);
    }
}
