//! Feature scaling
//!
//! A trained artifact carries a [`StandardScaler`]; the fallback pair uses
//! the identity transform.

use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};

/// Per-column standardisation: `(x - mean) / std`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl StandardScaler {
    /// Fit column means and population standard deviations.
    /// Constant columns get a scale of 1.0.
    pub fn fit(x: &Array2<f64>) -> Self {
        let n = x.nrows().max(1) as f64;
        let mean: Vec<f64> = x
            .axis_iter(Axis(1))
            .map(|col| col.sum() / n)
            .collect();
        let scale = x
            .axis_iter(Axis(1))
            .zip(&mean)
            .map(|(col, m)| {
                let var = col.iter().map(|v| (v - m).powi(2)).sum::<f64>() / n;
                let std = var.sqrt();
                if std > f64::EPSILON {
                    std
                } else {
                    1.0
                }
            })
            .collect();
        Self { mean, scale }
    }

    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    pub fn transform_row(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(v, (m, s))| (v - m) / s)
            .collect()
    }

    pub fn transform(&self, x: &Array2<f64>) -> Array2<f64> {
        let mut out = x.clone();
        for mut row in out.axis_iter_mut(Axis(0)) {
            for ((v, m), s) in row.iter_mut().zip(&self.mean).zip(&self.scale) {
                *v = (*v - m) / s;
            }
        }
        out
    }
}

/// Scaler half of an artifact pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Scaler {
    Standard(StandardScaler),
    /// Pass-through, values only coerced to floating point
    Identity,
}

impl Scaler {
    pub fn kind(&self) -> &'static str {
        match self {
            Scaler::Standard(_) => "StandardScaler",
            Scaler::Identity => "IdentityScaler",
        }
    }

    /// Expected input width, if the scaler was fitted
    pub fn n_features(&self) -> Option<usize> {
        match self {
            Scaler::Standard(s) => Some(s.n_features()),
            Scaler::Identity => None,
        }
    }

    pub fn transform_row(&self, row: &[f64]) -> Vec<f64> {
        match self {
            Scaler::Standard(s) => s.transform_row(row),
            Scaler::Identity => row.to_vec(),
        }
    }

    pub fn transform(&self, x: &Array2<f64>) -> Array2<f64> {
        match self {
            Scaler::Standard(s) => s.transform(x),
            Scaler::Identity => x.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_scaler_zero_mean_unit_variance() {
        let x = Array2::from_shape_vec((4, 2), vec![1.0, 10.0, 2.0, 10.0, 3.0, 10.0, 4.0, 10.0])
            .unwrap();
        let scaler = StandardScaler::fit(&x);
        assert_eq!(scaler.mean, vec![2.5, 10.0]);
        // constant column keeps unit scale
        assert_eq!(scaler.scale[1], 1.0);

        let scaled = scaler.transform(&x);
        let col_mean: f64 = scaled.column(0).sum() / 4.0;
        let col_var: f64 = scaled.column(0).iter().map(|v| v * v).sum::<f64>() / 4.0;
        assert!(col_mean.abs() < 1e-12);
        assert!((col_var - 1.0).abs() < 1e-12);
        assert_eq!(scaled.column(1).to_vec(), vec![0.0; 4]);
    }

    #[test]
    fn test_row_and_matrix_transform_agree() {
        let x = Array2::from_shape_vec((3, 2), vec![1.0, 5.0, 2.0, 7.0, 6.0, 9.0]).unwrap();
        let scaler = Scaler::Standard(StandardScaler::fit(&x));
        let matrix = scaler.transform(&x);
        let row = scaler.transform_row(&[2.0, 7.0]);
        assert_eq!(row, matrix.row(1).to_vec());
    }

    #[test]
    fn test_identity_passes_through() {
        let scaler = Scaler::Identity;
        assert_eq!(scaler.transform_row(&[7.0, 4.0]), vec![7.0, 4.0]);
        assert_eq!(scaler.n_features(), None);
        assert_eq!(scaler.kind(), "IdentityScaler");
    }
}
