//! Prediction engine
//!
//! The serving core: an atomically swappable scaler + classifier pair and the
//! two classifier kinds that can fill it.

mod artifact;
mod engine;
mod fallback;
mod forest;
mod output;
mod scaler;

pub use artifact::{
    ArtifactPair, ArtifactStore, Manifest, DEFAULT_VERSION, FALLBACK_VERSION, FEATURES_FILE,
    MANIFEST_FILE, MODEL_FILE, SCALER_FILE,
};
pub use engine::{InferenceStats, ModelDescription, PredictionEngine, MAX_INFERENCE_MS};
pub use fallback::{RuleBasedClassifier, MAX_SAFE_TURBIDITY, SAFE_PH_RANGE};
pub use forest::{DecisionTree, ForestParams, RandomForest, DEFAULT_SEED};
pub use output::{OutputConfig, OutputFormatter, PredictionResult, NEGATIVE_LABEL, POSITIVE_LABEL};
pub use scaler::{Scaler, StandardScaler};

use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Binary classification capability shared by every classifier kind
pub trait Classify: Send + Sync {
    /// `[p_negative, p_positive]` for one scaled row
    fn predict_proba_row(&self, row: &[f64]) -> [f64; 2];

    /// Predicted label; ties go to the negative class
    fn predict_row(&self, row: &[f64]) -> u8 {
        let p = self.predict_proba_row(row);
        u8::from(p[1] > p[0])
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Vec<[f64; 2]> {
        x.rows()
            .into_iter()
            .map(|row| self.predict_proba_row(&row.to_vec()))
            .collect()
    }

    fn predict(&self, x: &Array2<f64>) -> Vec<u8> {
        x.rows()
            .into_iter()
            .map(|row| self.predict_row(&row.to_vec()))
            .collect()
    }

    /// Per-feature importances, when the model exposes them
    fn feature_importances(&self) -> Option<Vec<f64>> {
        None
    }

    /// Positive-class probability of every estimator for every row,
    /// `[estimator][row]`. Only ensembles answer.
    fn estimator_predictions(&self, _x: &Array2<f64>) -> Option<Vec<Vec<f64>>> {
        None
    }
}

impl Classify for RandomForest {
    fn predict_proba_row(&self, row: &[f64]) -> [f64; 2] {
        RandomForest::predict_proba_row(self, row)
    }

    fn feature_importances(&self) -> Option<Vec<f64>> {
        Some(RandomForest::feature_importances(self).to_vec())
    }

    fn estimator_predictions(&self, x: &Array2<f64>) -> Option<Vec<Vec<f64>>> {
        let rows: Vec<Vec<f64>> = x.rows().into_iter().map(|r| r.to_vec()).collect();
        Some(
            self.trees()
                .iter()
                .map(|tree| rows.iter().map(|r| tree.predict_proba_row(r)[1]).collect())
                .collect(),
        )
    }
}

impl Classify for RuleBasedClassifier {
    fn predict_proba_row(&self, row: &[f64]) -> [f64; 2] {
        self.proba(row)
    }

    fn predict_row(&self, row: &[f64]) -> u8 {
        self.label(row)
    }
}

/// The closed set of classifiers an artifact pair can hold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "model", rename_all = "snake_case")]
pub enum Classifier {
    Trained(RandomForest),
    RuleBased(RuleBasedClassifier),
}

impl Classifier {
    pub fn kind(&self) -> &'static str {
        match self {
            Classifier::Trained(_) => "RandomForestClassifier",
            Classifier::RuleBased(_) => "RuleBasedClassifier",
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Classifier::RuleBased(_))
    }

    /// Expected input width, if the classifier was fitted
    pub fn n_features(&self) -> Option<usize> {
        match self {
            Classifier::Trained(forest) => Some(forest.n_features()),
            Classifier::RuleBased(_) => None,
        }
    }

    fn inner(&self) -> &dyn Classify {
        match self {
            Classifier::Trained(forest) => forest,
            Classifier::RuleBased(rules) => rules,
        }
    }
}

impl Classify for Classifier {
    fn predict_proba_row(&self, row: &[f64]) -> [f64; 2] {
        self.inner().predict_proba_row(row)
    }

    fn predict_row(&self, row: &[f64]) -> u8 {
        self.inner().predict_row(row)
    }

    fn feature_importances(&self) -> Option<Vec<f64>> {
        self.inner().feature_importances()
    }

    fn estimator_predictions(&self, x: &Array2<f64>) -> Option<Vec<Vec<f64>>> {
        self.inner().estimator_predictions(x)
    }
}

impl From<RandomForest> for Classifier {
    fn from(forest: RandomForest) -> Self {
        Classifier::Trained(forest)
    }
}
