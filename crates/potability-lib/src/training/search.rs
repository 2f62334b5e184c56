//! Hyperparameter grid search scored by cross-validated F1

use super::split::stratified_kfold;
use crate::dataset::Dataset;
use crate::error::TrainError;
use crate::evaluation::{f1, CrossValidationSummary};
use crate::predictor::{Classify, ForestParams, RandomForest};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Candidate values for each forest hyperparameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamGrid {
    pub n_estimators: Vec<usize>,
    pub max_depth: Vec<Option<usize>>,
    pub min_samples_split: Vec<usize>,
    pub min_samples_leaf: Vec<usize>,
}

impl Default for ParamGrid {
    fn default() -> Self {
        Self {
            n_estimators: vec![100, 200, 300],
            max_depth: vec![Some(10), Some(20), None],
            min_samples_split: vec![2, 5, 10],
            min_samples_leaf: vec![1, 2, 4],
        }
    }
}

impl ParamGrid {
    /// Small grid for fast local runs
    pub fn quick() -> Self {
        Self {
            n_estimators: vec![50],
            max_depth: vec![Some(10), None],
            min_samples_split: vec![2, 5],
            min_samples_leaf: vec![1, 2],
        }
    }

    /// Number of parameter combinations
    pub fn len(&self) -> usize {
        self.n_estimators.len()
            * self.max_depth.len()
            * self.min_samples_split.len()
            * self.min_samples_leaf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every combination, in a fixed order
    pub fn candidates(&self, seed: u64) -> Vec<ForestParams> {
        let mut out = Vec::with_capacity(self.len());
        for &n_estimators in &self.n_estimators {
            for &max_depth in &self.max_depth {
                for &min_samples_split in &self.min_samples_split {
                    for &min_samples_leaf in &self.min_samples_leaf {
                        out.push(ForestParams {
                            n_estimators,
                            max_depth,
                            min_samples_split,
                            min_samples_leaf,
                            seed,
                        });
                    }
                }
            }
        }
        out
    }
}

/// Outcome of a grid search
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub best_params: ForestParams,
    pub best_score: f64,
    /// Mean validation F1 of every candidate, in grid order
    pub scores: Vec<(ForestParams, f64)>,
}

/// F1 of `params` on each fold
fn fold_scores(
    data: &Dataset,
    params: ForestParams,
    folds: &[(Vec<usize>, Vec<usize>)],
) -> Vec<f64> {
    folds
        .iter()
        .map(|(train_idx, val_idx)| {
            let train = data.select_rows(train_idx);
            let val = data.select_rows(val_idx);
            let forest = RandomForest::fit(&train.features, &train.targets, params);
            f1(&val.targets, &forest.predict(&val.features))
        })
        .collect()
}

fn check_folds(data: &Dataset, k: usize) -> Result<(), TrainError> {
    if k < 2 {
        return Err(TrainError::Training(format!(
            "cross-validation needs at least 2 folds, got {}",
            k
        )));
    }
    if data.len() < k {
        return Err(TrainError::Training(format!(
            "cannot split {} rows into {} folds",
            data.len(),
            k
        )));
    }
    Ok(())
}

/// Exhaustive search for the parameters with the best mean F1 over `k`
/// stratified folds. Ties keep the earlier candidate.
pub fn grid_search(
    data: &Dataset,
    grid: &ParamGrid,
    k: usize,
    seed: u64,
) -> Result<SearchResult, TrainError> {
    if grid.is_empty() {
        return Err(TrainError::Training("parameter grid is empty".to_string()));
    }
    check_folds(data, k)?;

    let folds = stratified_kfold(&data.targets, k, seed);
    info!(candidates = grid.len(), folds = k, "Performing hyperparameter search");

    let scores: Vec<(ForestParams, f64)> = grid
        .candidates(seed)
        .into_par_iter()
        .map(|params| {
            let fold = fold_scores(data, params, &folds);
            let mean = fold.iter().sum::<f64>() / fold.len() as f64;
            debug!(params = %params, mean_f1 = mean, "Candidate scored");
            (params, mean)
        })
        .collect();

    let (best_params, best_score) = scores
        .iter()
        .fold(None, |best: Option<(ForestParams, f64)>, &(params, score)| match best {
            Some((_, b)) if score <= b => best,
            _ => Some((params, score)),
        })
        .ok_or_else(|| TrainError::Training("no candidate was scored".to_string()))?;

    info!(best = %best_params, best_f1 = best_score, "Hyperparameter search finished");
    Ok(SearchResult {
        best_params,
        best_score,
        scores,
    })
}

/// Separate k-fold cross-validation of fixed parameters
pub fn cross_val_f1(
    data: &Dataset,
    params: ForestParams,
    k: usize,
    seed: u64,
) -> Result<CrossValidationSummary, TrainError> {
    check_folds(data, k)?;
    // different shuffle from the search folds
    let folds = stratified_kfold(&data.targets, k, seed.wrapping_add(1));
    Ok(CrossValidationSummary::from_scores(fold_scores(data, params, &folds)))
}
