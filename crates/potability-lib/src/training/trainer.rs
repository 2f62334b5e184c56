//! Offline training pipeline
//!
//! `load_data -> validate -> preprocess -> grid search -> evaluate -> persist`.
//! Any failure before persistence aborts the run without touching the model
//! directory. A failed save still returns the evaluation, with
//! `model_saved = false`.

use super::preprocess::preprocess;
use super::search::{cross_val_f1, grid_search, ParamGrid};
use super::split::{stratified_split, DEFAULT_FOLDS, DEFAULT_TEST_FRACTION};
use crate::dataset::{Dataset, TrainingFrame};
use crate::error::{ArtifactError, PersistenceError, TrainError};
use crate::evaluation::{EvaluationReport, ModelEvaluator, OVERFITTING_WARN_THRESHOLD};
use crate::observability::StructuredLogger;
use crate::predictor::{
    ArtifactPair, ArtifactStore, Classifier, ForestParams, Manifest, RandomForest, Scaler,
    StandardScaler, DEFAULT_SEED,
};
use crate::schema::{canonical_feature_names, FEATURE_NAMES, TARGET_COLUMN};
use crate::validator::validate_training_record_set;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// Decides whether a trained model is fit to replace the serving one
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AcceptancePolicy {
    pub max_overfitting_score: f64,
}

impl Default for AcceptancePolicy {
    fn default() -> Self {
        Self {
            max_overfitting_score: OVERFITTING_WARN_THRESHOLD,
        }
    }
}

impl AcceptancePolicy {
    pub fn accepts(&self, report: &EvaluationReport) -> bool {
        !report.is_overfitting(self.max_overfitting_score)
    }
}

/// Training run configuration
#[derive(Debug, Clone)]
pub struct TrainerConfig {
    pub model_dir: PathBuf,
    pub grid: ParamGrid,
    pub cv_folds: usize,
    pub test_fraction: f64,
    pub seed: u64,
    /// Version tag for the saved pair; generated from the clock when unset
    pub version: Option<String>,
    pub acceptance: AcceptancePolicy,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("ml"),
            grid: ParamGrid::default(),
            cv_folds: DEFAULT_FOLDS,
            test_fraction: DEFAULT_TEST_FRACTION,
            seed: DEFAULT_SEED,
            version: None,
            acceptance: AcceptancePolicy::default(),
        }
    }
}

/// Result of an end-to-end training run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingOutcome {
    pub report: EvaluationReport,
    pub best_params: ForestParams,
    pub model_saved: bool,
    pub version: String,
    /// Overfitting score exceeds the acceptance policy
    pub overfitting_flagged: bool,
}

/// Random forest trainer for the potability schema
pub struct Trainer {
    config: TrainerConfig,
    model: Option<RandomForest>,
    scaler: Option<StandardScaler>,
    /// Fitted by `preprocess`, adopted with the forest once `train_model` succeeds
    pending_scaler: Option<StandardScaler>,
    feature_names: Vec<String>,
    logger: StructuredLogger,
}

impl Trainer {
    pub fn new(config: TrainerConfig) -> Self {
        info!(model_dir = %config.model_dir.display(), "Trainer created");
        Self {
            config,
            model: None,
            scaler: None,
            pending_scaler: None,
            feature_names: canonical_feature_names(),
            logger: StructuredLogger::new("potability-trainer"),
        }
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn is_trained(&self) -> bool {
        self.model.is_some() && self.scaler.is_some()
    }

    /// Read a CSV file and run the training-set checks
    pub fn load_data(&self, path: impl AsRef<Path>) -> Result<TrainingFrame, TrainError> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading training data");

        let frame = TrainingFrame::from_csv_path(path)?;
        validate_training_record_set(&frame, &FEATURE_NAMES)?;

        info!(
            rows = frame.len(),
            columns = frame.column_names().len(),
            "Training data loaded"
        );
        Ok(frame)
    }

    /// Median-impute, then fit the scaler on the full matrix. The trained
    /// pair is untouched until `train_model` succeeds.
    pub fn preprocess(&mut self, frame: &TrainingFrame) -> Result<Dataset, TrainError> {
        let (x, y) = frame.to_matrix(&FEATURE_NAMES, TARGET_COLUMN)?;
        let (data, scaler) = preprocess(x, y);
        self.pending_scaler = Some(scaler);
        Ok(data)
    }

    /// Stratified split, grid search, fit the best forest and evaluate it
    pub fn train_model(
        &mut self,
        data: &Dataset,
    ) -> Result<(EvaluationReport, ForestParams), TrainError> {
        if self.pending_scaler.is_none() {
            return Err(TrainError::Training(
                "preprocess must run before train_model".to_string(),
            ));
        }

        let (train_idx, test_idx) =
            stratified_split(&data.targets, self.config.test_fraction, self.config.seed);
        let train = data.select_rows(&train_idx);
        let test = data.select_rows(&test_idx);
        if test.is_empty() {
            return Err(TrainError::Training("test split is empty".to_string()));
        }

        let search = grid_search(&train, &self.config.grid, self.config.cv_folds, self.config.seed)?;
        let forest = RandomForest::fit(&train.features, &train.targets, search.best_params);

        let evaluator = ModelEvaluator::new(self.feature_names.clone());
        let mut report = evaluator.evaluate(
            &forest,
            &train.features,
            &test.features,
            &train.targets,
            &test.targets,
        );

        let cv = cross_val_f1(&train, search.best_params, self.config.cv_folds, self.config.seed)?;
        info!(
            cv_mean = cv.mean,
            cv_std = cv.std,
            test_f1 = report.test.f1,
            "Model training completed"
        );
        report.cross_validation = Some(cv);

        self.model = Some(forest);
        self.scaler = self.pending_scaler.take();
        Ok((report, search.best_params))
    }

    /// Persist scaler, classifier and feature order as one artifact set
    pub fn save_model(&self, version: &str) -> Result<Manifest, PersistenceError> {
        let (Some(model), Some(scaler)) = (&self.model, &self.scaler) else {
            return Err(PersistenceError::NotTrained);
        };

        let pair = ArtifactPair::new(
            Scaler::Standard(scaler.clone()),
            Classifier::Trained(model.clone()),
            self.feature_names.clone(),
            version,
        )
        .map_err(|e| PersistenceError::Inconsistent(e.to_string()))?;

        ArtifactStore::new(&self.config.model_dir).save(&pair)
    }

    /// Adopt the trained pair stored in the model directory
    pub fn load_model(&mut self) -> Result<String, ArtifactError> {
        let pair = ArtifactStore::new(&self.config.model_dir).load()?;
        let (Scaler::Standard(scaler), Classifier::Trained(model)) =
            (pair.scaler(), pair.classifier())
        else {
            return Err(ArtifactError::Corrupt(format!(
                "{} does not hold a trained pair",
                self.config.model_dir.display()
            )));
        };

        self.scaler = Some(scaler.clone());
        self.model = Some(model.clone());
        self.pending_scaler = None;
        self.feature_names = pair.feature_names().to_vec();
        info!(version = %pair.version(), "Model loaded");
        Ok(pair.version().to_string())
    }

    /// Load, validate, preprocess, search and evaluate without persisting
    pub fn fit_from_file(
        &mut self,
        path: impl AsRef<Path>,
    ) -> Result<(EvaluationReport, ForestParams), TrainError> {
        let frame = self.load_data(path)?;
        let data = self.preprocess(&frame)?;
        self.train_model(&data)
    }

    /// The full pipeline. Training failures are errors; a save failure is
    /// reported through `model_saved`.
    pub fn train_from_file(&mut self, path: impl AsRef<Path>) -> Result<TrainingOutcome, TrainError> {
        let (report, best_params) = self.fit_from_file(path).map_err(|e| {
            error!(error = %e, "Training pipeline failed");
            e
        })?;

        let version = self.next_version();
        let model_saved = match self.save_model(&version) {
            Ok(_) => true,
            Err(e) => {
                warn!(error = %e, "Model training completed but saving failed");
                false
            }
        };

        let overfitting_flagged = !self.config.acceptance.accepts(&report);
        if overfitting_flagged {
            warn!(
                overfitting_score = report.overfitting_score,
                threshold = self.config.acceptance.max_overfitting_score,
                "Model may be overfitting"
            );
        }

        self.logger.log_training_completed(
            &version,
            report.test.f1,
            report.overfitting_score,
            model_saved,
        );

        Ok(TrainingOutcome {
            report,
            best_params,
            model_saved,
            version,
            overfitting_flagged,
        })
    }

    /// Configured version, or a timestamped one
    pub fn next_version(&self) -> String {
        self.config
            .version
            .clone()
            .unwrap_or_else(|| format!("rf-{}", Utc::now().format("%Y%m%d%H%M%S%3f")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;
    use crate::predictor::{PredictionEngine, MODEL_FILE, SCALER_FILE};
    use crate::synthetic::{generate, write_csv, SyntheticConfig};
    use tempfile::TempDir;

    fn tiny_grid() -> ParamGrid {
        ParamGrid {
            n_estimators: vec![10],
            max_depth: vec![Some(6)],
            min_samples_split: vec![2],
            min_samples_leaf: vec![1, 2],
        }
    }

    fn write_data(dir: &Path, samples: usize) -> PathBuf {
        let path = dir.join("water.csv");
        let data = generate(&SyntheticConfig {
            samples,
            ..Default::default()
        });
        write_csv(&data, &path).unwrap();
        path
    }

    fn config(model_dir: &Path) -> TrainerConfig {
        TrainerConfig {
            model_dir: model_dir.to_path_buf(),
            grid: tiny_grid(),
            version: Some("rf-test".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_train_from_file_saves_loadable_pair() {
        let dir = TempDir::new().unwrap();
        let model_dir = dir.path().join("model");
        let data = write_data(dir.path(), 300);

        let mut trainer = Trainer::new(config(&model_dir));
        let outcome = trainer.train_from_file(&data).unwrap();

        assert!(outcome.model_saved);
        assert_eq!(outcome.version, "rf-test");
        assert_eq!(outcome.best_params.n_estimators, 10);
        assert!(outcome.report.test.f1 > 0.5);
        assert!(outcome.report.cross_validation.is_some());
        assert_eq!(outcome.report.feature_importance.len(), 9);

        let engine = PredictionEngine::initialize(&model_dir);
        assert!(engine.is_loaded());
        assert_eq!(engine.version(), "rf-test");
    }

    #[test]
    fn test_save_before_training_fails() {
        let dir = TempDir::new().unwrap();
        let trainer = Trainer::new(config(dir.path()));
        assert!(matches!(
            trainer.save_model("v1"),
            Err(PersistenceError::NotTrained)
        ));
    }

    #[test]
    fn test_invalid_data_aborts_without_artifacts() {
        let dir = TempDir::new().unwrap();
        let model_dir = dir.path().join("model");
        // below the row minimum
        let data = write_data(dir.path(), 50);

        let mut trainer = Trainer::new(config(&model_dir));
        let err = trainer.train_from_file(&data).unwrap_err();
        assert!(matches!(err, TrainError::Validation(_)));
        assert!(!model_dir.join(MODEL_FILE).exists());
        assert!(!model_dir.join(SCALER_FILE).exists());
    }

    #[test]
    fn test_infinite_cell_aborts_without_artifacts() {
        let dir = TempDir::new().unwrap();
        let model_dir = dir.path().join("model");
        let data = write_data(dir.path(), 300);

        let content = std::fs::read_to_string(&data).unwrap();
        let mut lines: Vec<String> = content.lines().map(String::from).collect();
        let mut cells: Vec<&str> = lines[1].split(',').collect();
        cells[1] = "inf";
        lines[1] = cells.join(",");
        std::fs::write(&data, lines.join("\n")).unwrap();

        let mut trainer = Trainer::new(config(&model_dir));
        let err = trainer.train_from_file(&data).unwrap_err();
        assert!(matches!(
            err,
            TrainError::Validation(ValidationError::NonFinite(_))
        ));
        assert!(!trainer.is_trained());
        assert!(!model_dir.join(MODEL_FILE).exists());
        assert!(!model_dir.join(SCALER_FILE).exists());
    }

    #[test]
    fn test_failed_retrain_keeps_previous_pair() {
        let dir = TempDir::new().unwrap();
        let model_dir = dir.path().join("model");
        let data = write_data(dir.path(), 300);

        let mut trainer = Trainer::new(config(&model_dir));
        trainer.fit_from_file(&data).unwrap();
        trainer.save_model("rf-test").unwrap();
        let scaler_before = std::fs::read(model_dir.join(SCALER_FILE)).unwrap();

        // three rows leave the stratified test split empty
        let header = FEATURE_NAMES.join(",") + ",Potability";
        let tiny = format!(
            "{}\n7,200,20000,7,300,500,15,80,4,1\n6,150,15000,6,250,400,12,70,3,0\n8,250,30000,8,350,600,18,90,5,1\n",
            header
        );
        let frame = TrainingFrame::from_reader(tiny.as_bytes()).unwrap();
        let rescaled = trainer.preprocess(&frame).unwrap();
        assert!(trainer.train_model(&rescaled).is_err());
        assert!(trainer.is_trained());

        trainer.save_model("rf-test").unwrap();
        let scaler_after = std::fs::read(model_dir.join(SCALER_FILE)).unwrap();
        assert_eq!(scaler_before, scaler_after);
    }

    #[test]
    fn test_train_model_requires_preprocess() {
        let dir = TempDir::new().unwrap();
        let data = generate(&SyntheticConfig {
            samples: 200,
            ..Default::default()
        });
        let mut trainer = Trainer::new(config(dir.path()));
        assert!(matches!(
            trainer.train_model(&data),
            Err(TrainError::Training(_))
        ));
        assert!(!trainer.is_trained());
    }

    #[test]
    fn test_load_model_adopts_saved_pair() {
        let dir = TempDir::new().unwrap();
        let model_dir = dir.path().join("model");
        let data = write_data(dir.path(), 300);
        Trainer::new(config(&model_dir)).train_from_file(&data).unwrap();

        let mut trainer = Trainer::new(config(&model_dir));
        assert!(!trainer.is_trained());
        assert_eq!(trainer.load_model().unwrap(), "rf-test");
        assert!(trainer.is_trained());
        assert_eq!(trainer.feature_names().len(), 9);
    }

    #[test]
    fn test_load_model_rejects_missing_or_fallback_pair() {
        let dir = TempDir::new().unwrap();
        let mut trainer = Trainer::new(config(&dir.path().join("absent")));
        assert!(matches!(
            trainer.load_model(),
            Err(ArtifactError::NotFound(_))
        ));

        let fallback_dir = dir.path().join("fallback");
        ArtifactStore::new(&fallback_dir)
            .save(&ArtifactPair::fallback())
            .unwrap();
        let mut trainer = Trainer::new(config(&fallback_dir));
        assert!(matches!(
            trainer.load_model(),
            Err(ArtifactError::Corrupt(_))
        ));
        assert!(!trainer.is_trained());
    }

    #[test]
    fn test_save_failure_keeps_results() {
        let dir = TempDir::new().unwrap();
        let data = write_data(dir.path(), 300);
        // a regular file where the model directory should be
        let blocker = dir.path().join("blocked");
        std::fs::write(&blocker, b"").unwrap();

        let mut trainer = Trainer::new(config(&blocker));
        let outcome = trainer.train_from_file(&data).unwrap();
        assert!(!outcome.model_saved);
        assert!(outcome.report.test.accuracy > 0.0);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let mut trainer = Trainer::new(config(dir.path()));
        let err = trainer.train_from_file(dir.path().join("absent.csv")).unwrap_err();
        assert!(matches!(err, TrainError::Io { .. }));
    }

    #[test]
    fn test_acceptance_policy() {
        let dir = TempDir::new().unwrap();
        let data = write_data(dir.path(), 300);
        let mut trainer = Trainer::new(config(dir.path()));
        let (mut report, _) = trainer.fit_from_file(&data).unwrap();

        let policy = AcceptancePolicy::default();
        report.overfitting_score = 0.05;
        assert!(policy.accepts(&report));
        report.overfitting_score = 0.2;
        assert!(!policy.accepts(&report));
    }

    #[test]
    fn test_generated_version_is_timestamped() {
        let trainer = Trainer::new(TrainerConfig::default());
        assert!(trainer.next_version().starts_with("rf-"));
    }
}
