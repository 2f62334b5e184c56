//! Offline training: splitting, preprocessing, hyperparameter search and the
//! end-to-end trainer

mod preprocess;
mod search;
mod split;
mod trainer;

pub use preprocess::{impute_median, median, preprocess};
pub use search::{cross_val_f1, grid_search, ParamGrid, SearchResult};
pub use split::{stratified_kfold, stratified_split, DEFAULT_FOLDS, DEFAULT_TEST_FRACTION};
pub use trainer::{AcceptancePolicy, Trainer, TrainerConfig, TrainingOutcome};
