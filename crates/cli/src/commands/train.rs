//! Offline training command

use anyhow::{Context, Result};
use potability_lib::evaluation::generate_report;
use potability_lib::training::{AcceptancePolicy, ParamGrid, Trainer, TrainerConfig, TrainingOutcome};
use std::path::PathBuf;
use tabled::Tabled;
use tracing::info;

use crate::output::{print_error, print_info, print_json, print_success, print_table, print_warning, OutputFormat};

/// Options for `potab train`
#[derive(Debug, Clone)]
pub struct TrainArgs {
    pub data: PathBuf,
    pub model_dir: PathBuf,
    pub quick: bool,
    pub max_overfitting: f64,
    pub folds: usize,
    pub seed: u64,
    pub version: Option<String>,
    /// Save even when the overfitting check fails
    pub force: bool,
}

/// Row for the hyperparameter table
#[derive(Tabled, serde::Serialize)]
struct ParamRow {
    #[tabled(rename = "Parameter")]
    name: &'static str,
    #[tabled(rename = "Value")]
    value: String,
}

/// Train, evaluate and (if accepted) persist a new artifact set
pub fn train(args: TrainArgs, format: OutputFormat) -> Result<()> {
    let acceptance = AcceptancePolicy {
        max_overfitting_score: args.max_overfitting,
    };
    let config = TrainerConfig {
        model_dir: args.model_dir.clone(),
        grid: if args.quick {
            ParamGrid::quick()
        } else {
            ParamGrid::default()
        },
        cv_folds: args.folds,
        seed: args.seed,
        version: args.version.clone(),
        acceptance,
        ..Default::default()
    };

    if format == OutputFormat::Table {
        print_info(&format!(
            "Training on {} ({} parameter combinations, {}-fold CV)",
            args.data.display(),
            config.grid.len(),
            config.cv_folds
        ));
    }

    let mut trainer = Trainer::new(config);
    let (report, best_params) = trainer
        .fit_from_file(&args.data)
        .with_context(|| format!("Training on {} failed", args.data.display()))?;

    let overfitting_flagged = !acceptance.accepts(&report);
    let version = trainer.next_version();
    let model_saved = if overfitting_flagged && !args.force {
        false
    } else {
        match trainer.save_model(&version) {
            Ok(manifest) => {
                info!(version = %manifest.version, dir = %args.model_dir.display(), "Artifact set saved");
                true
            }
            Err(e) => {
                print_error(&format!("Saving the model failed: {}", e));
                false
            }
        }
    };

    let outcome = TrainingOutcome {
        report,
        best_params,
        model_saved,
        version,
        overfitting_flagged,
    };

    match format {
        OutputFormat::Json => print_json(&outcome),
        OutputFormat::Table => print_outcome(&outcome, &args),
    }

    if overfitting_flagged && !args.force {
        anyhow::bail!(
            "model rejected: overfitting score {:.4} exceeds {:.4} (use --force to save anyway)",
            outcome.report.overfitting_score,
            args.max_overfitting
        );
    }
    Ok(())
}

fn print_outcome(outcome: &TrainingOutcome, args: &TrainArgs) {
    println!(
        "{}",
        generate_report(&outcome.report, &outcome.report.feature_importance)
    );

    let params = outcome.best_params;
    let rows = vec![
        ParamRow {
            name: "n_estimators",
            value: params.n_estimators.to_string(),
        },
        ParamRow {
            name: "max_depth",
            value: params
                .max_depth
                .map_or_else(|| "None".to_string(), |d| d.to_string()),
        },
        ParamRow {
            name: "min_samples_split",
            value: params.min_samples_split.to_string(),
        },
        ParamRow {
            name: "min_samples_leaf",
            value: params.min_samples_leaf.to_string(),
        },
    ];
    print_table(&rows, OutputFormat::Table);

    if outcome.overfitting_flagged {
        print_warning(&format!(
            "Overfitting score {:.4} exceeds {:.4}",
            outcome.report.overfitting_score, args.max_overfitting
        ));
    }
    if outcome.model_saved {
        print_success(&format!(
            "Model {} saved to {}",
            outcome.version,
            args.model_dir.display()
        ));
    } else {
        print_warning("Model was not saved");
    }
}
