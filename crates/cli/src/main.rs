//! Water Potability Predictor CLI
//!
//! A command-line tool for training and evaluating potability models,
//! generating synthetic data, and talking to the prediction service.

mod client;
mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{data, model, predict, train};
use potability_lib::evaluation::OVERFITTING_WARN_THRESHOLD;
use potability_lib::predictor::DEFAULT_SEED;
use potability_lib::training::DEFAULT_FOLDS;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Water Potability Predictor CLI
#[derive(Parser)]
#[command(name = "potab")]
#[command(author, version, about = "CLI for the Water Potability Predictor", long_about = None)]
pub struct Cli {
    /// Service URL (can also be set via POTAB_API_URL env var)
    #[arg(long, env = "POTAB_API_URL", global = true)]
    pub api_url: Option<String>,

    /// Bearer token for the service
    #[arg(long, env = "POTAB_API_KEY", hide_env_values = true, global = true)]
    pub api_key: Option<String>,

    /// Output format
    #[arg(long, short, default_value = "table", global = true)]
    pub format: output::OutputFormat,

    /// Enable verbose output
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Train a model from a CSV data set and save it if it passes evaluation
    Train {
        /// Training data CSV with the nine features and `Potability`
        #[arg(long)]
        data: PathBuf,

        /// Directory to write the artifact set to
        #[arg(long)]
        model_dir: Option<PathBuf>,

        /// Search a small parameter grid
        #[arg(long)]
        quick: bool,

        /// Largest acceptable train/test F1 gap
        #[arg(long, default_value_t = OVERFITTING_WARN_THRESHOLD)]
        max_overfitting: f64,

        /// Cross-validation folds
        #[arg(long, default_value_t = DEFAULT_FOLDS)]
        folds: usize,

        #[arg(long, default_value_t = DEFAULT_SEED)]
        seed: u64,

        /// Version tag for the artifact set (timestamped if omitted)
        #[arg(long)]
        model_version: Option<String>,

        /// Save even if the model looks overfit
        #[arg(long)]
        force: bool,
    },

    /// Generate a labelled synthetic data set
    GenerateData {
        /// Output CSV path
        #[arg(long, short, default_value = "water_potability.csv")]
        output: PathBuf,

        #[arg(long, default_value_t = 1000)]
        samples: usize,

        #[arg(long, default_value_t = DEFAULT_SEED)]
        seed: u64,

        /// Share of labels flipped at random
        #[arg(long, default_value_t = 0.1)]
        label_noise: f64,
    },

    /// Classify one sample with a local model directory
    Predict {
        /// Directory holding the artifact set
        #[arg(long)]
        model_dir: Option<PathBuf>,

        /// pH, Hardness, Solids, Chloramines, Sulfate, Conductivity,
        /// Organic_carbon, Trihalomethanes, Turbidity
        #[arg(required = true, allow_negative_numbers = true)]
        values: Vec<f64>,
    },

    /// Inspect or reload the service's model
    #[command(subcommand)]
    Model(ModelCommands),

    /// Calls against the prediction service
    #[command(subcommand)]
    Remote(RemoteCommands),
}

#[derive(Subcommand)]
pub enum ModelCommands {
    /// Show the active model
    Info,

    /// Reload the model directory
    Reload,
}

#[derive(Subcommand)]
pub enum RemoteCommands {
    /// Classify one sample through the service
    Predict {
        #[arg(required = true, allow_negative_numbers = true)]
        values: Vec<f64>,
    },

    /// Show service health
    Health,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = config::Config::load()?;
    let format = cli.format;

    match cli.command {
        Commands::Train {
            data,
            model_dir,
            quick,
            max_overfitting,
            folds,
            seed,
            model_version,
            force,
        } => {
            let args = train::TrainArgs {
                data,
                model_dir: config.model_dir(model_dir),
                quick,
                max_overfitting,
                folds,
                seed,
                version: model_version,
                force,
            };
            // grid search saturates the rayon pool
            tokio::task::spawn_blocking(move || train::train(args, format)).await??;
        }
        Commands::GenerateData {
            output,
            samples,
            seed,
            label_noise,
        } => {
            data::generate_data(&output, samples, seed, label_noise, format)?;
        }
        Commands::Predict { model_dir, values } => {
            predict::predict_local(&config.model_dir(model_dir), values, format)?;
        }
        Commands::Model(model_cmd) => {
            let client = client::ApiClient::new(&config.api_url(cli.api_url), config.api_key(cli.api_key))?;
            match model_cmd {
                ModelCommands::Info => model::model_info(&client, format).await?,
                ModelCommands::Reload => model::model_reload(&client, format).await?,
            }
        }
        Commands::Remote(remote_cmd) => {
            let client = client::ApiClient::new(&config.api_url(cli.api_url), config.api_key(cli.api_key))?;
            match remote_cmd {
                RemoteCommands::Predict { values } => {
                    predict::predict_remote(&client, values, format).await?;
                }
                RemoteCommands::Health => model::health(&client, format).await?,
            }
        }
    }

    Ok(())
}
