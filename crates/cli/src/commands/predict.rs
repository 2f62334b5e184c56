//! Prediction commands, against a local model directory or the service

use anyhow::Result;
use potability_lib::{predictor::PredictionEngine, PredictionResult};
use std::path::Path;
use tabled::Tabled;

use crate::client::ApiClient;
use crate::output::{
    color_confidence, color_label, format_probability, print_json, print_warning, OutputFormat,
};

/// Row for the prediction table
#[derive(Tabled)]
struct PredictionRow {
    #[tabled(rename = "Result")]
    label: String,
    #[tabled(rename = "P(safe)")]
    probability: String,
    #[tabled(rename = "Confidence")]
    confidence: String,
    #[tabled(rename = "Model")]
    model_version: String,
}

/// Classify one sample with the artifact set in `model_dir`
pub fn predict_local(model_dir: &Path, values: Vec<f64>, format: OutputFormat) -> Result<()> {
    let engine = PredictionEngine::new(model_dir);
    if !engine.load_or_fallback() && format == OutputFormat::Table {
        print_warning(&format!(
            "No model in {}, using the rule-based fallback",
            model_dir.display()
        ));
    }

    let result = engine.predict(values)?;
    print_prediction(&result, format);
    Ok(())
}

/// Classify one sample through the service
pub async fn predict_remote(client: &ApiClient, values: Vec<f64>, format: OutputFormat) -> Result<()> {
    let result = client.predict(&values).await?;
    print_prediction(&result, format);
    Ok(())
}

pub fn print_prediction(result: &PredictionResult, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(result),
        OutputFormat::Table => {
            let row = PredictionRow {
                label: color_label(&result.label, result.prediction),
                probability: format_probability(result.probability),
                confidence: color_confidence(result.confidence),
                model_version: result.model_version.clone(),
            };
            let table = tabled::Table::new([row])
                .with(tabled::settings::Style::rounded())
                .to_string();
            println!("{}", table);
        }
    }
}
