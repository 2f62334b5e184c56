//! Model administration commands against the service

use anyhow::Result;
use colored::Colorize;
use potability_lib::predictor::ModelDescription;

use crate::client::ApiClient;
use crate::output::{color_status, print_json, print_success, print_warning, OutputFormat};

fn print_description(model: &ModelDescription) {
    let state = if model.model_loaded { "loaded" } else { "fallback" };
    println!("{}", "Active Model".bold());
    println!("{}", "=".repeat(50));
    println!("Version:   {}", model.version);
    println!("State:     {}", color_status(state));
    println!("Model:     {}", model.model_kind);
    println!("Scaler:    {}", model.scaler_kind);
    println!("Features:  {}", model.feature_names.join(", "));
}

/// Show the service's active model
pub async fn model_info(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let model = client.model_info().await?;
    match format {
        OutputFormat::Json => print_json(&model),
        OutputFormat::Table => print_description(&model),
    }
    Ok(())
}

/// Ask the service to reload its model directory
pub async fn model_reload(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let response = client.reload().await?;
    match format {
        OutputFormat::Json => print_json(&response),
        OutputFormat::Table => {
            if response.model.model_loaded {
                print_success(&format!("Model {} loaded", response.model.version));
            } else {
                print_warning("No usable artifact set; service is on the rule-based fallback");
            }
            print_description(&response.model);
        }
    }
    Ok(())
}

/// Show service health
pub async fn health(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let health = client.health().await?;
    match format {
        OutputFormat::Json => print_json(&health),
        OutputFormat::Table => {
            let status = health.status.as_str();
            println!("{}", "Service Health".bold());
            println!("{}", "=".repeat(50));
            println!("Status:    {}", color_status(status));
            println!("Model:     {} (loaded: {})", health.model_version, health.model_loaded);
            println!("Uptime:    {}s", health.uptime_secs);
            let mut names: Vec<_> = health.components.keys().collect();
            names.sort();
            for name in names {
                let component = &health.components[name];
                let status = component.status.as_str();
                match &component.message {
                    Some(message) => println!("  {:<10} {} ({})", name, color_status(status), message),
                    None => println!("  {:<10} {}", name, color_status(status)),
                }
            }
        }
    }
    Ok(())
}
