//! Synthetic data generation command

use anyhow::{Context, Result};
use potability_lib::synthetic::{generate, write_csv, SyntheticConfig};
use serde::Serialize;
use std::path::Path;

use crate::output::{print_json, print_success, OutputFormat};

#[derive(Serialize)]
struct GenerateSummary<'a> {
    output: &'a str,
    samples: usize,
    safe: usize,
    not_safe: usize,
    seed: u64,
}

/// Write a labelled synthetic data set as CSV
pub fn generate_data(
    output: &Path,
    samples: usize,
    seed: u64,
    label_noise: f64,
    format: OutputFormat,
) -> Result<()> {
    if !(0.0..=1.0).contains(&label_noise) {
        anyhow::bail!("label noise must be within [0, 1], got {}", label_noise);
    }

    let data = generate(&SyntheticConfig {
        samples,
        seed,
        label_noise,
    });
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    write_csv(&data, output).context("Failed to write data set")?;

    let (not_safe, safe) = data.class_counts();
    let output_str = output.display().to_string();
    match format {
        OutputFormat::Json => print_json(&GenerateSummary {
            output: &output_str,
            samples: data.len(),
            safe,
            not_safe,
            seed,
        }),
        OutputFormat::Table => {
            print_success(&format!(
                "Wrote {} samples to {} ({} safe, {} not safe)",
                data.len(),
                output_str,
                safe,
                not_safe
            ));
        }
    }
    Ok(())
}
