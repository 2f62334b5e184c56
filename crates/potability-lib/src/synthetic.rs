//! Synthetic water sample generator
//!
//! Draws each feature from a normal distribution around typical values,
//! labels samples with the pH/turbidity rule and flips a share of labels
//! as noise. Values are clamped into the feature domains so the output
//! always passes training-set validation.

use crate::dataset::Dataset;
use crate::error::TrainError;
use crate::predictor::{MAX_SAFE_TURBIDITY, SAFE_PH_RANGE};
use crate::schema::{domain_at, FEATURE_NAMES, NUM_FEATURES, PH_INDEX, TARGET_COLUMN, TURBIDITY_INDEX};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::Path;
use tracing::info;

/// (mean, standard deviation) per feature, canonical order
const FEATURE_DISTRIBUTIONS: [(f64, f64); NUM_FEATURES] = [
    (7.0, 0.8),
    (180.0, 50.0),
    (20000.0, 5000.0),
    (7.0, 2.0),
    (300.0, 100.0),
    (400.0, 100.0),
    (14.0, 4.0),
    (70.0, 20.0),
    (4.0, 2.0),
];

#[derive(Debug, Clone)]
pub struct SyntheticConfig {
    pub samples: usize,
    pub seed: u64,
    /// Probability of flipping each label
    pub label_noise: f64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            samples: 1000,
            seed: 42,
            label_noise: 0.1,
        }
    }
}

/// Standard normal draw (Box-Muller)
fn standard_normal(rng: &mut StdRng) -> f64 {
    // 1 - [0, 1) keeps ln() finite
    let u1: f64 = 1.0 - rng.gen::<f64>();
    let u2: f64 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

pub fn generate(config: &SyntheticConfig) -> Dataset {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut features = Array2::zeros((config.samples, NUM_FEATURES));
    let mut targets = Vec::with_capacity(config.samples);

    for i in 0..config.samples {
        for (j, (mean, std)) in FEATURE_DISTRIBUTIONS.iter().enumerate() {
            let mut value = mean + std * standard_normal(&mut rng);
            if let Some(domain) = domain_at(j) {
                value = value.max(domain.min);
                if let Some(max) = domain.max {
                    value = value.min(max);
                }
            }
            features[[i, j]] = value;
        }

        let ph = features[[i, PH_INDEX]];
        let turbidity = features[[i, TURBIDITY_INDEX]];
        let mut safe = (SAFE_PH_RANGE.0..=SAFE_PH_RANGE.1).contains(&ph)
            && turbidity <= MAX_SAFE_TURBIDITY;
        if rng.gen::<f64>() < config.label_noise {
            safe = !safe;
        }
        targets.push(u8::from(safe));
    }

    let data = Dataset::new(features, targets);
    let (negatives, positives) = data.class_counts();
    info!(
        samples = data.len(),
        safe = positives,
        not_safe = negatives,
        "Generated synthetic water samples"
    );
    data
}

/// Write a data set as CSV with the canonical header
pub fn write_csv(data: &Dataset, path: impl AsRef<Path>) -> Result<(), TrainError> {
    let path = path.as_ref();
    let file = std::fs::File::create(path).map_err(|source| TrainError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let mut writer = csv::Writer::from_writer(file);

    let mut header: Vec<&str> = FEATURE_NAMES.to_vec();
    header.push(TARGET_COLUMN);
    writer.write_record(&header)?;

    for (row, target) in data.features.rows().into_iter().zip(&data.targets) {
        let mut record: Vec<String> = row.iter().map(|v| v.to_string()).collect();
        record.push(target.to_string());
        writer.write_record(&record)?;
    }
    writer.flush().map_err(|source| TrainError::Io {
        path: path.display().to_string(),
        source,
    })?;
    Ok(())
}
