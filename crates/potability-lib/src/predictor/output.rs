//! Prediction output formatting
//!
//! Turns a raw two-class probability vector into a [`PredictionResult`]
//! with a human-readable label and confidence.

use serde::{Deserialize, Serialize};

/// Label for class 1
pub const POSITIVE_LABEL: &str = "Safe";

/// Label for class 0
pub const NEGATIVE_LABEL: &str = "Not Safe";

/// Outcome of one inference call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub prediction: u8,
    pub probability: f64,
    pub confidence: f64,
    pub label: String,
    pub model_version: String,
    pub feature_names: Vec<String>,
}

impl PredictionResult {
    /// `[p_negative, p_positive]` recovered from the result
    pub fn class_probabilities(&self) -> [f64; 2] {
        [1.0 - self.probability, self.probability]
    }
}

/// Configuration for output formatting
#[derive(Debug, Clone)]
pub struct OutputConfig {
    pub positive_label: String,
    pub negative_label: String,
    /// Confidence below this is reported as low
    pub low_confidence_threshold: f64,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            positive_label: POSITIVE_LABEL.to_string(),
            negative_label: NEGATIVE_LABEL.to_string(),
            low_confidence_threshold: 0.7,
        }
    }
}

/// Builds [`PredictionResult`]s from classifier output
#[derive(Debug, Clone, Default)]
pub struct OutputFormatter {
    config: OutputConfig,
}

impl OutputFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: OutputConfig) -> Self {
        Self { config }
    }

    /// Assemble a result.
    ///
    /// # Arguments
    /// * `label` - Predicted class (0 or 1)
    /// * `proba` - Raw class probabilities `[p_negative, p_positive]`
    /// * `model_version` - Version tag of the pair that produced them
    /// * `feature_names` - Column order the pair consumed
    pub fn format(
        &self,
        label: u8,
        proba: [f64; 2],
        model_version: &str,
        feature_names: &[String],
    ) -> PredictionResult {
        let probability = proba[1].clamp(0.0, 1.0);
        let confidence = probability.max(1.0 - probability);

        let text = if label == 1 {
            &self.config.positive_label
        } else {
            &self.config.negative_label
        };

        PredictionResult {
            prediction: label,
            probability,
            confidence,
            label: text.clone(),
            model_version: model_version.to_string(),
            feature_names: feature_names.to_vec(),
        }
    }

    pub fn is_low_confidence(&self, result: &PredictionResult) -> bool {
        result.confidence < self.config.low_confidence_threshold
    }

    /// Short explanation when confidence is low
    pub fn low_confidence_reason(&self, result: &PredictionResult) -> Option<String> {
        if result.confidence < 0.55 {
            Some("Classes nearly indistinguishable for this sample".to_string())
        } else if self.is_low_confidence(result) {
            Some("Sample lies near the decision boundary".to_string())
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names() -> Vec<String> {
        vec!["ph".to_string()]
    }

    #[test]
    fn test_confidence_is_max_class_probability() {
        let formatter = OutputFormatter::new();
        let result = formatter.format(0, [0.92, 0.08], "v1", &names());
        assert_eq!(result.label, NEGATIVE_LABEL);
        assert!((result.probability - 0.08).abs() < 1e-12);
        assert!((result.confidence - 0.92).abs() < 1e-12);
    }

    #[test]
    fn test_positive_label() {
        let formatter = OutputFormatter::new();
        let result = formatter.format(1, [0.1, 0.9], "v2", &names());
        assert_eq!(result.label, POSITIVE_LABEL);
        assert_eq!(result.model_version, "v2");
        let p = result.class_probabilities();
        assert!((p[0] + p[1] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_probability_clamped() {
        let formatter = OutputFormatter::new();
        let result = formatter.format(1, [-0.2, 1.2], "v1", &names());
        assert_eq!(result.probability, 1.0);
        assert_eq!(result.confidence, 1.0);
    }

    #[test]
    fn test_low_confidence_detection() {
        let formatter = OutputFormatter::new();
        let unsure = formatter.format(1, [0.35, 0.65], "v1", &names());
        assert!(formatter.is_low_confidence(&unsure));
        assert!(formatter.low_confidence_reason(&unsure).is_some());

        let sure = formatter.format(1, [0.1, 0.9], "v1", &names());
        assert!(!formatter.is_low_confidence(&sure));
        assert!(formatter.low_confidence_reason(&sure).is_none());
    }
}
