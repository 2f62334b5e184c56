//! Feature schema for water potability records
//!
//! Defines the canonical nine-feature order, the per-feature numeric
//! domains, and the immutable [`FeatureRecord`] that every inference input
//! is normalised into.

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Number of features in a record
pub const NUM_FEATURES: usize = 9;

/// Canonical feature order
pub const FEATURE_NAMES: [&str; NUM_FEATURES] = [
    "pH",
    "Hardness",
    "Solids",
    "Chloramines",
    "Sulfate",
    "Conductivity",
    "Organic_carbon",
    "Trihalomethanes",
    "Turbidity",
];

/// Binary target column in training data
pub const TARGET_COLUMN: &str = "Potability";

/// Index of pH in the canonical order
pub const PH_INDEX: usize = 0;

/// Index of turbidity in the canonical order
pub const TURBIDITY_INDEX: usize = 8;

/// Canonical feature names as owned strings
pub fn canonical_feature_names() -> Vec<String> {
    FEATURE_NAMES.iter().map(|s| s.to_string()).collect()
}

/// Numeric domain of a single feature
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureDomain {
    /// Hard lower bound, inclusive
    pub min: f64,
    /// Hard upper bound, inclusive (None = unbounded)
    pub max: Option<f64>,
    /// Soft upper bound; exceeding it at inference time only warns
    pub typical_max: f64,
}

impl FeatureDomain {
    const fn bounded(min: f64, max: f64) -> Self {
        Self { min, max: Some(max), typical_max: max }
    }

    const fn non_negative(typical_max: f64) -> Self {
        Self { min: 0.0, max: None, typical_max }
    }

    /// True if the value lies inside the hard domain
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && self.max.map_or(true, |max| value <= max)
    }

    fn describe(&self) -> String {
        match self.max {
            Some(max) => format!("[{}, {}]", self.min, max),
            None => format!("[{}, inf)", self.min),
        }
    }
}

const DOMAINS: [FeatureDomain; NUM_FEATURES] = [
    FeatureDomain::bounded(0.0, 14.0),
    FeatureDomain::non_negative(1000.0),
    FeatureDomain::non_negative(50000.0),
    FeatureDomain::non_negative(20.0),
    FeatureDomain::non_negative(1000.0),
    FeatureDomain::non_negative(2000.0),
    FeatureDomain::non_negative(50.0),
    FeatureDomain::non_negative(200.0),
    FeatureDomain::non_negative(20.0),
];

/// Domain of a feature by name, if it is part of the schema
pub fn domain_of(name: &str) -> Option<FeatureDomain> {
    FEATURE_NAMES
        .iter()
        .position(|n| *n == name)
        .map(|i| DOMAINS[i])
}

/// Domain of a feature by canonical index
pub fn domain_at(index: usize) -> Option<FeatureDomain> {
    DOMAINS.get(index).copied()
}

/// A validated water sample. Immutable once constructed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawFeatureRecord", into = "RawFeatureRecord")]
pub struct FeatureRecord {
    values: [f64; NUM_FEATURES],
}

impl FeatureRecord {
    /// Build a record from typed fields, enforcing the feature domains
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        ph: f64,
        hardness: f64,
        solids: f64,
        chloramines: f64,
        sulfate: f64,
        conductivity: f64,
        organic_carbon: f64,
        trihalomethanes: f64,
        turbidity: f64,
    ) -> Result<Self, ValidationError> {
        Self::try_from([
            ph,
            hardness,
            solids,
            chloramines,
            sulfate,
            conductivity,
            organic_carbon,
            trihalomethanes,
            turbidity,
        ])
    }

    pub fn ph(&self) -> f64 {
        self.values[PH_INDEX]
    }

    pub fn turbidity(&self) -> f64 {
        self.values[TURBIDITY_INDEX]
    }

    /// Value of a feature by name
    pub fn get(&self, name: &str) -> Option<f64> {
        FEATURE_NAMES
            .iter()
            .position(|n| *n == name)
            .map(|i| self.values[i])
    }

    /// Values in canonical order
    pub fn as_array(&self) -> &[f64; NUM_FEATURES] {
        &self.values
    }

    /// Values ordered by `feature_names` (the active artifact's order)
    pub fn to_vector(&self, feature_names: &[String]) -> Result<Vec<f64>, ValidationError> {
        feature_names
            .iter()
            .map(|name| {
                self.get(name).ok_or_else(|| {
                    ValidationError::Schema(format!("unknown feature '{}' in model schema", name))
                })
            })
            .collect()
    }

    fn check(values: [f64; NUM_FEATURES]) -> Result<Self, ValidationError> {
        for (i, value) in values.iter().enumerate() {
            if !value.is_finite() {
                return Err(ValidationError::NonFinite(format!(
                    "feature '{}' is {}",
                    FEATURE_NAMES[i], value
                )));
            }
            let domain = DOMAINS[i];
            if !domain.contains(*value) {
                return Err(ValidationError::Range(format!(
                    "feature '{}' = {} is outside {}",
                    FEATURE_NAMES[i],
                    value,
                    domain.describe()
                )));
            }
        }
        Ok(Self { values })
    }
}

impl TryFrom<[f64; NUM_FEATURES]> for FeatureRecord {
    type Error = ValidationError;

    fn try_from(values: [f64; NUM_FEATURES]) -> Result<Self, Self::Error> {
        Self::check(values)
    }
}

impl TryFrom<&[f64]> for FeatureRecord {
    type Error = ValidationError;

    fn try_from(values: &[f64]) -> Result<Self, Self::Error> {
        let array: [f64; NUM_FEATURES] =
            values.try_into().map_err(|_| ValidationError::Shape {
                expected: NUM_FEATURES,
                received: values.len(),
            })?;
        Self::check(array)
    }
}

impl TryFrom<&HashMap<String, f64>> for FeatureRecord {
    type Error = ValidationError;

    fn try_from(map: &HashMap<String, f64>) -> Result<Self, Self::Error> {
        if let Some(unknown) = map.keys().find(|k| !FEATURE_NAMES.contains(&k.as_str())) {
            return Err(ValidationError::Schema(format!("unknown feature '{}'", unknown)));
        }
        let mut values = [0.0; NUM_FEATURES];
        for (i, name) in FEATURE_NAMES.iter().enumerate() {
            values[i] = *map
                .get(*name)
                .ok_or_else(|| ValidationError::Schema(format!("missing feature '{}'", name)))?;
        }
        Self::check(values)
    }
}

/// Serde mirror of [`FeatureRecord`] carrying the canonical field names
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawFeatureRecord {
    #[serde(rename = "pH")]
    ph: f64,
    #[serde(rename = "Hardness")]
    hardness: f64,
    #[serde(rename = "Solids")]
    solids: f64,
    #[serde(rename = "Chloramines")]
    chloramines: f64,
    #[serde(rename = "Sulfate")]
    sulfate: f64,
    #[serde(rename = "Conductivity")]
    conductivity: f64,
    #[serde(rename = "Organic_carbon")]
    organic_carbon: f64,
    #[serde(rename = "Trihalomethanes")]
    trihalomethanes: f64,
    #[serde(rename = "Turbidity")]
    turbidity: f64,
}

impl TryFrom<RawFeatureRecord> for FeatureRecord {
    type Error = ValidationError;

    fn try_from(raw: RawFeatureRecord) -> Result<Self, Self::Error> {
        FeatureRecord::new(
            raw.ph,
            raw.hardness,
            raw.solids,
            raw.chloramines,
            raw.sulfate,
            raw.conductivity,
            raw.organic_carbon,
            raw.trihalomethanes,
            raw.turbidity,
        )
    }
}

impl From<FeatureRecord> for RawFeatureRecord {
    fn from(record: FeatureRecord) -> Self {
        let [ph, hardness, solids, chloramines, sulfate, conductivity, organic_carbon, trihalomethanes, turbidity] =
            record.values;
        Self {
            ph,
            hardness,
            solids,
            chloramines,
            sulfate,
            conductivity,
            organic_carbon,
            trihalomethanes,
            turbidity,
        }
    }
}

/// Any of the input shapes the engine accepts for a single prediction
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureInput {
    Record(FeatureRecord),
    Named(HashMap<String, f64>),
    Values(Vec<f64>),
}

impl FeatureInput {
    /// Normalise into a validated record
    pub fn into_record(self) -> Result<FeatureRecord, ValidationError> {
        match self {
            FeatureInput::Record(record) => Ok(record),
            FeatureInput::Named(map) => FeatureRecord::try_from(&map),
            FeatureInput::Values(values) => FeatureRecord::try_from(values.as_slice()),
        }
    }
}

impl From<FeatureRecord> for FeatureInput {
    fn from(record: FeatureRecord) -> Self {
        FeatureInput::Record(record)
    }
}

impl From<HashMap<String, f64>> for FeatureInput {
    fn from(map: HashMap<String, f64>) -> Self {
        FeatureInput::Named(map)
    }
}

impl From<Vec<f64>> for FeatureInput {
    fn from(values: Vec<f64>) -> Self {
        FeatureInput::Values(values)
    }
}

impl From<[f64; NUM_FEATURES]> for FeatureInput {
    fn from(values: [f64; NUM_FEATURES]) -> Self {
        FeatureInput::Values(values.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: [f64; 9] = [7.0, 200.0, 20000.0, 7.0, 300.0, 500.0, 15.0, 80.0, 4.0];

    #[test]
    fn test_record_from_array() {
        let record = FeatureRecord::try_from(SAMPLE).unwrap();
        assert_eq!(record.ph(), 7.0);
        assert_eq!(record.turbidity(), 4.0);
        assert_eq!(record.get("Solids"), Some(20000.0));
    }

    #[test]
    fn test_ph_above_fourteen_rejected() {
        let mut values = SAMPLE;
        values[0] = 15.0;
        let err = FeatureRecord::try_from(values).unwrap_err();
        assert!(matches!(err, ValidationError::Range(_)));
    }

    #[test]
    fn test_negative_value_rejected() {
        let mut values = SAMPLE;
        values[1] = -200.0;
        assert!(matches!(
            FeatureRecord::try_from(values),
            Err(ValidationError::Range(_))
        ));
    }

    #[test]
    fn test_nan_rejected() {
        let mut values = SAMPLE;
        values[4] = f64::NAN;
        assert!(matches!(
            FeatureRecord::try_from(values),
            Err(ValidationError::NonFinite(_))
        ));
    }

    #[test]
    fn test_wrong_length_is_shape_error() {
        let err = FeatureRecord::try_from(&SAMPLE[..3]).unwrap_err();
        assert_eq!(err, ValidationError::Shape { expected: 9, received: 3 });
        assert!(err.to_string().contains("expected 9"));
        assert!(err.to_string().contains("got 3"));
    }

    #[test]
    fn test_named_mapping() {
        let map: HashMap<String, f64> = FEATURE_NAMES
            .iter()
            .zip(SAMPLE.iter())
            .map(|(n, v)| (n.to_string(), *v))
            .collect();
        let record = FeatureRecord::try_from(&map).unwrap();
        assert_eq!(record.as_array(), &SAMPLE);

        let mut missing = map.clone();
        missing.remove("Turbidity");
        assert!(matches!(
            FeatureRecord::try_from(&missing),
            Err(ValidationError::Schema(_))
        ));
    }

    #[test]
    fn test_to_vector_follows_artifact_order() {
        let record = FeatureRecord::try_from(SAMPLE).unwrap();
        let order = vec!["Turbidity".to_string(), "pH".to_string()];
        assert_eq!(record.to_vector(&order).unwrap(), vec![4.0, 7.0]);

        let bad = vec!["Colour".to_string()];
        assert!(record.to_vector(&bad).is_err());
    }

    #[test]
    fn test_serde_uses_canonical_names() {
        let record = FeatureRecord::try_from(SAMPLE).unwrap();
        let json = serde_json::to_value(record).unwrap();
        assert_eq!(json["pH"], 7.0);
        assert_eq!(json["Organic_carbon"], 15.0);

        let back: FeatureRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);

        let invalid = serde_json::json!({
            "pH": 15.0, "Hardness": 200.0, "Solids": 20000.0, "Chloramines": 7.0,
            "Sulfate": 300.0, "Conductivity": 500.0, "Organic_carbon": 15.0,
            "Trihalomethanes": 80.0, "Turbidity": 4.0
        });
        assert!(serde_json::from_value::<FeatureRecord>(invalid).is_err());
    }
}
