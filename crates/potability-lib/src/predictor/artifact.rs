//! Artifact pair persistence
//!
//! A model directory holds four files:
//! - `scaler.json` and `model.json`, the pair itself
//! - `features.json`, the column order the pair was fitted on (optional)
//! - `manifest.json`, version tag and checksums (optional, written last)
//!
//! The scaler and classifier are always written and read as a set. A
//! directory missing either one is treated as "model files not found".

use super::{Classifier, RuleBasedClassifier, Scaler};
use crate::error::{ArtifactError, PersistenceError};
use crate::schema::{canonical_feature_names, FEATURE_NAMES};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const SCALER_FILE: &str = "scaler.json";
pub const MODEL_FILE: &str = "model.json";
pub const FEATURES_FILE: &str = "features.json";
pub const MANIFEST_FILE: &str = "manifest.json";

/// Version reported while the rule-based pair serves
pub const FALLBACK_VERSION: &str = "fallback-1.0.0";

/// Version assumed for artifact sets written without a manifest
pub const DEFAULT_VERSION: &str = "1.0.0";

/// Co-versioned scaler and classifier
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactPair {
    scaler: Scaler,
    classifier: Classifier,
    feature_names: Vec<String>,
    version: String,
}

impl ArtifactPair {
    /// Pair a scaler with a classifier, rejecting mismatched widths
    pub fn new(
        scaler: Scaler,
        classifier: Classifier,
        feature_names: Vec<String>,
        version: impl Into<String>,
    ) -> Result<Self, ArtifactError> {
        let width = feature_names.len();
        if let Some(n) = scaler.n_features().filter(|&n| n != width) {
            return Err(ArtifactError::Corrupt(format!(
                "scaler fitted on {} features, feature list has {}",
                n, width
            )));
        }
        if let Some(n) = classifier.n_features().filter(|&n| n != width) {
            return Err(ArtifactError::Corrupt(format!(
                "classifier fitted on {} features, feature list has {}",
                n, width
            )));
        }
        Ok(Self {
            scaler,
            classifier,
            feature_names,
            version: version.into(),
        })
    }

    /// Identity scaler + rule-based classifier
    pub fn fallback() -> Self {
        Self {
            scaler: Scaler::Identity,
            classifier: Classifier::RuleBased(RuleBasedClassifier),
            feature_names: canonical_feature_names(),
            version: FALLBACK_VERSION.to_string(),
        }
    }

    pub fn scaler(&self) -> &Scaler {
        &self.scaler
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn is_fallback(&self) -> bool {
        self.classifier.is_fallback()
    }
}

/// Metadata written alongside an artifact set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub version: String,
    pub created_at: DateTime<Utc>,
    pub model_kind: String,
    pub scaler_kind: String,
    pub scaler_sha256: String,
    pub model_sha256: String,
}

/// Reads and writes artifact sets in one directory
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// True when both halves of the pair are present
    pub fn exists(&self) -> bool {
        self.dir.join(SCALER_FILE).is_file() && self.dir.join(MODEL_FILE).is_file()
    }

    /// Persist the pair. The manifest is written last.
    pub fn save(&self, pair: &ArtifactPair) -> Result<Manifest, PersistenceError> {
        fs::create_dir_all(&self.dir).map_err(|source| PersistenceError::Io {
            path: self.dir.display().to_string(),
            source,
        })?;

        let scaler_bytes = serde_json::to_vec(&pair.scaler)
            .map_err(|source| PersistenceError::Serialize { what: "scaler", source })?;
        let model_bytes = serde_json::to_vec(&pair.classifier)
            .map_err(|source| PersistenceError::Serialize { what: "classifier", source })?;
        let feature_bytes = serde_json::to_vec_pretty(&pair.feature_names)
            .map_err(|source| PersistenceError::Serialize { what: "feature names", source })?;

        write_atomic(&self.dir.join(SCALER_FILE), &scaler_bytes)?;
        write_atomic(&self.dir.join(MODEL_FILE), &model_bytes)?;
        write_atomic(&self.dir.join(FEATURES_FILE), &feature_bytes)?;

        let manifest = Manifest {
            version: pair.version.clone(),
            created_at: Utc::now(),
            model_kind: pair.classifier.kind().to_string(),
            scaler_kind: pair.scaler.kind().to_string(),
            scaler_sha256: compute_checksum(&scaler_bytes),
            model_sha256: compute_checksum(&model_bytes),
        };
        let manifest_bytes = serde_json::to_vec_pretty(&manifest)
            .map_err(|source| PersistenceError::Serialize { what: "manifest", source })?;
        write_atomic(&self.dir.join(MANIFEST_FILE), &manifest_bytes)?;

        info!(
            dir = %self.dir.display(),
            version = %manifest.version,
            model_kind = %manifest.model_kind,
            "Artifact set saved"
        );
        Ok(manifest)
    }

    /// Load the pair from disk
    pub fn load(&self) -> Result<ArtifactPair, ArtifactError> {
        if !self.exists() {
            return Err(ArtifactError::NotFound(self.dir.display().to_string()));
        }

        let scaler_bytes = self.read(SCALER_FILE)?;
        let model_bytes = self.read(MODEL_FILE)?;

        let manifest = match self.read_optional(MANIFEST_FILE)? {
            Some(bytes) => {
                let manifest: Manifest = serde_json::from_slice(&bytes)
                    .map_err(|e| ArtifactError::Corrupt(format!("{}: {}", MANIFEST_FILE, e)))?;
                verify_checksum(SCALER_FILE, &scaler_bytes, &manifest.scaler_sha256)?;
                verify_checksum(MODEL_FILE, &model_bytes, &manifest.model_sha256)?;
                Some(manifest)
            }
            None => {
                debug!(dir = %self.dir.display(), "No manifest, skipping checksum verification");
                None
            }
        };

        let scaler: Scaler = serde_json::from_slice(&scaler_bytes)
            .map_err(|e| ArtifactError::Corrupt(format!("{}: {}", SCALER_FILE, e)))?;
        let classifier: Classifier = serde_json::from_slice(&model_bytes)
            .map_err(|e| ArtifactError::Corrupt(format!("{}: {}", MODEL_FILE, e)))?;

        let feature_names = match self.read_optional(FEATURES_FILE)? {
            Some(bytes) => {
                let names: Vec<String> = serde_json::from_slice(&bytes)
                    .map_err(|e| ArtifactError::Corrupt(format!("{}: {}", FEATURES_FILE, e)))?;
                if let Some(unknown) = names.iter().find(|n| !FEATURE_NAMES.contains(&n.as_str())) {
                    return Err(ArtifactError::Corrupt(format!(
                        "unknown feature name '{}' in {}",
                        unknown, FEATURES_FILE
                    )));
                }
                names
            }
            None => canonical_feature_names(),
        };

        let version = manifest
            .map(|m| m.version)
            .unwrap_or_else(|| DEFAULT_VERSION.to_string());

        ArtifactPair::new(scaler, classifier, feature_names, version)
    }

    fn read(&self, file: &str) -> Result<Vec<u8>, ArtifactError> {
        let path = self.dir.join(file);
        fs::read(&path).map_err(|source| ArtifactError::Io {
            path: path.display().to_string(),
            source,
        })
    }

    fn read_optional(&self, file: &str) -> Result<Option<Vec<u8>>, ArtifactError> {
        if self.dir.join(file).is_file() {
            self.read(file).map(Some)
        } else {
            Ok(None)
        }
    }
}

/// Write to a temp file, sync, then rename over the target
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), PersistenceError> {
    let io_err = |p: &Path| {
        let p = p.display().to_string();
        move |source| PersistenceError::Io { path: p, source }
    };

    let temp_path = path.with_extension("tmp");
    let mut file = File::create(&temp_path).map_err(io_err(&temp_path))?;
    file.write_all(bytes).map_err(io_err(&temp_path))?;
    file.sync_all().map_err(io_err(&temp_path))?;
    fs::rename(&temp_path, path).map_err(io_err(path))?;
    Ok(())
}

fn compute_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

fn verify_checksum(file: &str, data: &[u8], expected: &str) -> Result<(), ArtifactError> {
    let actual = compute_checksum(data);
    if actual != expected {
        return Err(ArtifactError::Corrupt(format!(
            "checksum mismatch for {}: expected {}, got {}",
            file, expected, actual
        )));
    }
    Ok(())
}
