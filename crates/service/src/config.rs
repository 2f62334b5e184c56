//! Service configuration

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;

/// Service configuration, read once at startup
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Directory holding the scaler/model/features artifact set
    #[serde(default = "default_model_dir")]
    pub model_dir: PathBuf,

    /// HTTP port
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Bearer token required on predict and model routes; unset disables auth
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,

    /// Instance name attached to structured log events
    #[serde(default = "default_instance")]
    pub instance: String,
}

fn default_model_dir() -> PathBuf {
    PathBuf::from("ml")
}

fn default_api_port() -> u16 {
    5001
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_batch_size() -> usize {
    100
}

fn default_instance() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "potability-service".to_string())
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            model_dir: default_model_dir(),
            api_port: default_api_port(),
            api_key: None,
            log_level: default_log_level(),
            max_batch_size: default_max_batch_size(),
            instance: default_instance(),
        }
    }
}

impl ServiceConfig {
    /// Load configuration from `POTABILITY_*` environment variables
    pub fn load() -> Result<Self> {
        Self::from_env(config::Environment::with_prefix("POTABILITY"))
    }

    fn from_env(env: config::Environment) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(env.try_parsing(true))
            .build()
            .context("failed to read service configuration")?;

        let mut parsed: ServiceConfig = config
            .try_deserialize()
            .context("invalid service configuration")?;
        // an empty key means auth is off
        parsed.api_key = parsed.api_key.filter(|k| !k.trim().is_empty());
        Ok(parsed)
    }
}
