use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::runtime::{RetryPolicy, StepOptions};
use crate::workflow::{DISAPPROVED, WorkflowOptions};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    pub server: ServerConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub workflow: WorkflowConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Decision provider endpoints
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProvidersConfig {
    pub sports_url: String,
    pub casino_url: String,
    /// HTTP timeout of one provider call
    #[serde(default = "default_provider_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_provider_timeout_ms() -> u64 {
    10_000
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            sports_url: "http://127.0.0.1:8091".to_string(),
            casino_url: "http://127.0.0.1:8092".to_string(),
            request_timeout_ms: default_provider_timeout_ms(),
        }
    }
}

/// Retry policy in config units (milliseconds)
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct RetryConfig {
    pub initial_interval_ms: u64,
    pub backoff_coefficient: f64,
    pub maximum_interval_ms: u64,
    pub expiration_interval_ms: u64,
    pub maximum_attempts: u32,
    /// Per-attempt budget; absent means unbounded
    pub start_to_close_ms: Option<u64>,
    pub non_retriable_reasons: Vec<String>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_interval_ms: 1_000,
            backoff_coefficient: 2.0,
            maximum_interval_ms: 60_000,
            expiration_interval_ms: 5 * 60_000,
            maximum_attempts: 10,
            start_to_close_ms: Some(60_000),
            non_retriable_reasons: Vec::new(),
        }
    }
}

impl RetryConfig {
    fn with(maximum_attempts: u32, start_to_close_ms: u64, reasons: &[&str]) -> Self {
        Self {
            maximum_attempts,
            start_to_close_ms: Some(start_to_close_ms),
            non_retriable_reasons: reasons.iter().map(|r| r.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn to_step_options(&self) -> StepOptions {
        StepOptions::new(
            self.start_to_close_ms.map(Duration::from_millis),
            RetryPolicy {
                initial_interval: Duration::from_millis(self.initial_interval_ms),
                backoff_coefficient: self.backoff_coefficient,
                maximum_interval: Duration::from_millis(self.maximum_interval_ms),
                expiration_interval: Duration::from_millis(self.expiration_interval_ms),
                maximum_attempts: self.maximum_attempts,
                non_retriable_reasons: self.non_retriable_reasons.clone(),
            },
        )
    }
}

/// Step policies of the approval workflow
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct WorkflowConfig {
    pub create: RetryConfig,
    pub auto_approval: RetryConfig,
    /// `start_to_close_ms` is the budget of the whole suspended manual step
    pub manual: RetryConfig,
    pub manual_registration: RetryConfig,
    pub record: RetryConfig,
    pub payout: RetryConfig,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            create: RetryConfig::with(5, 60_000, &[]),
            auto_approval: RetryConfig::with(10, 10 * 60_000, &[DISAPPROVED]),
            manual: RetryConfig::with(1, 10 * 60_000, &[]),
            manual_registration: RetryConfig::default(),
            record: RetryConfig::default(),
            payout: RetryConfig::with(10, 60_000, &["ERROR:INVALID_ID", "ERROR:INVALID_STATE"]),
        }
    }
}

impl WorkflowConfig {
    pub fn to_options(&self) -> WorkflowOptions {
        WorkflowOptions {
            create: self.create.to_step_options(),
            auto_approval: self.auto_approval.to_step_options(),
            manual: self.manual.to_step_options(),
            record: self.record.to_step_options(),
            payout: self.payout.to_step_options(),
        }
    }
}

impl AppConfig {
    /// Load `config/{env}.yaml`
    pub fn load(env: &str) -> Result<Self, ConfigError> {
        Self::from_file(format!("config/{}.yaml", env))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Ok(serde_yaml::from_str(&content)?)
    }
}
