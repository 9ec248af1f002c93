//! Run configuration.
//!
//! Resolution order:
//! 1. `TRACECHECK_CONFIG` holding a complete JSON [`Config`]
//! 2. individual variables: `TRACECHECK_DATASET`, `TRACECHECK_API_KEY`,
//!    `TRACECHECK_PUSH`, `TRACECHECK_RESULTS_DIR`, `TRACECHECK_TERMINAL_WIDTH`
//! 3. defaults (`dataset_<unix-seconds>`, `<tmp>/tracecheck_runner`, 80 columns)

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::domain::{Result, TracecheckError};

pub const CONFIG_ENV: &str = "TRACECHECK_CONFIG";
pub const DATASET_ENV: &str = "TRACECHECK_DATASET";
pub const API_KEY_ENV: &str = "TRACECHECK_API_KEY";
pub const PUSH_ENV: &str = "TRACECHECK_PUSH";
pub const RESULTS_DIR_ENV: &str = "TRACECHECK_RESULTS_DIR";
pub const TERMINAL_WIDTH_ENV: &str = "TRACECHECK_TERMINAL_WIDTH";

pub const DEFAULT_TERMINAL_WIDTH: usize = 80;

fn default_terminal_width() -> usize {
    DEFAULT_TERMINAL_WIDTH
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub dataset_name: String,
    #[serde(default)]
    pub push: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Where result records are appended. `None` disables persistence.
    #[serde(default)]
    pub result_output_dir: Option<PathBuf>,
    #[serde(default = "default_terminal_width")]
    pub terminal_width: usize,
}

/// Default results directory under the system temp dir.
pub fn default_results_dir() -> PathBuf {
    std::env::temp_dir().join("tracecheck_runner")
}

/// `dataset_<unix-seconds>`.
pub fn default_dataset_name() -> String {
    format!("dataset_{}", chrono::Utc::now().timestamp())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dataset_name: default_dataset_name(),
            push: false,
            api_key: None,
            result_output_dir: Some(default_results_dir()),
            terminal_width: DEFAULT_TERMINAL_WIDTH,
        }
    }
}

impl Config {
    /// Configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(raw) = lookup(CONFIG_ENV) {
            let config: Config = serde_json::from_str(&raw)
                .map_err(|e| TracecheckError::Config(format!("{CONFIG_ENV} is not a valid configuration: {e}")))?;
            config.validate()?;
            return Ok(config);
        }

        let mut config = Config::default();
        if let Some(dataset) = lookup(DATASET_ENV).filter(|d| !d.is_empty()) {
            config.dataset_name = dataset;
        }
        config.api_key = lookup(API_KEY_ENV).filter(|k| !k.is_empty());
        if let Some(push) = lookup(PUSH_ENV) {
            config.push = matches!(push.to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }
        if let Some(dir) = lookup(RESULTS_DIR_ENV).filter(|d| !d.is_empty()) {
            config.result_output_dir = Some(PathBuf::from(dir));
        }
        if let Some(width) = lookup(TERMINAL_WIDTH_ENV) {
            config.terminal_width = width.trim().parse().map_err(|_| {
                TracecheckError::Config(format!("{TERMINAL_WIDTH_ENV} must be a positive integer, got {width:?}"))
            })?;
        }
        config.validate()?;
        Ok(config)
    }

    /// In-memory configuration: nothing is written, nothing is pushed.
    pub fn without_persistence() -> Self {
        Self {
            result_output_dir: None,
            ..Self::default()
        }
    }

    pub fn with_dataset(mut self, dataset_name: impl Into<String>) -> Self {
        self.dataset_name = dataset_name.into();
        self
    }

    pub fn with_results_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.result_output_dir = Some(dir.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.dataset_name.is_empty() {
            return Err(TracecheckError::Config("dataset_name must not be empty".to_string()));
        }
        if self.terminal_width == 0 {
            return Err(TracecheckError::Config("terminal_width must be positive".to_string()));
        }
        if self.push && self.api_key.is_none() {
            return Err(TracecheckError::Config(format!(
                "pushing results requires {API_KEY_ENV} to be set"
            )));
        }
        Ok(())
    }

    /// `<result_output_dir>/results_for_<dataset_name>.jsonl`, when
    /// persistence is enabled.
    pub fn results_file(&self) -> Option<PathBuf> {
        self.result_output_dir
            .as_ref()
            .map(|dir| dir.join(format!("results_for_{}.jsonl", self.dataset_name)))
    }
}
