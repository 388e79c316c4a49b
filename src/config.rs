//! Configuration management for icardfinder
//!
//! Settings are loaded from `./config/icardfinder.toml` (or `--config`), then
//! merged with command line overrides into an immutable [`RunConfig`] that is
//! built once and handed to the orchestrator.

use serde::Deserialize;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::transport::TransportSettings;

/// Configuration file path relative to working directory
pub const CONFIG_PATH: &str = "./config/icardfinder.toml";

/// Default configuration file content - this is the ONLY place defaults exist
pub const DEFAULT_CONFIG: &str = include_str!("../config/icardfinder.toml");

/// Upper bound on concurrent lookups
pub const MAX_WORKERS: usize = 100;

/// Attempts per address when failures are re-queued and no limit is configured
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found at {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] io::Error),

    #[error("Failed to parse configuration file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid URL in '{field}': {url}")]
    InvalidUrl { field: String, url: String },

    #[error("Configuration field '{field}' cannot be empty")]
    EmptyRequired { field: String },

    #[error("Configuration field '{field}' must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: String,
        value: u64,
        min: u64,
        max: u64,
    },
}

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub endpoints: EndpointConfig,
    pub form: FormConfig,
    pub run: RunSection,
}

/// HTTP client configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub user_agent: String,
    pub request_timeout_secs: u64,
}

/// Target pages of the two-step lookup
#[derive(Debug, Clone, Deserialize)]
pub struct EndpointConfig {
    pub lookup_url: String,
    pub select_url: String,
    #[serde(default = "default_street_separator")]
    pub street_separator: String,
}

fn default_street_separator() -> String {
    "+".to_string()
}

/// Form and results page details
#[derive(Debug, Clone, Deserialize)]
pub struct FormConfig {
    pub event_target: String,
    pub results_table_id: String,
    pub result_cell_index: usize,
}

/// File locations and run policy
#[derive(Debug, Clone, Deserialize)]
pub struct RunSection {
    pub input_path: String,
    pub output_path: String,
    #[serde(default)]
    pub failure_path: Option<String>,
    pub workers: usize,
    #[serde(default = "default_replay_success")]
    pub replay_success: bool,
    #[serde(default)]
    pub replay_failures: bool,
    #[serde(default)]
    pub max_attempts: Option<u32>,
}

fn default_replay_success() -> bool {
    true
}

/// Command line values that take precedence over the `[run]` section
#[derive(Debug, Clone, Default)]
pub struct RunOverrides {
    pub input_path: Option<String>,
    pub output_path: Option<String>,
    pub failure_path: Option<String>,
    pub workers: Option<usize>,
    pub replay_success: Option<bool>,
    pub replay_failures: Option<bool>,
    pub max_attempts: Option<u32>,
}

impl AppConfig {
    /// Load configuration from the default path
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path(Path::new(CONFIG_PATH))
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate all configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_non_empty("http.user_agent", &self.http.user_agent)?;
        if self.http.request_timeout_secs == 0 {
            return Err(ConfigError::EmptyRequired {
                field: "http.request_timeout_secs".to_string(),
            });
        }

        validate_url("endpoints.lookup_url", &self.endpoints.lookup_url)?;
        validate_url("endpoints.select_url", &self.endpoints.select_url)?;
        require_non_empty("endpoints.street_separator", &self.endpoints.street_separator)?;

        require_non_empty("form.event_target", &self.form.event_target)?;
        require_non_empty("form.results_table_id", &self.form.results_table_id)?;

        require_non_empty("run.input_path", &self.run.input_path)?;
        require_non_empty("run.output_path", &self.run.output_path)?;
        validate_workers("run.workers", self.run.workers)?;
        if let Some(attempts) = self.run.max_attempts {
            validate_attempts("run.max_attempts", attempts)?;
        }

        Ok(())
    }

    /// Create default configuration file at the standard location
    pub fn create_default_config() -> Result<PathBuf, ConfigError> {
        let path = Path::new(CONFIG_PATH);

        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = fs::File::create(path)?;
        file.write_all(DEFAULT_CONFIG.as_bytes())?;

        Ok(path.to_path_buf())
    }
}

fn require_non_empty(field: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::EmptyRequired {
            field: field.to_string(),
        });
    }
    Ok(())
}

fn validate_url(field: &str, url: &str) -> Result<(), ConfigError> {
    let parsed = url::Url::parse(url).map_err(|_| ConfigError::InvalidUrl {
        field: field.to_string(),
        url: url.to_string(),
    })?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(ConfigError::InvalidUrl {
            field: field.to_string(),
            url: url.to_string(),
        });
    }
    Ok(())
}

fn validate_workers(field: &str, workers: usize) -> Result<(), ConfigError> {
    if workers == 0 || workers > MAX_WORKERS {
        return Err(ConfigError::OutOfRange {
            field: field.to_string(),
            value: workers as u64,
            min: 1,
            max: MAX_WORKERS as u64,
        });
    }
    Ok(())
}

fn validate_attempts(field: &str, attempts: u32) -> Result<(), ConfigError> {
    if attempts == 0 {
        return Err(ConfigError::OutOfRange {
            field: field.to_string(),
            value: 0,
            min: 1,
            max: u32::MAX as u64,
        });
    }
    Ok(())
}

/// Fully resolved settings for one run
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    /// Dead-letter destination. Its presence selects the dead-letter policy.
    pub failure_path: Option<PathBuf>,
    pub workers: usize,
    pub replay_success: bool,
    pub replay_failures: bool,
    pub max_attempts: u32,
    pub transport: TransportSettings,
    pub event_target: String,
    pub results_table_id: String,
    pub result_cell_index: usize,
}

impl RunConfig {
    /// Merge file configuration with command line overrides
    pub fn resolve(app: &AppConfig, overrides: &RunOverrides) -> Result<Self, ConfigError> {
        let run = &app.run;

        let workers = overrides.workers.unwrap_or(run.workers);
        validate_workers("workers", workers)?;

        let failure_path = overrides
            .failure_path
            .clone()
            .or_else(|| run.failure_path.clone())
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);

        let max_attempts = match overrides.max_attempts.or(run.max_attempts) {
            Some(attempts) => {
                validate_attempts("max_attempts", attempts)?;
                attempts
            }
            None if failure_path.is_some() => 1,
            None => DEFAULT_RETRY_ATTEMPTS,
        };

        Ok(Self {
            input_path: PathBuf::from(overrides.input_path.as_deref().unwrap_or(&run.input_path)),
            output_path: PathBuf::from(overrides.output_path.as_deref().unwrap_or(&run.output_path)),
            failure_path,
            workers,
            replay_success: overrides.replay_success.unwrap_or(run.replay_success),
            replay_failures: overrides.replay_failures.unwrap_or(run.replay_failures),
            max_attempts,
            transport: TransportSettings {
                lookup_url: app.endpoints.lookup_url.clone(),
                select_url: app.endpoints.select_url.clone(),
                street_separator: app.endpoints.street_separator.clone(),
                user_agent: app.http.user_agent.clone(),
                request_timeout: Duration::from_secs(app.http.request_timeout_secs),
            },
            event_target: app.form.event_target.clone(),
            results_table_id: app.form.results_table_id.clone(),
            result_cell_index: app.form.result_cell_index,
        })
    }

    /// Logs whose rows count as already done, per the replay flags
    pub fn resume_paths(&self) -> Vec<&Path> {
        let mut paths = Vec::new();
        if self.replay_success {
            paths.push(self.output_path.as_path());
        }
        if self.replay_failures {
            if let Some(failure) = &self.failure_path {
                paths.push(failure.as_path());
            }
        }
        paths
    }
}
