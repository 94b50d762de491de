//! Configuration management for Searchlight
//!
//! Settings come from a JSON file (explicit path or one of the default
//! locations) and are then overridden by `SEARCHLIGHT_*` environment variables.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const ENV_URL: &str = "SEARCHLIGHT_URL";
pub const ENV_API_KEY: &str = "SEARCHLIGHT_API_KEY";
pub const ENV_TIMEOUT_SECS: &str = "SEARCHLIGHT_TIMEOUT_SECS";
pub const ENV_FAILURE_MODE: &str = "SEARCHLIGHT_FAILURE_MODE";

const CONFIG_PATHS: [&str; 3] = [".searchlight.json", "searchlight.json", ".searchlight/config.json"];

#[derive(Error, Debug)]
pub enum ConfigError {
  #[error("Failed to read config file {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("Invalid config file {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },

  #[error("Invalid value '{value}' for {key}")]
  InvalidValue { key: String, value: String },
}

/// How fetch failures show up in the view state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureMode {
  /// Log and keep showing the loading state
  #[default]
  LogOnly,
  /// Log and move to an explicit failed state
  Surface,
}

impl std::str::FromStr for FailureMode {
  type Err = ConfigError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_lowercase().as_str() {
      "log-only" | "log_only" | "log" => Ok(FailureMode::LogOnly),
      "surface" => Ok(FailureMode::Surface),
      _ => Err(ConfigError::InvalidValue { key: ENV_FAILURE_MODE.to_string(), value: s.to_string() }),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendConfig {
  /// Project URL, e.g. `https://xyz.supabase.co`
  #[serde(default)]
  pub url: String,
  /// Public API key sent as `apikey` and bearer token
  #[serde(default)]
  pub api_key: Option<String>,
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
  30
}

impl Default for BackendConfig {
  fn default() -> Self {
    Self { url: String::new(), api_key: None, timeout_secs: default_timeout_secs() }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub backend: BackendConfig,
  #[serde(default)]
  pub failure_mode: FailureMode,
}

impl Config {
  /// Load configuration from a file
  pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
      .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
    serde_json::from_str(&content)
      .map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })
  }

  /// Load from `path` or the default locations, then apply environment overrides
  pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
    let mut config = match path {
      Some(path) => Self::load_from_file(path)?,
      None => match CONFIG_PATHS.iter().map(Path::new).find(|p| p.exists()) {
        Some(found) => Self::load_from_file(found)?,
        None => Config::default(),
      },
    };

    config.apply_overrides(|key| std::env::var(key).ok())?;
    Ok(config)
  }

  /// Apply overrides from a key lookup (the environment, in practice)
  pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
  where
    F: Fn(&str) -> Option<String>,
  {
    if let Some(url) = lookup(ENV_URL) {
      self.backend.url = url;
    }
    if let Some(key) = lookup(ENV_API_KEY) {
      self.backend.api_key = Some(key);
    }
    if let Some(secs) = lookup(ENV_TIMEOUT_SECS) {
      self.backend.timeout_secs = secs
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue { key: ENV_TIMEOUT_SECS.to_string(), value: secs })?;
    }
    if let Some(mode) = lookup(ENV_FAILURE_MODE) {
      self.failure_mode = mode.parse()?;
    }
    Ok(())
  }
}
