//! Configuration loading for the AVBag tools
//!
//! One TOML bootstrap file shared by both binaries. Resolution order for
//! every setting: command-line flag, then environment variable, then the
//! TOML file, then the built-in default. The flag/env merge happens in the
//! binaries (clap's `env` attribute); this module merges the result with
//! the file.
//!
//! File discovery: explicit `--config` path, else `AVBAG_CONFIG`, else
//! `~/.config/avbag/avbag.toml`, else built-in defaults.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Default deep-comparison tolerance for durations (seconds)
const DEFAULT_DURATION_TOLERANCE_SECS: f64 = 0.5;

/// Bootstrap configuration as it appears in the TOML file
#[derive(Debug, Clone, Deserialize, Default)]
pub struct TomlConfig {
    /// Directory holding the JSON Schemas for metadata validation
    #[serde(default)]
    pub schema_dir: Option<PathBuf>,

    /// Concurrent bag workers; unset means CPU count clamped to [2, 8]
    #[serde(default)]
    pub workers: Option<usize>,

    /// Deep-mode duration tolerance in seconds
    #[serde(default = "default_duration_tolerance")]
    pub duration_tolerance_secs: f64,

    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, console only if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_duration_tolerance() -> f64 {
    DEFAULT_DURATION_TOLERANCE_SECS
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Command-line/environment overrides, already merged by clap
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub schema_dir: Option<PathBuf>,
    pub workers: Option<usize>,
    pub log_level: Option<String>,
    pub log_file: Option<PathBuf>,
}

/// Resolved application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub schema_dir: Option<PathBuf>,
    pub workers: Option<usize>,
    pub duration_tolerance_secs: f64,
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration with the documented resolution order.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` when an explicitly named file is missing
    /// or unparseable, or when a value fails validation.
    pub fn load(explicit_path: Option<&Path>, overrides: ConfigOverrides) -> Result<Config> {
        let toml_config = match Self::discover_path(explicit_path)? {
            Some(path) => {
                let content = std::fs::read_to_string(&path).map_err(|e| {
                    Error::Config(format!("Failed to read config file {:?}: {}", path, e))
                })?;
                let parsed: TomlConfig = toml::from_str(&content).map_err(|e| {
                    Error::Config(format!("Failed to parse TOML {:?}: {}", path, e))
                })?;
                info!(path = %path.display(), "Loaded TOML configuration");
                parsed
            }
            None => {
                debug!("No config file found, using built-in defaults");
                TomlConfig::default()
            }
        };

        let config = Config {
            schema_dir: overrides.schema_dir.or(toml_config.schema_dir),
            workers: overrides.workers.or(toml_config.workers),
            duration_tolerance_secs: toml_config.duration_tolerance_secs,
            logging: LoggingConfig {
                level: overrides.log_level.unwrap_or(toml_config.logging.level),
                file: overrides.log_file.or(toml_config.logging.file),
            },
        };
        config.validate()?;
        Ok(config)
    }

    /// Find the config file to read, if any.
    ///
    /// An explicitly requested file (flag or `AVBAG_CONFIG`) must exist;
    /// the conventional location is optional.
    fn discover_path(explicit_path: Option<&Path>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit_path {
            if !path.is_file() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            return Ok(Some(path.to_path_buf()));
        }

        if let Ok(env_path) = std::env::var("AVBAG_CONFIG") {
            let path = PathBuf::from(env_path);
            if !path.is_file() {
                return Err(Error::Config(format!(
                    "AVBAG_CONFIG points at a missing file: {}",
                    path.display()
                )));
            }
            return Ok(Some(path));
        }

        if let Some(config_dir) = dirs::config_dir() {
            let conventional = config_dir.join("avbag").join("avbag.toml");
            if conventional.is_file() {
                return Ok(Some(conventional));
            }
        }

        Ok(None)
    }

    fn validate(&self) -> Result<()> {
        if let Some(workers) = self.workers {
            if workers == 0 {
                return Err(Error::Config("workers must be at least 1".to_string()));
            }
        }
        if !self.duration_tolerance_secs.is_finite() || self.duration_tolerance_secs < 0.0 {
            return Err(Error::Config(format!(
                "duration_tolerance_secs must be a non-negative number, got {}",
                self.duration_tolerance_secs
            )));
        }
        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => {
                return Err(Error::Config(format!(
                    "Unknown log level '{}' (expected trace|debug|info|warn|error)",
                    other
                )))
            }
        }
        if let Some(schema_dir) = &self.schema_dir {
            if !schema_dir.is_dir() {
                return Err(Error::Config(format!(
                    "schema_dir is not a directory: {}",
                    schema_dir.display()
                )));
            }
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            schema_dir: None,
            workers: None,
            duration_tolerance_secs: default_duration_tolerance(),
            logging: LoggingConfig::default(),
        }
    }
}
