//! Configuration loading.
//!
//! Values come from three layers, later ones winning: built-in defaults, an
//! optional YAML file, and `PROMSVC_*` environment variables.

use crate::config::{Config, validate_config};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Listen address override.
pub const ENV_LISTEN: &str = "PROMSVC_LISTEN";
/// Collector URL override.
pub const ENV_COLLECTOR_URL: &str = "PROMSVC_COLLECTOR_URL";
/// Export interval override (humantime, e.g. `15s`).
pub const ENV_EXPORT_INTERVAL: &str = "PROMSVC_EXPORT_INTERVAL";
/// Export timeout override (humantime, e.g. `5s`).
pub const ENV_EXPORT_TIMEOUT: &str = "PROMSVC_EXPORT_TIMEOUT";
/// Log level override.
pub const ENV_LOG_LEVEL: &str = "PROMSVC_LOG_LEVEL";

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("invalid value for {var}: {reason}")]
    EnvError { var: &'static str, reason: String },

    #[error("configuration validation failed: {0}")]
    ValidationError(String),
}

/// Load configuration from a YAML file, then apply environment overrides.
///
/// # Arguments
///
/// * `path` - Path to the configuration file
///
/// # Returns
///
/// The parsed and validated configuration, or an error.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path.as_ref())?;
    let config: Config = serde_yaml::from_str(&contents)?;
    finish(config, |var| std::env::var(var).ok())
}

/// Build configuration from defaults and environment overrides only.
pub fn load_config_from_env() -> Result<Config, ConfigError> {
    finish(Config::default(), |var| std::env::var(var).ok())
}

fn finish<F>(mut config: Config, lookup: F) -> Result<Config, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    apply_env_overrides(&mut config, lookup)?;
    validate_config(&config).map_err(ConfigError::ValidationError)?;
    Ok(config)
}

/// Apply `PROMSVC_*` overrides read through `lookup`.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(listen) = lookup(ENV_LISTEN) {
        config.server.listen = listen.parse().map_err(|e| ConfigError::EnvError {
            var: ENV_LISTEN,
            reason: format!("{}", e),
        })?;
    }

    if let Some(url) = lookup(ENV_COLLECTOR_URL) {
        config.export.collector_url = Some(url);
    }

    if let Some(interval) = lookup(ENV_EXPORT_INTERVAL) {
        config.export.interval = parse_duration(ENV_EXPORT_INTERVAL, &interval)?;
    }

    if let Some(timeout) = lookup(ENV_EXPORT_TIMEOUT) {
        config.export.timeout = parse_duration(ENV_EXPORT_TIMEOUT, &timeout)?;
    }

    if let Some(level) = lookup(ENV_LOG_LEVEL) {
        config.global.log_level = level;
    }

    Ok(())
}

fn parse_duration(var: &'static str, value: &str) -> Result<Duration, ConfigError> {
    humantime::parse_duration(value).map_err(|e| ConfigError::EnvError {
        var,
        reason: e.to_string(),
    })
}
