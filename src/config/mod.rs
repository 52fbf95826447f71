//! Configuration loading, parsing, and validation.

mod loader;
mod types;
mod validation;

pub use loader::{
    ConfigError, ENV_COLLECTOR_URL, ENV_EXPORT_INTERVAL, ENV_EXPORT_TIMEOUT, ENV_LISTEN,
    ENV_LOG_LEVEL, apply_env_overrides, load_config, load_config_from_env,
};
pub use types::*;
pub use validation::validate_config;
