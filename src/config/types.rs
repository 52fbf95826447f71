//! Configuration data types.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Global settings
    #[serde(default)]
    pub global: GlobalConfig,

    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Periodic export settings
    #[serde(default)]
    pub export: ExportConfig,
}

/// Global configuration settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GlobalConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log format: json or pretty
    #[serde(default)]
    pub log_format: LogFormat,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::Json,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Address and port to listen on
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,

    /// Path of the exposition endpoint
    #[serde(default = "default_metrics_path")]
    pub metrics_path: String,

    /// How long `/simulate-load` works
    #[serde(default = "default_load_delay", with = "humantime_serde")]
    pub load_delay: Duration,

    /// Bounds of the random `/simulate-render` duration
    #[serde(default)]
    pub render_delay: DelayRange,

    /// Probability that a simulated render job fails
    #[serde(default = "default_render_failure_rate")]
    pub render_failure_rate: f64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            metrics_path: default_metrics_path(),
            load_delay: default_load_delay(),
            render_delay: DelayRange::default(),
            render_failure_rate: default_render_failure_rate(),
        }
    }
}

/// Inclusive range of durations.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct DelayRange {
    #[serde(with = "humantime_serde")]
    pub min: Duration,

    #[serde(with = "humantime_serde")]
    pub max: Duration,
}

impl Default for DelayRange {
    fn default() -> Self {
        Self {
            min: Duration::from_millis(500),
            max: Duration::from_secs(2),
        }
    }
}

/// Where exported snapshots go.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    /// POST the exposition text to `collector_url`
    #[default]
    Http,
    /// Do not run the exporter
    None,
}

/// Periodic exporter configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExportConfig {
    /// Sink type: http or none
    #[serde(default)]
    pub sink: SinkKind,

    /// Collector push endpoint (required for the http sink)
    #[serde(default = "default_collector_url")]
    pub collector_url: Option<String>,

    /// Time between export cycles
    #[serde(default = "default_export_interval", with = "humantime_serde")]
    pub interval: Duration,

    /// Bound on a single delivery attempt
    #[serde(default = "default_export_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            sink: SinkKind::Http,
            collector_url: default_collector_url(),
            interval: default_export_interval(),
            timeout: default_export_timeout(),
        }
    }
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_listen() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8000))
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

fn default_load_delay() -> Duration {
    Duration::from_millis(100)
}

fn default_render_failure_rate() -> f64 {
    0.1
}

fn default_collector_url() -> Option<String> {
    Some("http://127.0.0.1:9091/metrics/job/promsvc".to_string())
}

fn default_export_interval() -> Duration {
    Duration::from_secs(15)
}

fn default_export_timeout() -> Duration {
    Duration::from_secs(5)
}

/// Custom serde module for humantime durations.
pub(crate) mod humantime_serde {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let s = humantime::format_duration(*duration).to_string();
        serializer.serialize_str(&s)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}
