//! Configuration validation.

use crate::config::{Config, SinkKind};
use crate::server::BUILTIN_ROUTES;

/// Validate the configuration.
///
/// Checks for:
/// - A known log level
/// - A metrics path that starts with `/` and does not shadow a built-in route
/// - An ordered render delay range and a failure rate within `[0, 1]`
/// - Non-zero export interval and timeout, with the timeout not exceeding
///   the interval
/// - An `http://` collector URL when the http sink is selected
///
/// # Returns
///
/// `Ok(())` if valid, or every problem found joined by `; `.
pub fn validate_config(config: &Config) -> Result<(), String> {
    let mut errors = Vec::new();

    // Validate log level
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_levels.contains(&config.global.log_level.to_lowercase().as_str()) {
        errors.push(format!(
            "invalid log level '{}', must be one of: {}",
            config.global.log_level,
            valid_levels.join(", ")
        ));
    }

    // Server
    let server = &config.server;
    if !server.metrics_path.starts_with('/') {
        errors.push(format!(
            "metrics path '{}' must start with '/'",
            server.metrics_path
        ));
    } else if server.metrics_path == "/" || BUILTIN_ROUTES.contains(&server.metrics_path.as_str())
    {
        errors.push(format!(
            "metrics path '{}' conflicts with a built-in route",
            server.metrics_path
        ));
    }

    if server.render_delay.min > server.render_delay.max {
        errors.push(format!(
            "render delay min ({}) exceeds max ({})",
            humantime::format_duration(server.render_delay.min),
            humantime::format_duration(server.render_delay.max)
        ));
    }

    if !(0.0..=1.0).contains(&server.render_failure_rate) {
        errors.push(format!(
            "render failure rate {} must be between 0 and 1",
            server.render_failure_rate
        ));
    }

    // Export
    let export = &config.export;
    if export.sink == SinkKind::Http {
        if export.interval.is_zero() {
            errors.push("export interval must be greater than zero".to_string());
        }
        if export.timeout.is_zero() {
            errors.push("export timeout must be greater than zero".to_string());
        }
        if export.timeout > export.interval {
            errors.push(format!(
                "export timeout ({}) must not exceed the interval ({})",
                humantime::format_duration(export.timeout),
                humantime::format_duration(export.interval)
            ));
        }

        match export.collector_url.as_deref() {
            None | Some("") => {
                errors.push("collector URL is required for the http sink".to_string());
            }
            Some(url) => match url.parse::<hyper::Uri>() {
                Ok(uri) if uri.scheme_str() == Some("http") && uri.host().is_some() => {}
                Ok(_) => errors.push(format!(
                    "collector URL '{}' must be an absolute http:// URL",
                    url
                )),
                Err(e) => errors.push(format!("invalid collector URL '{}': {}", url, e)),
            },
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_valid_default_config() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = Config::default();
        config.global.log_level = "loud".to_string();
        let err = validate_config(&config).unwrap_err();
        assert!(err.contains("invalid log level 'loud'"));
    }

    #[test]
    fn test_metrics_path_rules() {
        let mut config = Config::default();
        config.server.metrics_path = "metrics".to_string();
        assert!(validate_config(&config).unwrap_err().contains("must start with '/'"));

        config.server.metrics_path = "/health".to_string();
        assert!(validate_config(&config).unwrap_err().contains("conflicts"));

        config.server.metrics_path = "/internal/metrics".to_string();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_render_settings() {
        let mut config = Config::default();
        config.server.render_delay.min = Duration::from_secs(3);
        config.server.render_failure_rate = 1.5;
        let err = validate_config(&config).unwrap_err();
        assert!(err.contains("render delay min"));
        assert!(err.contains("render failure rate"));
    }

    #[test]
    fn test_zero_interval_and_timeout() {
        let mut config = Config::default();
        config.export.interval = Duration::ZERO;
        config.export.timeout = Duration::ZERO;
        let err = validate_config(&config).unwrap_err();
        assert!(err.contains("interval must be greater than zero"));
        assert!(err.contains("timeout must be greater than zero"));
    }

    #[test]
    fn test_timeout_exceeds_interval() {
        let mut config = Config::default();
        config.export.interval = Duration::from_secs(1);
        config.export.timeout = Duration::from_secs(2);
        assert!(validate_config(&config).unwrap_err().contains("must not exceed"));
    }

    #[test]
    fn test_collector_url() {
        let mut config = Config::default();
        config.export.collector_url = None;
        assert!(validate_config(&config).unwrap_err().contains("required"));

        config.export.collector_url = Some("https://collector/push".to_string());
        assert!(validate_config(&config).unwrap_err().contains("http://"));

        config.export.collector_url = Some("/relative".to_string());
        assert!(validate_config(&config).unwrap_err().contains("http://"));

        config.export.collector_url = Some("http://collector:9091/metrics/job/x".to_string());
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_none_sink_skips_export_checks() {
        let mut config = Config::default();
        config.export.sink = SinkKind::None;
        config.export.collector_url = None;
        config.export.interval = Duration::ZERO;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_all_errors_reported() {
        let mut config = Config::default();
        config.global.log_level = "nope".to_string();
        config.export.collector_url = None;
        let err = validate_config(&config).unwrap_err();
        assert_eq!(err.split("; ").count(), 2);
    }
}
