//! Shared application state.

use crate::config::Config;
use crate::metrics::{MetricsError, Registry, ServiceMetrics};
use crate::util::ShutdownSignal;
use std::sync::Arc;

/// Shared state accessible from all tasks.
#[derive(Clone)]
pub struct AppState {
    /// Effective configuration.
    config: Arc<Config>,

    /// Service metrics, registered on the shared registry.
    metrics: ServiceMetrics,

    /// Shutdown signal.
    shutdown: ShutdownSignal,
}

impl AppState {
    /// Create new application state with a fresh registry.
    pub fn new(config: Config) -> Result<Self, MetricsError> {
        let metrics = ServiceMetrics::new(Arc::new(Registry::new()))?;
        Ok(Self::with_metrics(config, metrics))
    }

    /// Create application state around existing metrics.
    pub fn with_metrics(config: Config, metrics: ServiceMetrics) -> Self {
        Self {
            config: Arc::new(config),
            metrics,
            shutdown: ShutdownSignal::new(),
        }
    }

    /// Get the configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get the service metrics.
    pub fn metrics(&self) -> &ServiceMetrics {
        &self.metrics
    }

    /// Get the shutdown signal.
    pub fn shutdown(&self) -> &ShutdownSignal {
        &self.shutdown
    }

    /// Trigger shutdown.
    pub fn trigger_shutdown(&self) {
        self.shutdown.shutdown();
    }
}
