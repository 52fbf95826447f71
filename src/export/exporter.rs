//! Fixed-interval export loop.

use crate::config::{ExportConfig, SinkKind};
use crate::export::{ExportError, HttpPushSink, MetricsSink};
use crate::metrics::{ServiceMetrics, encode_text};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, error, info, warn};

/// Pushes a snapshot of the registry to a sink every `interval`.
pub struct Exporter {
    metrics: ServiceMetrics,
    sink: Arc<dyn MetricsSink>,
    interval: Duration,
    timeout: Duration,
}

impl Exporter {
    /// Create an exporter. `interval` must be non-zero.
    pub fn new(
        metrics: ServiceMetrics,
        sink: Arc<dyn MetricsSink>,
        interval: Duration,
        timeout: Duration,
    ) -> Self {
        Self {
            metrics,
            sink,
            interval,
            timeout,
        }
    }

    /// Build the exporter described by `config`, or `None` when export is
    /// disabled.
    pub fn from_config(
        config: &ExportConfig,
        metrics: ServiceMetrics,
    ) -> Result<Option<Self>, ExportError> {
        let sink: Arc<dyn MetricsSink> = match config.sink {
            SinkKind::None => return Ok(None),
            SinkKind::Http => {
                let url = config.collector_url.as_deref().ok_or_else(|| {
                    ExportError::Request("collector URL is required for the http sink".to_string())
                })?;
                Arc::new(HttpPushSink::new(url)?)
            }
        };

        Ok(Some(Self::new(metrics, sink, config.interval, config.timeout)))
    }

    /// Export every interval until shutdown.
    ///
    /// The first export happens one interval after start. Ticks missed while a
    /// delivery was in progress are skipped, not replayed.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            sink = self.sink.name(),
            interval = %humantime::format_duration(self.interval),
            timeout = %humantime::format_duration(self.timeout),
            "metrics exporter starting"
        );

        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    tokio::select! {
                        // Outcome is already logged and counted.
                        _ = self.run_once() => {}
                        _ = shutdown.recv() => break,
                    }
                }

                _ = shutdown.recv() => break,
            }
        }

        info!("metrics exporter shutting down");
    }

    /// Run a single export cycle.
    pub async fn run_once(&self) -> Result<(), ExportError> {
        self.metrics.refresh_uptime();
        let payload = encode_text(&self.metrics.registry().snapshot());
        let bytes = payload.len();

        let result = match tokio::time::timeout(self.timeout, self.sink.deliver(payload)).await {
            Ok(result) => result,
            Err(_) => Err(ExportError::Timeout(self.timeout)),
        };

        if let Err(e) = self.metrics.record_export(result.is_ok()) {
            error!(error = %e, "failed to record export metrics");
        }

        match &result {
            Ok(()) => debug!(sink = self.sink.name(), bytes, "metrics exported"),
            Err(e) => warn!(sink = self.sink.name(), error = %e, "metrics export failed"),
        }

        result
    }
}
