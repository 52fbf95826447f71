//! Metrics reported by the service itself.
//!
//! Provides request counts, latency, in-flight requests, render jobs, uptime
//! and export outcomes, all registered against an injected [`Registry`].

use crate::metrics::{
    CounterFamily, DEFAULT_BUCKETS, Gauge, HistogramFamily, MetricsError, Registry,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Outcome of a simulated render job.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderOutcome {
    Success,
    Failed,
}

impl RenderOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RenderOutcome::Success => "success",
            RenderOutcome::Failed => "failed",
        }
    }
}

/// Handles to every metric the service records.
#[derive(Clone)]
pub struct ServiceMetrics {
    inner: Arc<ServiceMetricsInner>,
}

struct ServiceMetricsInner {
    registry: Arc<Registry>,
    /// Requests by method, route template and status class.
    requests_total: CounterFamily,
    /// Request duration by method and route template (seconds).
    request_duration_seconds: HistogramFamily,
    /// Requests currently being handled.
    in_flight: Gauge,
    /// Render jobs by outcome.
    render_jobs_total: CounterFamily,
    /// Seconds since the service started.
    uptime_seconds: Gauge,
    /// Export cycles by result.
    exports_total: CounterFamily,
    started: Instant,
}

impl ServiceMetrics {
    /// Register the service metrics on `registry`.
    pub fn new(registry: Arc<Registry>) -> Result<Self, MetricsError> {
        let requests_total = registry.register_counter(
            "http_requests_total",
            "Total HTTP requests",
            &["method", "route", "status"],
        )?;
        let request_duration_seconds = registry.register_histogram(
            "http_request_duration_seconds",
            "HTTP request duration in seconds",
            &["method", "route"],
            &DEFAULT_BUCKETS,
        )?;
        let in_flight = registry
            .register_gauge(
                "http_requests_in_flight",
                "Number of HTTP requests currently being handled",
                &[],
            )?
            .unlabelled()?;
        let render_jobs_total = registry.register_counter(
            "render_jobs_total",
            "Total render jobs processed",
            &["status"],
        )?;
        let uptime_seconds = registry
            .register_gauge("service_uptime_seconds", "Service uptime in seconds", &[])?
            .unlabelled()?;
        let exports_total = registry.register_counter(
            "metrics_exports_total",
            "Metrics export cycles by result",
            &["result"],
        )?;

        Ok(Self {
            inner: Arc::new(ServiceMetricsInner {
                registry,
                requests_total,
                request_duration_seconds,
                in_flight,
                render_jobs_total,
                uptime_seconds,
                exports_total,
                started: Instant::now(),
            }),
        })
    }

    /// The registry these metrics live in.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.inner.registry
    }

    /// Time since the metrics were created.
    pub fn uptime(&self) -> Duration {
        self.inner.started.elapsed()
    }

    /// Record a completed request.
    pub fn record_request(
        &self,
        method: &str,
        route: &str,
        status: u16,
        duration: Duration,
    ) -> Result<(), MetricsError> {
        self.inner
            .requests_total
            .series(&[method, route, status_class(status)])?
            .inc();
        self.inner
            .request_duration_seconds
            .series(&[method, route])?
            .observe(duration.as_secs_f64());
        Ok(())
    }

    /// In-flight requests gauge.
    pub fn in_flight(&self) -> &Gauge {
        &self.inner.in_flight
    }

    /// Count a finished render job.
    pub fn record_render_job(&self, outcome: RenderOutcome) -> Result<(), MetricsError> {
        self.inner
            .render_jobs_total
            .series(&[outcome.as_str()])?
            .inc();
        Ok(())
    }

    /// Count an export cycle.
    pub fn record_export(&self, success: bool) -> Result<(), MetricsError> {
        let result = if success { "success" } else { "failure" };
        self.inner.exports_total.series(&[result])?.inc();
        Ok(())
    }

    /// Update the uptime gauge to now.
    pub fn refresh_uptime(&self) {
        self.inner.uptime_seconds.set(self.uptime().as_secs_f64());
    }

    /// Refresh uptime and render the registry in text exposition format.
    pub fn encode(&self) -> String {
        self.refresh_uptime();
        self.inner.registry.encode()
    }
}

/// Status-code class label: `2xx`, `4xx`, ...
pub fn status_class(status: u16) -> &'static str {
    match status {
        100..=199 => "1xx",
        200..=299 => "2xx",
        300..=399 => "3xx",
        400..=499 => "4xx",
        500..=599 => "5xx",
        _ => "unknown",
    }
}
