//! Metrics registry, series and exposition.

mod buckets;
mod encode;
mod registry;
mod series;
mod service;
mod snapshot;

pub use buckets::{DEFAULT_BUCKETS, exponential_buckets, linear_buckets};
pub use encode::{TEXT_CONTENT_TYPE, encode_text};
pub use registry::{
    CounterFamily, Descriptor, Family, GaugeFamily, HistogramFamily, Metric, MetricKind,
    MetricsError, Registry,
};
pub use series::{Counter, Gauge, Histogram, HistogramValue};
pub use service::{RenderOutcome, ServiceMetrics, status_class};
pub use snapshot::{FamilySnapshot, SampleValue, SeriesSnapshot, Snapshot};
