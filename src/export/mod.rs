//! Periodic export of the registry to an external collector.
//!
//! The [`Exporter`] runs on a fixed interval and hands each snapshot, encoded
//! in the text exposition format, to a [`MetricsSink`]. A failed delivery is
//! logged and counted; the next cycle simply tries again.

mod exporter;
mod sink;

pub use exporter::Exporter;
pub use sink::{ExportError, HttpPushSink, MetricsSink};
