//! Point-in-time view of a registry.

use crate::metrics::series::HistogramValue;
use crate::metrics::MetricKind;

/// All families of a registry, in registration order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Snapshot {
    pub families: Vec<FamilySnapshot>,
}

/// One metric family and its series, sorted by label values.
#[derive(Clone, Debug, PartialEq)]
pub struct FamilySnapshot {
    pub name: String,
    pub help: String,
    pub kind: MetricKind,
    pub label_names: Vec<String>,
    pub series: Vec<SeriesSnapshot>,
}

/// One concrete series.
#[derive(Clone, Debug, PartialEq)]
pub struct SeriesSnapshot {
    /// Values in the order of the family's label names.
    pub label_values: Vec<String>,
    pub value: SampleValue,
}

/// The value read from a series.
#[derive(Clone, Debug, PartialEq)]
pub enum SampleValue {
    Counter(u64),
    Gauge(f64),
    Histogram(HistogramValue),
}

impl Snapshot {
    /// Look up a family by name.
    pub fn family(&self, name: &str) -> Option<&FamilySnapshot> {
        self.families.iter().find(|f| f.name == name)
    }

    /// Total number of series across all families.
    pub fn series_count(&self) -> usize {
        self.families.iter().map(|f| f.series.len()).sum()
    }
}

impl FamilySnapshot {
    /// Find the series with exactly these label values.
    pub fn get(&self, label_values: &[&str]) -> Option<&SampleValue> {
        self.series
            .iter()
            .find(|s| s.label_values.iter().map(String::as_str).eq(label_values.iter().copied()))
            .map(|s| &s.value)
    }
}

impl SampleValue {
    /// Counter value, if this is a counter.
    pub fn as_counter(&self) -> Option<u64> {
        match self {
            SampleValue::Counter(v) => Some(*v),
            _ => None,
        }
    }

    /// Gauge value, if this is a gauge.
    pub fn as_gauge(&self) -> Option<f64> {
        match self {
            SampleValue::Gauge(v) => Some(*v),
            _ => None,
        }
    }

    /// Histogram value, if this is a histogram.
    pub fn as_histogram(&self) -> Option<&HistogramValue> {
        match self {
            SampleValue::Histogram(v) => Some(v),
            _ => None,
        }
    }
}
