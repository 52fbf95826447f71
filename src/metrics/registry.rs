//! Metrics registry.
//!
//! A [`Registry`] owns every metric family of a process. It is constructed
//! explicitly and shared through an `Arc`; there is no global instance, so
//! tests can build as many isolated registries as they need.
//!
//! Families are declared once with a name, a kind and a fixed list of label
//! names. Concrete series are created lazily on first use of a label-value
//! combination and live in a concurrent map, so updates on unrelated series
//! never contend on a registry-wide lock.

use crate::metrics::series::{Counter, Gauge, Histogram};
use crate::metrics::snapshot::{FamilySnapshot, SampleValue, SeriesSnapshot, Snapshot};
use crate::metrics::{DEFAULT_BUCKETS, encode_text};
use dashmap::DashMap;
use parking_lot::RwLock;
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised while declaring or resolving metrics.
///
/// All of these indicate a wiring bug in the instrumented code rather than a
/// runtime condition.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum MetricsError {
    #[error(
        "metric '{name}' is already registered as {existing} with labels {existing_labels:?}"
    )]
    DuplicateRegistration {
        name: String,
        existing: MetricKind,
        existing_labels: Vec<String>,
    },

    #[error("metric '{name}' expects labels {expected:?}, got {got:?}")]
    LabelArity {
        name: String,
        expected: Vec<String>,
        got: Vec<String>,
    },

    #[error("invalid metric or label name: '{0}'")]
    InvalidName(String),

    #[error("invalid buckets for histogram '{name}': {reason}")]
    InvalidBuckets { name: String, reason: String },
}

/// Kind of a metric family.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MetricKind {
    Counter,
    Gauge,
    Histogram,
}

impl MetricKind {
    /// Name used in `# TYPE` lines.
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
            MetricKind::Histogram => "histogram",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static description of a family.
#[derive(Clone, Debug)]
pub struct Descriptor {
    name: String,
    help: String,
    kind: MetricKind,
    label_names: Vec<String>,
    buckets: Option<Arc<[f64]>>,
}

impl Descriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn help(&self) -> &str {
        &self.help
    }

    pub fn kind(&self) -> MetricKind {
        self.kind
    }

    pub fn label_names(&self) -> &[String] {
        &self.label_names
    }

    /// Whether `other` declares the same family shape.
    fn same_shape(&self, other: &Descriptor) -> bool {
        self.kind == other.kind
            && self.label_names == other.label_names
            && self.buckets == other.buckets
    }
}

/// A series type that can live inside a [`Family`].
pub trait Metric: Clone + Send + Sync + 'static {
    const KIND: MetricKind;

    /// Build a fresh series for a family.
    fn new_series(desc: &Descriptor) -> Self;

    /// Read the current value.
    fn sample(&self) -> SampleValue;
}

impl Metric for Counter {
    const KIND: MetricKind = MetricKind::Counter;

    fn new_series(_desc: &Descriptor) -> Self {
        Counter::default()
    }

    fn sample(&self) -> SampleValue {
        SampleValue::Counter(self.get())
    }
}

impl Metric for Gauge {
    const KIND: MetricKind = MetricKind::Gauge;

    fn new_series(_desc: &Descriptor) -> Self {
        Gauge::default()
    }

    fn sample(&self) -> SampleValue {
        SampleValue::Gauge(self.get())
    }
}

impl Metric for Histogram {
    const KIND: MetricKind = MetricKind::Histogram;

    fn new_series(desc: &Descriptor) -> Self {
        let bounds = desc
            .buckets
            .clone()
            .unwrap_or_else(|| Arc::from(&DEFAULT_BUCKETS[..]));
        Histogram::new(bounds)
    }

    fn sample(&self) -> SampleValue {
        SampleValue::Histogram(self.get())
    }
}

/// Handle to a registered family of series.
///
/// Cloning is cheap; all clones resolve to the same series.
pub struct Family<M> {
    inner: Arc<FamilyInner<M>>,
}

/// Counter family handle.
pub type CounterFamily = Family<Counter>;
/// Gauge family handle.
pub type GaugeFamily = Family<Gauge>;
/// Histogram family handle.
pub type HistogramFamily = Family<Histogram>;

struct FamilyInner<M> {
    desc: Descriptor,
    series: DashMap<Vec<String>, M>,
}

impl<M> fmt::Debug for Family<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Family")
            .field("desc", &self.inner.desc)
            .field("series", &self.inner.series.len())
            .finish()
    }
}

impl<M> Clone for Family<M> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<M: Metric> Family<M> {
    /// The family's descriptor.
    pub fn descriptor(&self) -> &Descriptor {
        &self.inner.desc
    }

    /// Resolve the series for `label_values`, creating it on first use.
    ///
    /// Values are positional and must match the declared label names in
    /// count and order.
    pub fn series(&self, label_values: &[&str]) -> Result<M, MetricsError> {
        let desc = &self.inner.desc;
        if label_values.len() != desc.label_names.len() {
            return Err(MetricsError::LabelArity {
                name: desc.name.clone(),
                expected: desc.label_names.clone(),
                got: label_values.iter().map(|v| v.to_string()).collect(),
            });
        }

        let key: Vec<String> = label_values.iter().map(|v| v.to_string()).collect();
        if let Some(existing) = self.inner.series.get(&key) {
            return Ok(existing.value().clone());
        }

        Ok(self
            .inner
            .series
            .entry(key)
            .or_insert_with(|| M::new_series(desc))
            .value()
            .clone())
    }

    /// Resolve a series from `(label name, value)` pairs given in any order.
    pub fn series_by_labels(&self, labels: &[(&str, &str)]) -> Result<M, MetricsError> {
        let desc = &self.inner.desc;
        let arity_error = || MetricsError::LabelArity {
            name: desc.name.clone(),
            expected: desc.label_names.clone(),
            got: labels.iter().map(|(k, _)| k.to_string()).collect(),
        };

        if labels.len() != desc.label_names.len() {
            return Err(arity_error());
        }

        let values = desc
            .label_names
            .iter()
            .map(|name| {
                labels
                    .iter()
                    .find(|(k, _)| *k == name.as_str())
                    .map(|(_, v)| *v)
                    .ok_or_else(arity_error)
            })
            .collect::<Result<Vec<&str>, _>>()?;

        self.series(&values)
    }

    /// The series of a family declared without labels.
    pub fn unlabelled(&self) -> Result<M, MetricsError> {
        self.series(&[])
    }
}

/// Type-erased view of a family used for snapshots.
trait Collect: Send + Sync {
    fn descriptor(&self) -> &Descriptor;
    fn collect(&self) -> Vec<SeriesSnapshot>;
}

impl<M: Metric> Collect for FamilyInner<M> {
    fn descriptor(&self) -> &Descriptor {
        &self.desc
    }

    fn collect(&self) -> Vec<SeriesSnapshot> {
        let mut series: Vec<SeriesSnapshot> = self
            .series
            .iter()
            .map(|entry| SeriesSnapshot {
                label_values: entry.key().clone(),
                value: entry.value().sample(),
            })
            .collect();
        series.sort_by(|a, b| a.label_values.cmp(&b.label_values));
        series
    }
}

struct Registered {
    collector: Arc<dyn Collect>,
    handle: Arc<dyn Any + Send + Sync>,
}

/// Holder of all metric families of a process.
#[derive(Default)]
pub struct Registry {
    families: RwLock<Vec<Registered>>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a counter family.
    pub fn register_counter(
        &self,
        name: &str,
        help: &str,
        label_names: &[&str],
    ) -> Result<CounterFamily, MetricsError> {
        self.register(name, help, label_names, None)
    }

    /// Declare a gauge family.
    pub fn register_gauge(
        &self,
        name: &str,
        help: &str,
        label_names: &[&str],
    ) -> Result<GaugeFamily, MetricsError> {
        self.register(name, help, label_names, None)
    }

    /// Declare a histogram family with the given bucket upper bounds.
    pub fn register_histogram(
        &self,
        name: &str,
        help: &str,
        label_names: &[&str],
        buckets: &[f64],
    ) -> Result<HistogramFamily, MetricsError> {
        self.register(name, help, label_names, Some(Arc::from(buckets)))
    }

    /// Declare a family of kind `M::KIND`.
    ///
    /// Re-declaring a name with an identical shape returns the existing
    /// family; any difference in kind, label names or buckets is an error.
    /// A name that collides with the `_bucket`, `_sum` or `_count` series of
    /// another family is rejected as a duplicate too.
    pub fn register<M: Metric>(
        &self,
        name: &str,
        help: &str,
        label_names: &[&str],
        buckets: Option<Arc<[f64]>>,
    ) -> Result<Family<M>, MetricsError> {
        validate_metric_name(name)?;
        validate_label_names(M::KIND, label_names)?;

        let buckets = match M::KIND {
            MetricKind::Histogram => {
                let buckets = buckets.unwrap_or_else(|| Arc::from(&DEFAULT_BUCKETS[..]));
                validate_buckets(name, &buckets)?;
                Some(buckets)
            }
            _ => None,
        };

        let desc = Descriptor {
            name: name.to_string(),
            help: help.to_string(),
            kind: M::KIND,
            label_names: label_names.iter().map(|l| l.to_string()).collect(),
            buckets,
        };

        let mut families = self.families.write();

        if let Some(existing) = families
            .iter()
            .find(|r| r.collector.descriptor().name == desc.name)
        {
            let existing_desc = existing.collector.descriptor();
            let duplicate = || MetricsError::DuplicateRegistration {
                name: desc.name.clone(),
                existing: existing_desc.kind,
                existing_labels: existing_desc.label_names.clone(),
            };

            if !existing_desc.same_shape(&desc) {
                return Err(duplicate());
            }

            let inner = Arc::clone(&existing.handle)
                .downcast::<FamilyInner<M>>()
                .map_err(|_| duplicate())?;
            return Ok(Family { inner });
        }

        if let Some(clash) = families
            .iter()
            .map(|r| r.collector.descriptor())
            .find(|existing| names_collide(existing, &desc))
        {
            return Err(MetricsError::DuplicateRegistration {
                name: desc.name.clone(),
                existing: clash.kind,
                existing_labels: clash.label_names.clone(),
            });
        }

        let inner = Arc::new(FamilyInner::<M> {
            desc,
            series: DashMap::new(),
        });

        // A family without labels has exactly one series; expose it from the start.
        if inner.desc.label_names.is_empty() {
            inner.series.insert(Vec::new(), M::new_series(&inner.desc));
        }

        families.push(Registered {
            collector: inner.clone(),
            handle: inner.clone(),
        });

        Ok(Family { inner })
    }

    /// Number of registered families.
    pub fn len(&self) -> usize {
        self.families.read().len()
    }

    /// Whether no family has been registered.
    pub fn is_empty(&self) -> bool {
        self.families.read().is_empty()
    }

    /// Read every series.
    ///
    /// Each series is read atomically, but the snapshot as a whole is not a
    /// transaction: updates racing with it may or may not be included.
    pub fn snapshot(&self) -> Snapshot {
        let families = self.families.read();
        Snapshot {
            families: families
                .iter()
                .map(|r| {
                    let desc = r.collector.descriptor();
                    FamilySnapshot {
                        name: desc.name.clone(),
                        help: desc.help.clone(),
                        kind: desc.kind,
                        label_names: desc.label_names.clone(),
                        series: r.collector.collect(),
                    }
                })
                .collect(),
        }
    }

    /// Snapshot and render in the text exposition format.
    pub fn encode(&self) -> String {
        encode_text(&self.snapshot())
    }
}

/// Sample names a family writes in the exposition.
fn exposed_names(desc: &Descriptor) -> Vec<String> {
    match desc.kind {
        MetricKind::Histogram => ["_bucket", "_sum", "_count"]
            .iter()
            .map(|suffix| format!("{}{}", desc.name, suffix))
            .chain(std::iter::once(desc.name.clone()))
            .collect(),
        _ => vec![desc.name.clone()],
    }
}

fn names_collide(a: &Descriptor, b: &Descriptor) -> bool {
    let b_names = exposed_names(b);
    exposed_names(a).iter().any(|n| b_names.contains(n))
}

fn validate_metric_name(name: &str) -> Result<(), MetricsError> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == ':' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
        }
        _ => false,
    };

    if valid {
        Ok(())
    } else {
        Err(MetricsError::InvalidName(name.to_string()))
    }
}

fn validate_label_names(kind: MetricKind, label_names: &[&str]) -> Result<(), MetricsError> {
    for (i, label) in label_names.iter().enumerate() {
        let mut chars = label.chars();
        let valid = match chars.next() {
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {
                chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
            }
            _ => false,
        };

        let reserved = label.starts_with("__") || (kind == MetricKind::Histogram && *label == "le");
        let repeated = label_names[..i].contains(label);

        if !valid || reserved || repeated {
            return Err(MetricsError::InvalidName(label.to_string()));
        }
    }
    Ok(())
}

fn validate_buckets(name: &str, buckets: &[f64]) -> Result<(), MetricsError> {
    if let Some(b) = buckets.iter().find(|b| !b.is_finite()) {
        return Err(MetricsError::InvalidBuckets {
            name: name.to_string(),
            reason: format!("bound {} is not finite", b),
        });
    }
    if buckets.windows(2).any(|w| w[0] >= w[1]) {
        return Err(MetricsError::InvalidBuckets {
            name: name.to_string(),
            reason: "bounds must be strictly increasing".to_string(),
        });
    }
    Ok(())
}
