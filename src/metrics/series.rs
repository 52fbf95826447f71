//! Concrete metric series.
//!
//! Each series is a cheap, cloneable handle around atomics. Cloning a handle
//! shares the underlying value, so the registry and the instrumented code
//! always observe the same instance for a given identity.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonically non-decreasing counter.
#[derive(Clone, Debug, Default)]
pub struct Counter {
    value: Arc<AtomicU64>,
}

impl Counter {
    /// Increment by one.
    pub fn inc(&self) {
        self.inc_by(1);
    }

    /// Increment by `delta`.
    pub fn inc_by(&self, delta: u64) {
        self.value.fetch_add(delta, Ordering::Relaxed);
    }

    /// Current value.
    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// A value that may go up and down.
///
/// Stored as the bit pattern of an `f64` so fractional values such as uptime
/// seconds can be represented.
#[derive(Clone, Debug)]
pub struct Gauge {
    bits: Arc<AtomicU64>,
}

impl Default for Gauge {
    fn default() -> Self {
        Self {
            bits: Arc::new(AtomicU64::new(0f64.to_bits())),
        }
    }
}

impl Gauge {
    /// Increment by one.
    pub fn inc(&self) {
        self.add(1.0);
    }

    /// Decrement by one.
    pub fn dec(&self) {
        self.add(-1.0);
    }

    /// Add a signed delta.
    pub fn add(&self, delta: f64) {
        atomic_add_f64(&self.bits, delta);
    }

    /// Overwrite the value.
    pub fn set(&self, value: f64) {
        self.bits.store(value.to_bits(), Ordering::Relaxed);
    }

    /// Current value.
    pub fn get(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Relaxed))
    }
}

/// Distribution of observed values over fixed buckets.
#[derive(Clone, Debug)]
pub struct Histogram {
    inner: Arc<HistogramCore>,
}

#[derive(Debug)]
struct HistogramCore {
    /// Upper bounds, strictly increasing. `+Inf` is implicit.
    bounds: Arc<[f64]>,
    /// Cumulative count per bound.
    buckets: Box<[AtomicU64]>,
    /// Total observations (the `+Inf` bucket).
    count: AtomicU64,
    /// Running sum as `f64` bits.
    sum: AtomicU64,
}

/// Point-in-time read of a histogram.
#[derive(Clone, Debug, PartialEq)]
pub struct HistogramValue {
    /// `(upper bound, cumulative count)` pairs, excluding `+Inf`.
    pub buckets: Vec<(f64, u64)>,
    pub count: u64,
    pub sum: f64,
}

impl Histogram {
    /// Create a histogram over already-validated bounds.
    pub(crate) fn new(bounds: Arc<[f64]>) -> Self {
        let buckets = bounds.iter().map(|_| AtomicU64::new(0)).collect();
        Self {
            inner: Arc::new(HistogramCore {
                bounds,
                buckets,
                count: AtomicU64::new(0),
                sum: AtomicU64::new(0f64.to_bits()),
            }),
        }
    }

    /// Record one observation.
    ///
    /// Every bucket whose upper bound is `>= value` is incremented.
    /// Non-finite values are dropped so they cannot poison the sum.
    pub fn observe(&self, value: f64) {
        if !value.is_finite() {
            return;
        }
        let core = &self.inner;
        for (bound, bucket) in core.bounds.iter().zip(core.buckets.iter()) {
            if value <= *bound {
                bucket.fetch_add(1, Ordering::Relaxed);
            }
        }
        core.count.fetch_add(1, Ordering::Relaxed);
        atomic_add_f64(&core.sum, value);
    }

    /// Bucket upper bounds.
    pub fn bounds(&self) -> &[f64] {
        &self.inner.bounds
    }

    /// Read the current bucket counts, count and sum.
    ///
    /// Fields are loaded one at a time; a concurrent `observe` may be
    /// partially visible.
    pub fn get(&self) -> HistogramValue {
        let core = &self.inner;
        let buckets = core
            .bounds
            .iter()
            .zip(core.buckets.iter())
            .map(|(bound, count)| (*bound, count.load(Ordering::Relaxed)))
            .collect();
        HistogramValue {
            buckets,
            count: core.count.load(Ordering::Relaxed),
            sum: f64::from_bits(core.sum.load(Ordering::Relaxed)),
        }
    }
}

fn atomic_add_f64(cell: &AtomicU64, delta: f64) {
    let mut current = cell.load(Ordering::Relaxed);
    loop {
        let next = (f64::from_bits(current) + delta).to_bits();
        match cell.compare_exchange_weak(current, next, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => return,
            Err(actual) => current = actual,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_counter_sums_deltas() {
        let counter = Counter::default();
        let deltas = [0u64, 1, 5, 42, 7, 0, 1000];
        for d in deltas {
            counter.inc_by(d);
        }
        counter.inc();
        assert_eq!(counter.get(), deltas.iter().sum::<u64>() + 1);
    }

    #[test]
    fn test_counter_clone_shares_value() {
        let a = Counter::default();
        let b = a.clone();
        a.inc();
        b.inc_by(2);
        assert_eq!(a.get(), 3);
    }

    #[test]
    fn test_gauge_up_and_down() {
        let gauge = Gauge::default();
        gauge.inc();
        gauge.inc();
        gauge.dec();
        assert_eq!(gauge.get(), 1.0);

        gauge.add(-3.5);
        assert_eq!(gauge.get(), -2.5);

        gauge.set(12.25);
        assert_eq!(gauge.get(), 12.25);
    }

    #[test]
    fn test_histogram_cumulative_buckets() {
        let hist = Histogram::new(Arc::from(vec![0.1, 0.5, 1.0]));
        hist.observe(0.05);
        hist.observe(0.5);
        hist.observe(0.7);
        hist.observe(3.0);

        let value = hist.get();
        assert_eq!(value.buckets, vec![(0.1, 1), (0.5, 2), (1.0, 3)]);
        assert_eq!(value.count, 4);
        assert!((value.sum - 4.25).abs() < 1e-9);
    }

    #[test]
    fn test_histogram_boundary_is_inclusive() {
        let hist = Histogram::new(Arc::from(vec![1.0, 2.0]));
        hist.observe(1.0);
        assert_eq!(hist.get().buckets, vec![(1.0, 1), (2.0, 1)]);
    }

    #[test]
    fn test_histogram_ignores_non_finite() {
        let hist = Histogram::new(Arc::from(vec![1.0]));
        hist.observe(0.5);
        hist.observe(f64::NAN);
        hist.observe(f64::INFINITY);
        hist.observe(f64::NEG_INFINITY);

        let value = hist.get();
        assert_eq!(value.buckets, vec![(1.0, 1)]);
        assert_eq!(value.count, 1);
        assert_eq!(value.sum, 0.5);
    }

    #[test]
    fn test_concurrent_counter_no_lost_updates() {
        let counter = Counter::default();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let counter = counter.clone();
                thread::spawn(move || {
                    for _ in 0..10_000 {
                        counter.inc();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(counter.get(), 80_000);
    }

    #[test]
    fn test_concurrent_histogram_sum() {
        let hist = Histogram::new(Arc::from(vec![1.0]));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let hist = hist.clone();
                thread::spawn(move || {
                    for _ in 0..2_500 {
                        hist.observe(0.5);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        let value = hist.get();
        assert_eq!(value.count, 10_000);
        assert_eq!(value.buckets, vec![(1.0, 10_000)]);
        assert_eq!(value.sum, 5_000.0);
    }
}
