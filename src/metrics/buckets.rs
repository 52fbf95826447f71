//! Histogram bucket layouts.

/// Default latency buckets in seconds: 5ms up to 10s.
pub const DEFAULT_BUCKETS: [f64; 11] = [
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// `count` buckets starting at `start`, each `width` apart.
pub fn linear_buckets(start: f64, width: f64, count: usize) -> Vec<f64> {
    (0..count).map(|i| start + width * i as f64).collect()
}

/// `count` buckets starting at `start`, each `factor` times the previous.
pub fn exponential_buckets(start: f64, factor: f64, count: usize) -> Vec<f64> {
    std::iter::successors(Some(start), |b| Some(b * factor))
        .take(count)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_buckets() {
        assert_eq!(linear_buckets(1.0, 2.0, 4), vec![1.0, 3.0, 5.0, 7.0]);
        assert!(linear_buckets(1.0, 2.0, 0).is_empty());
    }

    #[test]
    fn test_exponential_buckets() {
        assert_eq!(exponential_buckets(1.0, 2.0, 5), vec![1.0, 2.0, 4.0, 8.0, 16.0]);
    }

    #[test]
    fn test_default_buckets_are_increasing() {
        assert!(DEFAULT_BUCKETS.windows(2).all(|w| w[0] < w[1]));
    }
}
