use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Shared, caller-owned compression counter
///
/// Holds the last `compression-count` value reported by the service. The
/// transport overwrites it whenever a response carries the header; it is
/// never incremented locally. Clones share the same value.
#[derive(Debug, Clone, Default)]
pub struct CompressionCounter(Arc<AtomicU64>);

impl CompressionCounter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Last reported count (0 until the first report)
    #[must_use]
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    /// Overwrite the stored count
    pub fn set(&self, value: u64) {
        self.0.store(value, Ordering::Relaxed);
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_counter_starts_at_zero() {
        assert_eq!(CompressionCounter::new().get(), 0);
    }

    #[test]
    fn test_clones_share_value() {
        let counter = CompressionCounter::new();
        let handle = counter.clone();

        handle.set(42);
        assert_eq!(counter.get(), 42);

        counter.set(7);
        assert_eq!(handle.get(), 7);
    }
}
