//! Backend metrics.
//!
//! Size, size-in-use and commit counters are published by the batching
//! transaction after each commit cycle and can be read from any thread
//! without taking the batch lock.
//!
//! # Usage
//!
//! ```rust,ignore
//! use kvbatch_core::{Backend, BackendConfig};
//!
//! let backend = Backend::open_in_memory(BackendConfig::default())?;
//!
//! // Perform operations...
//! backend.force_commit();
//!
//! let snapshot = backend.metrics().snapshot();
//! println!("Commits: {}", snapshot.commits);
//! println!("In use: {} of {} bytes", snapshot.size_in_use, snapshot.size);
//! ```

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Upper bound of the first commit latency bucket.
const FIRST_BUCKET: Duration = Duration::from_millis(1);

/// Number of commit latency buckets. Each bound doubles the previous one.
pub const COMMIT_DURATION_BUCKETS: usize = 14;

/// Metrics owned by one backend.
///
/// All fields are atomic. `size` and `size_in_use` are gauges; `commits`
/// and the latency histogram only grow.
#[derive(Debug, Default)]
pub struct BackendMetrics {
    /// Total allocated size of the store in bytes.
    size: AtomicU64,
    /// Size minus free pages, in bytes.
    size_in_use: AtomicU64,
    /// Number of commits that reached the store.
    commits: AtomicU64,
    /// Commit latency histogram.
    commit_durations: DurationHistogram,
}

impl BackendMetrics {
    /// Creates a new metrics instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a commit attempt and its latency.
    pub(crate) fn record_commit(&self, elapsed: Duration) {
        self.commit_durations.observe(elapsed);
        self.commits.fetch_add(1, Ordering::SeqCst);
    }

    /// Publishes the sizes seen by a freshly opened transaction.
    pub(crate) fn set_sizes(&self, size: u64, size_in_use: u64) {
        self.size.store(size, Ordering::SeqCst);
        self.size_in_use.store(size_in_use, Ordering::SeqCst);
    }

    /// Returns the total allocated size of the store in bytes.
    pub fn size(&self) -> u64 {
        self.size.load(Ordering::SeqCst)
    }

    /// Returns the bytes of the store holding data.
    pub fn size_in_use(&self) -> u64 {
        self.size_in_use.load(Ordering::SeqCst)
    }

    /// Returns the number of commits performed.
    pub fn commits(&self) -> u64 {
        self.commits.load(Ordering::SeqCst)
    }

    /// Returns the commit latency histogram.
    pub fn commit_durations(&self) -> &DurationHistogram {
        &self.commit_durations
    }

    /// Returns a snapshot of all metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            size: self.size(),
            size_in_use: self.size_in_use(),
            commits: self.commits(),
            commit_duration_buckets: self.commit_durations.buckets(),
            commit_duration_total: self.commit_durations.total(),
        }
    }
}

/// A cumulative latency histogram with exponential bucket bounds.
///
/// Bucket `i` counts observations `<= 1ms * 2^i`. Observations above the
/// last bound only count toward the total.
#[derive(Debug, Default)]
pub struct DurationHistogram {
    buckets: [AtomicU64; COMMIT_DURATION_BUCKETS],
    count: AtomicU64,
    total_nanos: AtomicU64,
}

impl DurationHistogram {
    /// Returns the upper bound of bucket `index`.
    pub fn bound(index: usize) -> Duration {
        FIRST_BUCKET * (1u32 << index)
    }

    /// Records one observation.
    pub fn observe(&self, elapsed: Duration) {
        if let Some(first) = (0..COMMIT_DURATION_BUCKETS).find(|&i| elapsed <= Self::bound(i)) {
            for bucket in &self.buckets[first..] {
                bucket.fetch_add(1, Ordering::Relaxed);
            }
        }
        let nanos = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);
        self.total_nanos.fetch_add(nanos, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the number of observations.
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Returns the sum of all observations.
    pub fn total(&self) -> Duration {
        Duration::from_nanos(self.total_nanos.load(Ordering::Relaxed))
    }

    /// Returns the cumulative bucket counts.
    pub fn buckets(&self) -> [u64; COMMIT_DURATION_BUCKETS] {
        std::array::from_fn(|i| self.buckets[i].load(Ordering::Relaxed))
    }
}

/// A point-in-time snapshot of backend metrics.
///
/// Unlike `BackendMetrics`, this is a plain struct that can be serialized,
/// compared, or passed across threads without atomics.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct MetricsSnapshot {
    /// Total allocated size in bytes.
    pub size: u64,
    /// Bytes holding data.
    pub size_in_use: u64,
    /// Number of commits.
    pub commits: u64,
    /// Cumulative commit latency bucket counts.
    pub commit_duration_buckets: [u64; COMMIT_DURATION_BUCKETS],
    /// Total time spent committing.
    pub commit_duration_total: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_metrics_are_zero() {
        let metrics = BackendMetrics::new();
        assert_eq!(metrics.size(), 0);
        assert_eq!(metrics.size_in_use(), 0);
        assert_eq!(metrics.commits(), 0);
        assert_eq!(metrics.commit_durations().count(), 0);
    }

    #[test]
    fn record_commit_counts_and_observes() {
        let metrics = BackendMetrics::new();
        metrics.record_commit(Duration::from_micros(500));
        metrics.record_commit(Duration::from_millis(3));

        assert_eq!(metrics.commits(), 2);
        let snap = metrics.snapshot();
        assert_eq!(snap.commits, 2);
        assert_eq!(snap.commit_duration_total, Duration::from_micros(3500));
    }

    #[test]
    fn set_sizes_overwrites() {
        let metrics = BackendMetrics::new();
        metrics.set_sizes(8192, 4096);
        metrics.set_sizes(16384, 12288);
        assert_eq!(metrics.size(), 16384);
        assert_eq!(metrics.size_in_use(), 12288);
    }

    #[test]
    fn histogram_buckets_are_cumulative() {
        let histogram = DurationHistogram::default();
        histogram.observe(Duration::from_micros(100)); // <= 1ms
        histogram.observe(Duration::from_millis(3)); // <= 4ms
        histogram.observe(Duration::from_secs(60)); // beyond the last bound

        let buckets = histogram.buckets();
        assert_eq!(buckets[0], 1);
        assert_eq!(buckets[1], 1);
        assert_eq!(buckets[2], 2);
        assert_eq!(buckets[COMMIT_DURATION_BUCKETS - 1], 2);
        assert_eq!(histogram.count(), 3);
    }

    #[test]
    fn histogram_bounds_double() {
        assert_eq!(DurationHistogram::bound(0), Duration::from_millis(1));
        assert_eq!(DurationHistogram::bound(3), Duration::from_millis(8));
        assert_eq!(
            DurationHistogram::bound(COMMIT_DURATION_BUCKETS - 1),
            Duration::from_millis(8192)
        );
    }

    #[test]
    fn concurrent_commits() {
        use std::sync::Arc;
        use std::thread;

        let metrics = Arc::new(BackendMetrics::new());
        let mut handles = vec![];

        for _ in 0..8 {
            let m = Arc::clone(&metrics);
            handles.push(thread::spawn(move || {
                for _ in 0..100 {
                    m.record_commit(Duration::from_micros(10));
                }
            }));
        }

        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(metrics.commits(), 800);
        assert_eq!(metrics.commit_durations().count(), 800);
    }
}
