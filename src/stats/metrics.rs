//! Registry-wide counters
//!
//! Counters are updated with relaxed atomics on the hot paths and read as a
//! point-in-time [`RegistryStats`] snapshot.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Live counters owned by the registry
#[derive(Debug)]
pub struct RegistryMetrics {
    started_at: Instant,
    streams_created: AtomicU64,
    streams_deleted: AtomicU64,
    lines_written: AtomicU64,
    lines_evicted: AtomicU64,
    subscribers_added: AtomicU64,
    subscribers_dropped: AtomicU64,
}

impl RegistryMetrics {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            streams_created: AtomicU64::new(0),
            streams_deleted: AtomicU64::new(0),
            lines_written: AtomicU64::new(0),
            lines_evicted: AtomicU64::new(0),
            subscribers_added: AtomicU64::new(0),
            subscribers_dropped: AtomicU64::new(0),
        }
    }

    pub fn stream_created(&self) {
        self.streams_created.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stream_deleted(&self) {
        self.streams_deleted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn lines_written(&self, written: usize, evicted: usize) {
        self.lines_written
            .fetch_add(written as u64, Ordering::Relaxed);
        self.lines_evicted
            .fetch_add(evicted as u64, Ordering::Relaxed);
    }

    pub fn subscriber_added(&self) {
        self.subscribers_added.fetch_add(1, Ordering::Relaxed);
    }

    /// Subscribers dropped for overflow
    pub fn subscribers_dropped(&self, dropped: usize) {
        self.subscribers_dropped
            .fetch_add(dropped as u64, Ordering::Relaxed);
    }

    /// Take a snapshot of the counters
    pub fn snapshot(&self) -> RegistryStats {
        RegistryStats {
            uptime: self.started_at.elapsed(),
            streams_created: self.streams_created.load(Ordering::Relaxed),
            streams_deleted: self.streams_deleted.load(Ordering::Relaxed),
            lines_written: self.lines_written.load(Ordering::Relaxed),
            lines_evicted: self.lines_evicted.load(Ordering::Relaxed),
            subscribers_added: self.subscribers_added.load(Ordering::Relaxed),
            subscribers_dropped: self.subscribers_dropped.load(Ordering::Relaxed),
        }
    }
}

impl Default for RegistryMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time registry statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryStats {
    /// Time since the registry was constructed
    pub uptime: Duration,
    /// Streams ever created
    pub streams_created: u64,
    /// Streams deleted, including TTL expiry and shutdown
    pub streams_deleted: u64,
    /// Lines accepted by `write`
    pub lines_written: u64,
    /// Lines evicted from retention buffers
    pub lines_evicted: u64,
    /// Tail subscriptions ever registered
    pub subscribers_added: u64,
    /// Tail subscriptions dropped for overflow
    pub subscribers_dropped: u64,
}

impl RegistryStats {
    /// Streams currently alive according to the counters
    pub fn active_streams(&self) -> u64 {
        self.streams_created.saturating_sub(self.streams_deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_new() {
        let stats = RegistryMetrics::new().snapshot();

        assert_eq!(stats.streams_created, 0);
        assert_eq!(stats.streams_deleted, 0);
        assert_eq!(stats.lines_written, 0);
        assert_eq!(stats.lines_evicted, 0);
        assert_eq!(stats.subscribers_added, 0);
        assert_eq!(stats.subscribers_dropped, 0);
    }

    #[test]
    fn test_metrics_counts() {
        let metrics = RegistryMetrics::new();

        metrics.stream_created();
        metrics.stream_created();
        metrics.stream_deleted();
        metrics.lines_written(10, 3);
        metrics.lines_written(5, 0);
        metrics.subscriber_added();
        metrics.subscribers_dropped(1);

        let stats = metrics.snapshot();
        assert_eq!(stats.active_streams(), 1);
        assert_eq!(stats.lines_written, 15);
        assert_eq!(stats.lines_evicted, 3);
        assert_eq!(stats.subscribers_added, 1);
        assert_eq!(stats.subscribers_dropped, 1);
    }

    #[test]
    fn test_active_streams_saturates() {
        let stats = RegistryStats {
            streams_deleted: 2,
            ..Default::default()
        };

        assert_eq!(stats.active_streams(), 0);
    }
}
