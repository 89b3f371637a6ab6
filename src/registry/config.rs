//! Registry configuration

use std::time::Duration;

/// Default number of lines retained per stream
pub const DEFAULT_MAX_BUFFER_SIZE: usize = 5000;

/// Default per-subscriber queue capacity
pub const DEFAULT_SUBSCRIBER_CAPACITY: usize = 5000;

/// Configuration for the stream registry
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Lines retained per stream for backfilling tailers
    pub max_buffer_size: usize,

    /// Bytes retained per stream (0 = unlimited)
    pub max_buffer_bytes: usize,

    /// Per-subscriber delivery queue capacity in lines
    ///
    /// A subscriber whose queue fills up is dropped with an overflow error.
    pub subscriber_capacity: usize,

    /// Whether `tail` backfills retained lines by default
    pub backfill: bool,

    /// Maximum stream lifetime before the cleanup task deletes it
    pub stream_ttl: Option<Duration>,

    /// How often the cleanup task runs
    pub cleanup_interval: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_buffer_size: DEFAULT_MAX_BUFFER_SIZE,
            max_buffer_bytes: 0,
            subscriber_capacity: DEFAULT_SUBSCRIBER_CAPACITY,
            backfill: false,
            stream_ttl: None,
            cleanup_interval: Duration::from_secs(30),
        }
    }
}

impl RegistryConfig {
    /// Set the number of retained lines per stream
    pub fn max_buffer_size(mut self, lines: usize) -> Self {
        self.max_buffer_size = lines;
        self
    }

    /// Set the number of retained bytes per stream
    pub fn max_buffer_bytes(mut self, bytes: usize) -> Self {
        self.max_buffer_bytes = bytes;
        self
    }

    /// Set the per-subscriber queue capacity (at least 1)
    pub fn subscriber_capacity(mut self, capacity: usize) -> Self {
        self.subscriber_capacity = capacity.max(1);
        self
    }

    /// Backfill retained lines to new tailers by default
    pub fn backfill(mut self, enabled: bool) -> Self {
        self.backfill = enabled;
        self
    }

    /// Expire streams after the given lifetime
    pub fn stream_ttl(mut self, ttl: Duration) -> Self {
        self.stream_ttl = Some(ttl);
        self
    }

    /// Set the cleanup task interval
    pub fn cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RegistryConfig::default();

        assert_eq!(config.max_buffer_size, DEFAULT_MAX_BUFFER_SIZE);
        assert_eq!(config.max_buffer_bytes, 0);
        assert_eq!(config.subscriber_capacity, DEFAULT_SUBSCRIBER_CAPACITY);
        assert!(!config.backfill);
        assert!(config.stream_ttl.is_none());
    }

    #[test]
    fn test_builder_subscriber_capacity_floor() {
        let config = RegistryConfig::default().subscriber_capacity(0);

        assert_eq!(config.subscriber_capacity, 1);
    }

    #[test]
    fn test_builder_chain() {
        let config = RegistryConfig::default()
            .max_buffer_size(10)
            .max_buffer_bytes(1024)
            .backfill(true)
            .stream_ttl(Duration::from_secs(60))
            .cleanup_interval(Duration::from_secs(5));

        assert_eq!(config.max_buffer_size, 10);
        assert_eq!(config.max_buffer_bytes, 1024);
        assert!(config.backfill);
        assert_eq!(config.stream_ttl, Some(Duration::from_secs(60)));
        assert_eq!(config.cleanup_interval, Duration::from_secs(5));
    }
}
