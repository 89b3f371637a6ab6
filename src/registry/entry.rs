//! Per-stream state
//!
//! This module defines the state stored in the registry for each key. All
//! mutation happens under the entry's mutex, so a write batch, a subscribe
//! and a teardown never interleave.

use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;

use super::buffer::LineBuffer;
use super::config::RegistryConfig;
use super::error::Error;
use super::line::{Info, Line};
use super::tail::{Delivery, Subscriber};

/// Counters produced by one write batch
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(super) struct AppendOutcome {
    pub written: usize,
    pub evicted: usize,
    /// Subscribers dropped for overflow
    pub overflowed: usize,
    /// Subscribers whose receiver was gone
    pub detached: usize,
}

/// Entry for a single stream in the registry
pub struct StreamEntry {
    key: String,

    /// Retained lines for backfill
    buffer: LineBuffer,

    /// Active subscribers in registration order
    subscribers: Vec<Subscriber>,

    /// Number assigned to the next written line
    next_number: u64,

    /// Per-subscriber queue capacity
    subscriber_capacity: usize,

    closed: bool,

    /// Fired on teardown so subscriber watchers can exit
    close_signal: CancellationToken,

    /// When the stream was created
    pub created_at: Instant,
}

impl StreamEntry {
    /// Create a new, empty stream entry
    pub(super) fn new(key: &str, config: &RegistryConfig) -> Self {
        Self {
            key: key.to_string(),
            buffer: LineBuffer::new(config.max_buffer_size, config.max_buffer_bytes),
            subscribers: Vec::new(),
            next_number: 0,
            subscriber_capacity: config.subscriber_capacity.max(1),
            closed: false,
            close_signal: CancellationToken::new(),
            created_at: Instant::now(),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    pub(super) fn subscriber_capacity(&self) -> usize {
        self.subscriber_capacity
    }

    pub(super) fn close_signal(&self) -> CancellationToken {
        self.close_signal.clone()
    }

    /// Number the next written line will get
    pub fn next_number(&self) -> u64 {
        self.next_number
    }

    /// Append a batch, numbering and fanning out each line in order
    pub(super) fn append(&mut self, lines: Vec<Line>) -> AppendOutcome {
        let mut outcome = AppendOutcome::default();

        for mut line in lines {
            line.number = self.next_number;
            self.next_number += 1;

            let line = Arc::new(line);
            outcome.evicted += self.buffer.push(Arc::clone(&line));
            outcome.written += 1;
            self.broadcast(&line, &mut outcome);
        }

        outcome
    }

    /// Offer a line to every subscriber, dropping the ones that cannot take it
    fn broadcast(&mut self, line: &Arc<Line>, outcome: &mut AppendOutcome) {
        let mut i = 0;
        while i < self.subscribers.len() {
            match self.subscribers[i].deliver(line) {
                Delivery::Sent => i += 1,
                Delivery::Full => {
                    let sub = self.subscribers.remove(i);
                    tracing::warn!(
                        stream = %self.key,
                        subscriber = sub.id,
                        capacity = self.subscriber_capacity,
                        line = line.number,
                        "Subscriber queue full, dropping subscriber"
                    );
                    sub.fail(Error::Overflow {
                        key: self.key.clone(),
                        capacity: self.subscriber_capacity,
                    });
                    outcome.overflowed += 1;
                }
                Delivery::Detached => {
                    let sub = self.subscribers.remove(i);
                    tracing::debug!(
                        stream = %self.key,
                        subscriber = sub.id,
                        "Subscriber receiver gone, removing"
                    );
                    sub.retire();
                    outcome.detached += 1;
                }
            }
        }
    }

    /// Register a subscriber, optionally seeding it with retained lines
    ///
    /// Backfill is bounded by the queue capacity so it can never overflow a
    /// fresh subscriber.
    pub(super) fn add_subscriber(&mut self, subscriber: Subscriber, backfill: bool) -> usize {
        let mut seeded = 0;
        if backfill {
            for line in self.buffer.recent(self.subscriber_capacity) {
                if subscriber.deliver(&line) != Delivery::Sent {
                    break;
                }
                seeded += 1;
            }
        }
        self.subscribers.push(subscriber);
        seeded
    }

    /// Remove a subscriber by id
    pub(super) fn remove_subscriber(&mut self, id: u64) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|sub| sub.id != id);
        self.subscribers.len() != before
    }

    /// Mark the stream closed and end every subscriber cleanly
    ///
    /// Returns the number of subscribers that were terminated.
    pub(super) fn close(&mut self) -> usize {
        self.closed = true;
        let terminated = self.subscribers.len();
        // Dropping the senders closes each subscriber's sequences
        self.subscribers.clear();
        self.buffer.clear();
        self.close_signal.cancel();
        terminated
    }

    /// Snapshot of this stream
    pub fn info(&self) -> Info {
        Info {
            size: self.buffer.len(),
            subscribers: self.subscribers.len(),
            closed: self.closed,
        }
    }
}

impl std::fmt::Debug for StreamEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamEntry")
            .field("key", &self.key)
            .field("lines", &self.buffer.len())
            .field("subscribers", &self.subscribers.len())
            .field("next_number", &self.next_number)
            .field("closed", &self.closed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::super::tail;
    use super::*;

    fn entry(capacity: usize) -> StreamEntry {
        let config = RegistryConfig::default()
            .max_buffer_size(3)
            .subscriber_capacity(capacity);
        StreamEntry::new("job", &config)
    }

    fn lines(messages: &[&str]) -> Vec<Line> {
        messages.iter().map(|m| Line::new("info", *m)).collect()
    }

    #[tokio::test]
    async fn test_append_numbers_lines() {
        let mut entry = entry(8);

        let outcome = entry.append(lines(&["a", "b"]));
        assert_eq!(outcome.written, 2);
        entry.append(lines(&["c"]));

        assert_eq!(entry.next_number(), 3);
        assert_eq!(entry.info().size, 3);
    }

    #[tokio::test]
    async fn test_append_evicts_past_retention() {
        let mut entry = entry(8);

        let outcome = entry.append(lines(&["a", "b", "c", "d", "e"]));

        assert_eq!(outcome.evicted, 2);
        assert_eq!(entry.info().size, 3);
    }

    #[tokio::test]
    async fn test_overflow_drops_only_slow_subscriber() {
        let mut entry = entry(2);
        let (slow, mut slow_tail) = tail::channel(1, "job", 2, CancellationToken::new());
        let (fast, mut fast_tail) = tail::channel(2, "job", 8, CancellationToken::new());
        entry.add_subscriber(slow, false);
        entry.add_subscriber(fast, false);

        let outcome = entry.append(lines(&["a", "b", "c"]));

        assert_eq!(outcome.overflowed, 1);
        assert_eq!(entry.subscriber_count(), 1);
        assert!(matches!(
            slow_tail.next_error().await,
            Some(Error::Overflow { capacity: 2, .. })
        ));
        for expected in 0..3 {
            assert_eq!(fast_tail.next_line().await.unwrap().number, expected);
        }
    }

    #[tokio::test]
    async fn test_detached_subscriber_removed_on_write() {
        let mut entry = entry(8);
        let (sub, tail) = tail::channel(1, "job", 8, CancellationToken::new());
        entry.add_subscriber(sub, false);
        drop(tail);

        let outcome = entry.append(lines(&["a"]));

        assert_eq!(outcome.detached, 1);
        assert_eq!(entry.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_backfill_bounded_by_capacity() {
        let mut entry = entry(2);
        entry.append(lines(&["a", "b", "c"]));

        let (sub, mut tail) = tail::channel(1, "job", 2, CancellationToken::new());
        let seeded = entry.add_subscriber(sub, true);

        assert_eq!(seeded, 2);
        assert_eq!(tail.next_line().await.unwrap().number, 1);
        assert_eq!(tail.next_line().await.unwrap().number, 2);
    }

    #[tokio::test]
    async fn test_close_ends_subscribers() {
        let mut entry = entry(8);
        let (sub, mut tail) = tail::channel(1, "job", 8, CancellationToken::new());
        entry.add_subscriber(sub, false);
        entry.append(lines(&["a"]));
        let signal = entry.close_signal();

        assert_eq!(entry.close(), 1);

        assert!(signal.is_cancelled());
        assert!(entry.is_closed());
        assert_eq!(entry.info().size, 0);
        assert_eq!(tail.next_line().await.unwrap().message, "a");
        assert!(tail.next_line().await.is_none());
        assert!(tail.next_error().await.is_none());
    }

    #[tokio::test]
    async fn test_remove_subscriber() {
        let mut entry = entry(8);
        let (sub, _tail) = tail::channel(7, "job", 8, CancellationToken::new());
        entry.add_subscriber(sub, false);

        assert!(entry.remove_subscriber(7));
        assert!(!entry.remove_subscriber(7));
        assert_eq!(entry.subscriber_count(), 0);
    }
}
