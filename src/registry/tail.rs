//! Live tail subscriptions
//!
//! A tail is a pair of bounded channels: lines and errors. The registry holds
//! the sending halves inside the stream entry; the caller owns the receiving
//! halves through [`Tail`].
//!
//! Termination:
//! - stream deleted: the senders are dropped, both sequences end cleanly
//! - subscriber overflow: one [`Error::Overflow`] is sent, then both end
//! - caller cancellation (token or dropping the `Tail`): the subscriber is
//!   deregistered and unread lines are discarded

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::{CancellationToken, DropGuard};

use super::error::Error;
use super::line::Line;

/// Options for a tail subscription
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TailOptions {
    /// Deliver retained lines before live ones
    pub backfill: bool,
}

impl TailOptions {
    /// Start from the retained buffer instead of "now"
    pub fn with_backfill() -> Self {
        Self { backfill: true }
    }
}

/// Outcome of offering a line to a subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Delivery {
    Sent,
    /// Queue full, the subscriber must be dropped
    Full,
    /// Receiver gone, the subscriber must be removed
    Detached,
}

/// Registry-side half of a tail
#[derive(Debug)]
pub(super) struct Subscriber {
    pub(super) id: u64,
    lines: mpsc::Sender<Arc<Line>>,
    errors: mpsc::Sender<Error>,
    /// Fired once the registry lets go of this subscriber
    retired: CancellationToken,
}

impl Subscriber {
    /// Offer a line without blocking
    pub(super) fn deliver(&self, line: &Arc<Line>) -> Delivery {
        match self.lines.try_send(Arc::clone(line)) {
            Ok(()) => Delivery::Sent,
            Err(TrySendError::Full(_)) => Delivery::Full,
            Err(TrySendError::Closed(_)) => Delivery::Detached,
        }
    }

    pub(super) fn retired_signal(&self) -> CancellationToken {
        self.retired.clone()
    }

    /// Report a terminal error; the subscriber is dropped right after
    pub(super) fn fail(self, err: Error) {
        // The error queue holds exactly one slot and this is its only use
        let _ = self.errors.try_send(err);
        self.retire();
    }

    /// Release the subscriber and stop its watcher
    pub(super) fn retire(self) {
        self.retired.cancel();
    }
}

/// Create both halves of a tail
pub(super) fn channel(
    id: u64,
    key: &str,
    capacity: usize,
    cancel: CancellationToken,
) -> (Subscriber, Tail) {
    let (line_tx, line_rx) = mpsc::channel(capacity.max(1));
    let (err_tx, err_rx) = mpsc::channel(1);

    let subscriber = Subscriber {
        id,
        lines: line_tx,
        errors: err_tx,
        retired: CancellationToken::new(),
    };

    (subscriber, Tail::new(key.to_string(), line_rx, err_rx, cancel))
}

/// Caller-side handle of a live tail
///
/// Dropping the handle cancels the subscription.
#[derive(Debug)]
pub struct Tail {
    key: String,
    lines: mpsc::Receiver<Arc<Line>>,
    errors: mpsc::Receiver<Error>,
    cancel: CancellationToken,
    _guard: DropGuard,
}

impl Tail {
    pub(crate) fn new(
        key: String,
        lines: mpsc::Receiver<Arc<Line>>,
        errors: mpsc::Receiver<Error>,
        cancel: CancellationToken,
    ) -> Self {
        let guard = cancel.clone().drop_guard();
        Self {
            key,
            lines,
            errors,
            cancel,
            _guard: guard,
        }
    }

    /// A tail whose sequences are already closed
    pub(crate) fn ended(key: impl Into<String>) -> Self {
        let (_, lines) = mpsc::channel(1);
        let (_, errors) = mpsc::channel(1);
        Self::new(key.into(), lines, errors, CancellationToken::new())
    }

    /// Stream key this tail follows
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Next line, or `None` once the data sequence has ended
    pub async fn next_line(&mut self) -> Option<Arc<Line>> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                self.lines.close();
                None
            }
            line = self.lines.recv() => line,
        }
    }

    /// Next error, or `None` once the error sequence has ended
    ///
    /// Resolves only on abnormal termination or when the tail ends.
    pub async fn next_error(&mut self) -> Option<Error> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                self.errors.close();
                None
            }
            err = self.errors.recv() => err,
        }
    }

    /// Next line without waiting
    pub fn try_next_line(&mut self) -> Option<Arc<Line>> {
        if self.cancel.is_cancelled() {
            return None;
        }
        self.lines.try_recv().ok()
    }

    /// Stop the subscription
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether the tail ended because the caller cancelled it
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(n: u64) -> Arc<Line> {
        let mut line = Line::new("info", format!("line {n}"));
        line.number = n;
        Arc::new(line)
    }

    #[tokio::test]
    async fn test_deliver_full_and_detached() {
        let (sub, tail) = channel(1, "k", 1, CancellationToken::new());

        assert_eq!(sub.deliver(&line(0)), Delivery::Sent);
        assert_eq!(sub.deliver(&line(1)), Delivery::Full);

        drop(tail);
        assert_eq!(sub.deliver(&line(2)), Delivery::Detached);
    }

    #[tokio::test]
    async fn test_fail_ends_both_sequences() {
        let (sub, mut tail) = channel(1, "k", 4, CancellationToken::new());
        sub.deliver(&line(0));
        sub.fail(Error::Overflow {
            key: "k".into(),
            capacity: 4,
        });

        assert_eq!(tail.next_line().await.map(|l| l.number), Some(0));
        assert!(tail.next_line().await.is_none());
        assert!(matches!(tail.next_error().await, Some(Error::Overflow { .. })));
        assert!(tail.next_error().await.is_none());
    }

    #[tokio::test]
    async fn test_fail_retires_without_cancelling_tail() {
        let (sub, mut tail) = channel(1, "k", 4, CancellationToken::new());
        let retired = sub.retired_signal();
        sub.deliver(&line(0));

        sub.fail(Error::Overflow {
            key: "k".into(),
            capacity: 4,
        });

        assert!(retired.is_cancelled());
        assert!(!tail.is_cancelled());
        assert_eq!(tail.next_line().await.map(|l| l.number), Some(0));
        assert!(matches!(tail.next_error().await, Some(Error::Overflow { .. })));
    }

    #[tokio::test]
    async fn test_cancel_discards_unread() {
        let (sub, mut tail) = channel(1, "k", 4, CancellationToken::new());
        sub.deliver(&line(0));
        sub.deliver(&line(1));

        tail.cancel();

        assert!(tail.is_cancelled());
        assert!(tail.next_line().await.is_none());
        assert!(tail.try_next_line().is_none());
        assert!(tail.next_error().await.is_none());
    }

    #[tokio::test]
    async fn test_parent_token_cancels_tail() {
        let parent = CancellationToken::new();
        let (_sub, mut tail) = channel(1, "k", 4, parent.child_token());

        parent.cancel();

        assert!(tail.next_line().await.is_none());
    }

    #[tokio::test]
    async fn test_drop_cancels_token() {
        let token = CancellationToken::new();
        let (_sub, tail) = channel(1, "k", 4, token.clone());

        drop(tail);

        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_ended_tail() {
        let mut tail = Tail::ended("k");

        assert_eq!(tail.key(), "k");
        assert!(tail.next_line().await.is_none());
        assert!(tail.next_error().await.is_none());
        assert!(!tail.is_cancelled());
    }
}
