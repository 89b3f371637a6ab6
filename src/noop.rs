//! No-op log stream for tests and local development.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::registry::{Info, Line, Result, Tail};
use crate::stream::LogStream;

/// Log stream that accepts every call and keeps nothing
///
/// Writes are discarded, tails end immediately and `info` reports no
/// stream.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopStream;

impl NoopStream {
    /// Create a new no-op stream.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl LogStream for NoopStream {
    async fn create(&self, _key: &str) -> Result<()> {
        Ok(())
    }

    async fn delete(&self, _key: &str) -> Result<()> {
        Ok(())
    }

    async fn write(&self, key: &str, lines: Vec<Line>) -> Result<()> {
        tracing::trace!(stream = %key, lines = lines.len(), "Discarding lines");
        Ok(())
    }

    async fn tail(&self, key: &str, _cancel: CancellationToken) -> Result<Tail> {
        Ok(Tail::ended(key))
    }

    async fn info(&self, _key: &str) -> Option<Info> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_noop_accepts_everything() {
        let stream = NoopStream::new();

        assert!(stream.create("job").await.is_ok());
        assert!(stream.create("job").await.is_ok());
        assert!(stream
            .write("job", vec![Line::new("info", "dropped")])
            .await
            .is_ok());
        assert!(stream.delete("missing").await.is_ok());
        assert!(stream.info("job").await.is_none());
    }

    #[tokio::test]
    async fn test_noop_tail_ends() {
        let mut tail = NoopStream::new()
            .tail("job", CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(tail.key(), "job");
        assert!(tail.next_line().await.is_none());
        assert!(tail.next_error().await.is_none());
    }
}
