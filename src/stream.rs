//! The log stream capability set
//!
//! Callers depend on [`LogStream`] rather than a concrete engine so tests can
//! substitute [`NoopStream`](crate::noop::NoopStream) or a generated mock.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::registry::{Info, Line, Result, StreamRegistry, Tail};

/// Operations a log stream backend provides
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LogStream: Send + Sync {
    /// Register a new stream for `key`
    async fn create(&self, key: &str) -> Result<()>;

    /// Remove the stream for `key`, ending its tails
    async fn delete(&self, key: &str) -> Result<()>;

    /// Append lines to the stream for `key`
    async fn write(&self, key: &str, lines: Vec<Line>) -> Result<()>;

    /// Follow the stream for `key` until it is deleted or `cancel` fires
    async fn tail(&self, key: &str, cancel: CancellationToken) -> Result<Tail>;

    /// Snapshot of the stream for `key`, if it exists
    async fn info(&self, key: &str) -> Option<Info>;
}

#[async_trait]
impl LogStream for StreamRegistry {
    async fn create(&self, key: &str) -> Result<()> {
        StreamRegistry::create(self, key).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        StreamRegistry::delete(self, key).await
    }

    async fn write(&self, key: &str, lines: Vec<Line>) -> Result<()> {
        StreamRegistry::write(self, key, lines).await
    }

    async fn tail(&self, key: &str, cancel: CancellationToken) -> Result<Tail> {
        StreamRegistry::tail(self, key, cancel).await
    }

    async fn info(&self, key: &str) -> Option<Info> {
        StreamRegistry::info(self, key).await
    }
}
