//! Stream registry implementation
//!
//! The central registry that owns every live stream and fans written lines
//! out to tailers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::stats::{RegistryMetrics, RegistryStats};

use super::config::RegistryConfig;
use super::entry::StreamEntry;
use super::error::{Error, Result};
use super::line::{Info, Line, RegistryInfo};
use super::tail::{self, Tail, TailOptions};

type EntryRef = Arc<Mutex<StreamEntry>>;

/// Central registry for all live streams
///
/// The outer `RwLock` is taken for writing only to insert or remove keys.
/// Writes, tails and info on different keys contend only on their own
/// entry's mutex.
pub struct StreamRegistry {
    /// Map of stream key to stream entry
    streams: RwLock<HashMap<String, EntryRef>>,

    /// Configuration
    config: RegistryConfig,

    metrics: RegistryMetrics,

    next_subscriber_id: AtomicU64,

    /// Subscriber watcher tasks
    tasks: TaskTracker,

    shutdown: CancellationToken,
}

impl StreamRegistry {
    /// Create a new stream registry with default configuration
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create a new stream registry with custom configuration
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            streams: RwLock::new(HashMap::new()),
            config,
            metrics: RegistryMetrics::new(),
            next_subscriber_id: AtomicU64::new(1),
            tasks: TaskTracker::new(),
            shutdown: CancellationToken::new(),
        }
    }

    /// Get the registry configuration
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    fn ensure_running(&self) -> Result<()> {
        if self.shutdown.is_cancelled() {
            return Err(Error::Shutdown);
        }
        Ok(())
    }

    async fn entry(&self, key: &str) -> Result<EntryRef> {
        let streams = self.streams.read().await;
        streams
            .get(key)
            .cloned()
            .ok_or_else(|| Error::NotFound(key.to_string()))
    }

    /// Register a new, empty stream
    pub async fn create(&self, key: &str) -> Result<()> {
        self.ensure_running()?;

        let mut streams = self.streams.write().await;
        // Shutdown may have drained the map while we waited for the lock
        self.ensure_running()?;
        if streams.contains_key(key) {
            return Err(Error::AlreadyExists(key.to_string()));
        }

        let entry = StreamEntry::new(key, &self.config);
        streams.insert(key.to_string(), Arc::new(Mutex::new(entry)));
        self.metrics.stream_created();

        tracing::info!(stream = %key, "Stream created");
        Ok(())
    }

    /// Remove a stream, ending every tail on it
    pub async fn delete(&self, key: &str) -> Result<()> {
        let entry_arc = {
            let mut streams = self.streams.write().await;
            streams
                .remove(key)
                .ok_or_else(|| Error::NotFound(key.to_string()))?
        };

        let mut entry = entry_arc.lock().await;
        let lines = entry.info().size;
        let terminated = entry.close();
        self.metrics.stream_deleted();

        tracing::info!(
            stream = %key,
            subscribers = terminated,
            buffered = lines,
            "Stream deleted"
        );
        Ok(())
    }

    /// Append lines to a stream and push them to its tailers
    ///
    /// The batch is numbered and delivered atomically. Never waits on a
    /// tailer: a subscriber whose queue is full is dropped with
    /// [`Error::Overflow`] on its error sequence.
    pub async fn write(&self, key: &str, lines: Vec<Line>) -> Result<()> {
        self.ensure_running()?;

        let entry_arc = self.entry(key).await?;
        let mut entry = entry_arc.lock().await;

        // Lost a race with delete
        if entry.is_closed() {
            return Err(Error::NotFound(key.to_string()));
        }

        let outcome = entry.append(lines);
        self.metrics.lines_written(outcome.written, outcome.evicted);
        self.metrics.subscribers_dropped(outcome.overflowed);

        tracing::debug!(
            stream = %key,
            written = outcome.written,
            evicted = outcome.evicted,
            subscribers = entry.subscriber_count(),
            "Lines written"
        );
        Ok(())
    }

    /// Tail a stream from "now", or from the retained buffer if the
    /// registry is configured to backfill
    pub async fn tail(&self, key: &str, cancel: CancellationToken) -> Result<Tail> {
        let options = TailOptions {
            backfill: self.config.backfill,
        };
        self.tail_with_options(key, cancel, options).await
    }

    /// Tail a stream
    ///
    /// Cancelling `cancel`, or dropping the returned [`Tail`], deregisters
    /// the subscriber without waiting for the next write.
    pub async fn tail_with_options(
        &self,
        key: &str,
        cancel: CancellationToken,
        options: TailOptions,
    ) -> Result<Tail> {
        self.ensure_running()?;

        let entry_arc = self.entry(key).await?;
        let mut entry = entry_arc.lock().await;

        if entry.is_closed() {
            return Err(if self.is_shutdown() {
                Error::Shutdown
            } else {
                Error::NotFound(key.to_string())
            });
        }

        let id = self.next_subscriber_id.fetch_add(1, Ordering::Relaxed);
        let token = cancel.child_token();
        let (subscriber, tail) =
            tail::channel(id, key, entry.subscriber_capacity(), token.clone());
        let retired = subscriber.retired_signal();
        let backfilled = entry.add_subscriber(subscriber, options.backfill);
        let closed = entry.close_signal();
        let subscribers = entry.subscriber_count();

        // Spawned under the entry lock so shutdown cannot close this stream
        // and stop waiting on watchers before this one is tracked
        self.spawn_watcher(key, id, Arc::clone(&entry_arc), token, retired, closed);
        drop(entry);

        self.metrics.subscriber_added();

        tracing::info!(
            stream = %key,
            subscriber = id,
            subscribers = subscribers,
            backfilled = backfilled,
            "Subscriber added"
        );
        Ok(tail)
    }

    /// Deregister a subscriber as soon as its tail is cancelled
    ///
    /// The watcher also exits once the subscriber is retired (overflow or
    /// detached receiver) or the stream closes.
    fn spawn_watcher(
        &self,
        key: &str,
        id: u64,
        entry_arc: EntryRef,
        token: CancellationToken,
        retired: CancellationToken,
        closed: CancellationToken,
    ) {
        let key = key.to_string();
        self.tasks.spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {
                    let mut entry = entry_arc.lock().await;
                    if entry.remove_subscriber(id) {
                        tracing::debug!(
                            stream = %key,
                            subscriber = id,
                            subscribers = entry.subscriber_count(),
                            "Subscriber removed"
                        );
                    }
                }
                _ = retired.cancelled() => {}
                _ = closed.cancelled() => {}
            }
        });
    }

    /// Snapshot of a stream, or `None` if it does not exist
    pub async fn info(&self, key: &str) -> Option<Info> {
        let entry_arc = self.entry(key).await.ok()?;
        let entry = entry_arc.lock().await;
        Some(entry.info())
    }

    /// Snapshot of every stream
    pub async fn info_all(&self) -> RegistryInfo {
        let entries: Vec<(String, EntryRef)> = {
            let streams = self.streams.read().await;
            streams
                .iter()
                .map(|(key, entry)| (key.clone(), Arc::clone(entry)))
                .collect()
        };

        let mut info = RegistryInfo::default();
        for (key, entry_arc) in entries {
            let entry = entry_arc.lock().await;
            if !entry.is_closed() {
                info.streams.insert(key, entry.info());
            }
        }
        info
    }

    /// Get total number of streams
    pub async fn stream_count(&self) -> usize {
        self.streams.read().await.len()
    }

    /// Registry-wide counters
    pub fn stats(&self) -> RegistryStats {
        self.metrics.snapshot()
    }

    /// Run cleanup once
    ///
    /// Deletes streams older than `stream_ttl`. Does nothing without a TTL.
    pub async fn cleanup(&self) -> usize {
        let Some(ttl) = self.config.stream_ttl else {
            return 0;
        };

        let expired: Vec<String> = {
            let streams = self.streams.read().await;
            streams
                .iter()
                .filter_map(|(key, entry_arc)| {
                    // Skip entries busy with a write; they get the next round
                    let entry = entry_arc.try_lock().ok()?;
                    (entry.created_at.elapsed() > ttl).then(|| key.clone())
                })
                .collect()
        };

        let mut removed = 0;
        for key in expired {
            if self.delete(&key).await.is_ok() {
                tracing::info!(stream = %key, "Stream expired by cleanup");
                removed += 1;
            }
        }
        removed
    }

    /// Spawn background cleanup task
    ///
    /// The task stops on [`shutdown`](Self::shutdown) or when the handle is
    /// aborted.
    pub fn spawn_cleanup_task(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let registry = Arc::clone(self);
        let interval = registry.config.cleanup_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = registry.shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        registry.cleanup().await;
                    }
                }
            }
        })
    }

    /// Whether [`shutdown`](Self::shutdown) has been called
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Delete every stream and wait for subscriber watchers to finish
    ///
    /// Afterwards create, write and tail fail with [`Error::Shutdown`].
    pub async fn shutdown(&self) {
        self.shutdown.cancel();

        let drained: Vec<(String, EntryRef)> = {
            let mut streams = self.streams.write().await;
            streams.drain().collect()
        };

        let count = drained.len();
        for (key, entry_arc) in drained {
            let terminated = entry_arc.lock().await.close();
            self.metrics.stream_deleted();
            tracing::debug!(stream = %key, subscribers = terminated, "Stream closed on shutdown");
        }

        self.tasks.close();
        self.tasks.wait().await;

        tracing::info!(streams = count, "Stream registry shut down");
    }
}

impl Default for StreamRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StreamRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamRegistry")
            .field("config", &self.config)
            .field("shutdown", &self.shutdown.is_cancelled())
            .finish_non_exhaustive()
    }
}
