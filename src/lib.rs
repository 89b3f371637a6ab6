//! In-process log line broker
//!
//! `logstream` accepts log lines produced by running jobs, keeps a bounded
//! window of recent lines per stream, and fans every new line out to live
//! tailers. Streams are addressed by a string key (for example a build step
//! id) and live from `create` until `delete`.
//!
//! # Example
//!
//! ```no_run
//! use logstream::{Line, StreamRegistry};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> logstream::Result<()> {
//! let registry = StreamRegistry::new();
//! registry.create("build-1/step-2").await?;
//!
//! let mut tail = registry.tail("build-1/step-2", CancellationToken::new()).await?;
//! registry
//!     .write("build-1/step-2", vec![Line::new("info", "cargo build")])
//!     .await?;
//!
//! while let Some(line) = tail.next_line().await {
//!     println!("{} {}", line.number, line.message);
//! }
//! if let Some(err) = tail.next_error().await {
//!     eprintln!("tail ended: {err}");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Backpressure
//!
//! Writers never wait for tailers. Each tailer has a bounded queue
//! (`RegistryConfig::subscriber_capacity`); a tailer whose queue is full is
//! dropped and receives [`Error::Overflow`] on its error sequence. Other
//! tailers and the stream itself are unaffected.

pub mod noop;
pub mod registry;
pub mod stats;
pub mod stream;

pub use noop::NoopStream;
pub use registry::{
    Error, Info, Line, RegistryConfig, RegistryInfo, Result, StreamRegistry, Tail, TailOptions,
};
pub use stats::RegistryStats;
pub use stream::LogStream;
