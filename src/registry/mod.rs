//! Stream registry for log line fan-out
//!
//! The registry owns every live log stream and routes lines from writers to
//! tailers. Each tailer gets its own bounded queue; a tailer that cannot keep
//! up is dropped instead of slowing the writer down.
//!
//! # Architecture
//!
//! ```text
//!                          Arc<StreamRegistry>
//!                     ┌─────────────────────────┐
//!                     │ streams: HashMap<Key,   │
//!                     │   Mutex<StreamEntry {   │
//!                     │     buffer,             │
//!                     │     subscribers,        │
//!                     │   }>                    │
//!                     │ >                       │
//!                     └───────────┬─────────────┘
//!                                 │
//!         ┌───────────────────────┼───────────────────────┐
//!         │                       │                       │
//!         ▼                       ▼                       ▼
//!      [Writer]                [Tail]                  [Tail]
//!      write()             next_line()             next_line()
//!         │                       ▲                       ▲
//!         └──► entry.append() ──► try_send ───────────────┘
//! ```
//!
//! # Sharing
//!
//! Lines are wrapped in `Arc` once at write time; every subscriber queue
//! holds a reference to the same allocation.

pub mod buffer;
pub mod config;
pub mod entry;
pub mod error;
pub mod line;
pub mod store;
pub mod tail;

pub use buffer::LineBuffer;
pub use config::RegistryConfig;
pub use entry::StreamEntry;
pub use error::{Error, Result};
pub use line::{Info, Line, RegistryInfo};
pub use store::StreamRegistry;
pub use tail::{Tail, TailOptions};
