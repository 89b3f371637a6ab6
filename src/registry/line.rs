//! Log line and snapshot types
//!
//! This module defines the record that flows from writers to tailers and the
//! introspection views computed from stream state.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single log record
///
/// Lines are immutable once written. The registry hands out `Arc<Line>` so
/// every subscriber shares one allocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Line {
    /// Position within the stream, assigned by the registry at write time
    #[serde(rename = "pos")]
    pub number: u64,
    /// Free-form level or kind tag (e.g. "info", "error")
    pub level: String,
    /// Message payload
    #[serde(rename = "out")]
    pub message: String,
    /// When the line was produced
    #[serde(rename = "time")]
    pub timestamp: DateTime<Utc>,
    /// Structured arguments attached by the producer
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub args: BTreeMap<String, String>,
}

impl Line {
    /// Create a new line stamped with the current time
    ///
    /// The number is a placeholder until the line is written.
    pub fn new(level: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            number: 0,
            level: level.into(),
            message: message.into(),
            timestamp: Utc::now(),
            args: BTreeMap::new(),
        }
    }

    /// Override the timestamp
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Attach a structured argument
    pub fn with_arg(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.args.insert(key.into(), value.into());
        self
    }

    /// Approximate retained size in bytes, used for byte-bounded buffers
    pub fn size(&self) -> usize {
        self.level.len()
            + self.message.len()
            + self
                .args
                .iter()
                .map(|(k, v)| k.len() + v.len())
                .sum::<usize>()
    }
}

/// Snapshot of a single stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Info {
    /// Number of lines currently retained in the buffer
    pub size: usize,
    /// Number of active tailers
    pub subscribers: usize,
    /// Whether the stream has been closed
    pub closed: bool,
}

/// Snapshot of every stream in the registry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryInfo {
    pub streams: BTreeMap<String, Info>,
}
