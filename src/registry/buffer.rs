//! Bounded line buffer for backfilling late tailers
//!
//! The buffer keeps the most recent lines of a stream. Once either bound is
//! exceeded the oldest lines are evicted. Eviction never touches lines
//! already queued for live subscribers.

use std::collections::VecDeque;
use std::sync::Arc;

use super::line::Line;

/// A buffered line with its accounted size
#[derive(Debug)]
struct BufferedLine {
    line: Arc<Line>,
    size: usize,
}

/// Retention window of recent lines
#[derive(Debug)]
pub struct LineBuffer {
    /// Maximum retained lines
    max_lines: usize,
    /// Maximum retained bytes (0 = unlimited)
    max_bytes: usize,
    /// Current retained bytes
    current_bytes: usize,
    lines: VecDeque<BufferedLine>,
}

impl LineBuffer {
    /// Create a buffer bounded by line count and, if non-zero, bytes
    pub fn new(max_lines: usize, max_bytes: usize) -> Self {
        Self {
            max_lines,
            max_bytes,
            current_bytes: 0,
            lines: VecDeque::new(),
        }
    }

    /// Append a line, evicting the oldest as needed
    ///
    /// Returns the number of evicted lines. A line larger than the byte bound
    /// on its own is kept alone until the next push.
    pub fn push(&mut self, line: Arc<Line>) -> usize {
        let size = line.size();
        self.lines.push_back(BufferedLine { line, size });
        self.current_bytes += size;

        let mut evicted = 0;
        while self.lines.len() > self.max_lines || self.over_bytes() {
            match self.lines.pop_front() {
                Some(old) => {
                    self.current_bytes -= old.size;
                    evicted += 1;
                }
                None => break,
            }
        }
        evicted
    }

    fn over_bytes(&self) -> bool {
        self.max_bytes > 0 && self.current_bytes > self.max_bytes && self.lines.len() > 1
    }

    /// The newest `limit` retained lines, oldest first
    pub fn recent(&self, limit: usize) -> Vec<Arc<Line>> {
        let skip = self.lines.len().saturating_sub(limit);
        self.lines
            .iter()
            .skip(skip)
            .map(|b| Arc::clone(&b.line))
            .collect()
    }

    /// Number of retained lines
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Retained size in bytes
    pub fn size(&self) -> usize {
        self.current_bytes
    }

    /// Drop every retained line
    pub fn clear(&mut self) {
        self.lines.clear();
        self.current_bytes = 0;
    }
}
