// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! In-process buffer of samples collected since the last flush.
//!
//! The [`MemoryBuffer`] is append-only until it is drained. Its capacity is a
//! flush *trigger*, not a drop limit: if neither delivery nor persistence can
//! keep up the buffer grows past capacity rather than lose a sample.
//!
//! # Example
//!
//! ```
//! use telemetry_forwarder::{MemoryBuffer, PositionSample};
//!
//! let mut buffer = MemoryBuffer::new(2);
//! buffer.append(PositionSample::heartbeat());
//! assert!(!buffer.at_capacity());
//! buffer.append(PositionSample::heartbeat());
//! assert!(buffer.at_capacity());
//!
//! let batch = buffer.drain_all();
//! assert_eq!(batch.len(), 2);
//! assert!(buffer.is_empty());
//! ```

use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use crate::sample::PositionSample;

/// Why a buffer flush happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushReason {
    /// Buffer reached its configured capacity
    Capacity,
    /// Collector looked reachable this tick
    Reachable,
    /// Oldest buffered sample exceeded the max age
    Age,
    /// Graceful shutdown
    Shutdown,
}

impl FlushReason {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Capacity => "capacity",
            Self::Reachable => "reachable",
            Self::Age => "age",
            Self::Shutdown => "shutdown",
        }
    }
}

impl std::fmt::Display for FlushReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bounded, ordered sequence of samples awaiting a flush.
#[derive(Debug)]
pub struct MemoryBuffer {
    capacity: usize,
    samples: Vec<PositionSample>,
    /// Set when the first sample lands in an empty buffer
    oldest_at: Option<Instant>,
}

impl MemoryBuffer {
    /// Create a buffer that asks to be flushed once it holds `capacity` samples.
    /// A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            samples: Vec::with_capacity(capacity),
            oldest_at: None,
        }
    }

    pub fn append(&mut self, sample: PositionSample) {
        if self.samples.is_empty() {
            self.oldest_at = Some(Instant::now());
        }
        self.samples.push(sample);
    }

    /// Put an unflushed batch back in front of anything buffered since,
    /// keeping original order.
    pub fn requeue_front(&mut self, mut batch: Vec<PositionSample>) {
        if batch.is_empty() {
            return;
        }
        debug!(requeued = batch.len(), buffered = self.samples.len(), "Batch returned to memory buffer");
        batch.append(&mut self.samples);
        self.samples = batch;
        if self.oldest_at.is_none() {
            self.oldest_at = Some(Instant::now());
        }
    }

    /// Remove and return every buffered sample.
    pub fn drain_all(&mut self) -> Vec<PositionSample> {
        self.oldest_at = None;
        std::mem::take(&mut self.samples)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn at_capacity(&self) -> bool {
        self.samples.len() >= self.capacity
    }

    /// Time since the oldest buffered sample arrived.
    #[must_use]
    pub fn age(&self) -> Option<Duration> {
        self.oldest_at.map(|t| t.elapsed())
    }

    /// Buffered samples, oldest first.
    #[must_use]
    pub fn samples(&self) -> &[PositionSample] {
        &self.samples
    }
}
