//! Public types for the forwarder engine.

use thiserror::Error;

use crate::batching::memory_buffer::FlushReason;
use crate::resilience::backlog::DrainOutcome;
use crate::source::DeviceMode;
use crate::storage::traits::StorageError;

/// Engine lifecycle state.
///
/// Use [`super::SyncEngine::state()`] to check current state or
/// [`super::SyncEngine::state_receiver()`] to watch for changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Just created, not yet running
    Created,
    /// Waiting out the startup delay
    Starting,
    /// Between ticks
    Idle,
    /// Waiting for a reading
    Sampling,
    /// Delivering or persisting the memory buffer
    Flushing,
    /// Offering the stored backlog to the collector
    Resyncing,
    /// Sleeping after a failed cycle
    Cooldown,
    /// Final flush in progress
    ShuttingDown,
    /// Run loop exited
    Stopped,
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "Created"),
            Self::Starting => write!(f, "Starting"),
            Self::Idle => write!(f, "Idle"),
            Self::Sampling => write!(f, "Sampling"),
            Self::Flushing => write!(f, "Flushing"),
            Self::Resyncing => write!(f, "Resyncing"),
            Self::Cooldown => write!(f, "Cooldown"),
            Self::ShuttingDown => write!(f, "ShuttingDown"),
            Self::Stopped => write!(f, "Stopped"),
        }
    }
}

/// Where a flushed batch ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushTarget {
    /// Confirmed by the collector
    Collector,
    /// Appended to the local store
    Store,
    /// Store write failed; back in the memory buffer
    Memory,
}

impl FlushTarget {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Collector => "collector",
            Self::Store => "store",
            Self::Memory => "memory",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushOutcome {
    pub reason: FlushReason,
    pub samples: usize,
    pub target: FlushTarget,
}

/// What one tick did.
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub mode: DeviceMode,
    /// `"fix"` or `"heartbeat"`
    pub sampled: &'static str,
    /// `None` if no flush condition held
    pub flush: Option<FlushOutcome>,
    /// `None` if the collector was unreachable
    pub resync: Option<DrainOutcome>,
}

/// A failed cycle. The run loop logs it and cools down.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("local store error: {0}")]
    Storage(#[from] StorageError),
}
