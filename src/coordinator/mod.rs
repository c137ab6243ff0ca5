// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Forwarder engine.
//!
//! The [`SyncEngine`] owns every piece of mutable state (memory buffer,
//! backlog, source) and drives them from a single cooperative loop, so a
//! tick never races with another tick.
//!
//! # Tick
//!
//! ```text
//! Idle → Sampling → Flushing → Resyncing → Idle
//! ```
//!
//! 1. Take one sample from the source (a heartbeat if it has none).
//! 2. Append it to the memory buffer.
//! 3. Flush if the buffer is full, too old, or the collector is reachable:
//!    deliver when reachable, otherwise append to the local store.
//! 4. If reachable, offer the whole stored backlog to the collector and
//!    clear it only if every row was confirmed.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use telemetry_forwarder::{
//!     AlwaysAvailable, Backlog, ChannelSource, ForwarderConfig, HttpDeliveryClient,
//!     InMemoryStore, SyncEngine, EngineState,
//! };
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ForwarderConfig::default();
//! let backlog = Backlog::open(Arc::new(InMemoryStore::new())).await?;
//! let client = HttpDeliveryClient::new("http://collector:5055", "dev-1", config.request_timeout())?;
//! let (_tx, source) = ChannelSource::new();
//!
//! let mut engine = SyncEngine::new(
//!     config,
//!     backlog,
//!     Arc::new(client),
//!     Arc::new(AlwaysAvailable),
//!     Box::new(source),
//! );
//! assert_eq!(engine.state(), EngineState::Created);
//!
//! let report = engine.tick().await?;
//! println!("{:?}", report);
//! # Ok(())
//! # }
//! ```

mod flush;
mod lifecycle;
mod types;

pub use types::{EngineError, EngineState, FlushOutcome, FlushTarget, TickReport};

use std::sync::Arc;
use tokio::sync::watch;

use crate::batching::memory_buffer::MemoryBuffer;
use crate::config::ForwarderConfig;
use crate::resilience::backlog::{Backlog, BacklogStats};
use crate::source::{DeviceMode, SampleSource};
use crate::transport::delivery::DeliveryClient;
use crate::transport::probe::{AvailabilityProbe, ReachabilityTracker};

/// Single-owner control loop around the buffer, the backlog and the
/// collaborators.
pub struct SyncEngine {
    pub(super) config: ForwarderConfig,

    /// Engine state (broadcast to watchers)
    pub(super) state: watch::Sender<EngineState>,
    pub(super) state_rx: watch::Receiver<EngineState>,

    pub(super) buffer: MemoryBuffer,
    pub(super) backlog: Backlog,

    pub(super) client: Arc<dyn DeliveryClient>,
    pub(super) reachability: ReachabilityTracker,
    pub(super) source: Box<dyn SampleSource>,

    /// Mode seen on the previous tick, for change logging
    pub(super) mode: DeviceMode,
}

impl SyncEngine {
    /// Create an engine in `Created` state. Nothing runs until
    /// [`tick()`](Self::tick) or [`run()`](Self::run) is called.
    pub fn new(
        config: ForwarderConfig,
        backlog: Backlog,
        client: Arc<dyn DeliveryClient>,
        probe: Arc<dyn AvailabilityProbe>,
        source: Box<dyn SampleSource>,
    ) -> Self {
        let (state_tx, state_rx) = watch::channel(EngineState::Created);
        let reachability = ReachabilityTracker::new(probe, config.probe_timeout());

        Self {
            buffer: MemoryBuffer::new(config.buffer_size),
            config,
            state: state_tx,
            state_rx,
            backlog,
            client,
            reachability,
            source,
            mode: DeviceMode::Active,
        }
    }

    /// Get current engine state.
    #[must_use]
    pub fn state(&self) -> EngineState {
        *self.state_rx.borrow()
    }

    /// Get a receiver to watch state changes.
    #[must_use]
    pub fn state_receiver(&self) -> watch::Receiver<EngineState> {
        self.state_rx.clone()
    }

    /// Samples waiting in memory.
    #[must_use]
    pub fn buffer_len(&self) -> usize {
        self.buffer.len()
    }

    #[must_use]
    pub fn backlog_stats(&self) -> BacklogStats {
        self.backlog.stats()
    }

    /// Last reachability answer.
    #[must_use]
    pub fn is_reachable(&self) -> bool {
        self.reachability.is_reachable()
    }

    pub(super) fn set_state(&self, state: EngineState) {
        let _ = self.state.send(state);
    }
}
