//! # Telemetry Forwarder
//!
//! Collects periodic position samples on an intermittently connected device
//! and gets every one of them to a remote HTTP collector, at least once and
//! in order.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        SampleSource                         │
//! │  • Latest fix per tick, heartbeat when there is none        │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        MemoryBuffer                         │
//! │  • Ordered, flushed on capacity / reachability / age        │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!            reachable?  ──yes──▶  DeliveryClient (HTTP GET)
//!                 │                      │ not confirmed
//!                 no                     ▼
//!                 └──────────────▶ ┌─────────────────────────────┐
//!                                  │   LocalStore (SQLite)       │
//!                                  │  • Append-only backlog      │
//!                                  │  • Drained all-or-nothing   │
//!                                  └─────────────────────────────┘
//! ```
//!
//! Delivery is at-least-once: a batch that partially went through is
//! treated as failed and sent again, so the collector may see duplicates
//! but never gaps.
//!
//! ## Modules
//!
//! - [`coordinator`]: The [`SyncEngine`] control loop
//! - [`batching`]: In-memory buffer and flush reasons
//! - [`storage`]: Durable local store (SQLite, in-memory)
//! - [`resilience`]: Backlog drain bookkeeping, startup retry
//! - [`transport`]: Collector delivery and reachability probing
//! - [`source`]: Input adapters and fix conversion
//! - [`config`]: Environment-driven configuration

pub mod config;
pub mod sample;
pub mod storage;
pub mod batching;
pub mod resilience;
pub mod transport;
pub mod source;
pub mod coordinator;
pub mod metrics;

pub use config::{ConfigError, ForwarderConfig};
pub use sample::PositionSample;
pub use coordinator::{SyncEngine, EngineState, EngineError, FlushOutcome, FlushTarget, TickReport};
pub use batching::memory_buffer::{MemoryBuffer, FlushReason};
pub use storage::traits::{LocalStore, StorageError, StoredSample, RowId};
pub use storage::sql::SqliteStore;
pub use storage::memory::InMemoryStore;
pub use resilience::backlog::{Backlog, BacklogStats, DrainOutcome};
pub use resilience::retry::RetryConfig;
pub use transport::{
    deliver_within, AlwaysAvailable, AvailabilityProbe, DeliveryClient, DeliveryError,
    HttpDeliveryClient, HttpProbe, ReachabilityTracker,
};
pub use source::{ChannelSource, DeviceMode, FixConverter, GpsFix, JsonLinesSource, SampleSource, SourceEvent};
