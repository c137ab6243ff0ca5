//! Shared fakes for the engine-level tests.
//!
//! - [`Collector`]: scriptable `DeliveryClient` that records what it accepted
//! - [`Switch`]: `AvailabilityProbe` flipped from the test
//! - [`FailingStore`]: `LocalStore` wrapper with per-operation error injection
//! - [`Harness`]: an engine wired to all of the above plus a `ChannelSource`

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc::UnboundedSender;

use telemetry_forwarder::{
    AvailabilityProbe, Backlog, ChannelSource, DeliveryClient, DeliveryError, DeviceMode,
    ForwarderConfig, InMemoryStore, LocalStore, PositionSample, RowId, SourceEvent, StorageError,
    StoredSample, SyncEngine,
};

// =============================================================================
// Samples
// =============================================================================

/// A fix whose latitude doubles as its sequence number.
pub fn fix(n: u32) -> PositionSample {
    PositionSample::at(format!("2025-01-01T00:00:00.{:06}Z", n)).with_position(f64::from(n), 0.0)
}

/// Sequence numbers of fixes, heartbeats skipped.
pub fn seqs(samples: &[PositionSample]) -> Vec<u32> {
    samples.iter().filter_map(|s| s.lat).map(|lat| lat as u32).collect()
}

pub fn test_config(buffer_size: usize) -> ForwarderConfig {
    ForwarderConfig {
        buffer_size,
        server_url: "http://collector.test".into(),
        update_frequency_secs: 1,
        offroad_update_factor: 10,
        probe_url: None,
        probe_timeout_secs: 1,
        delivery_budget_secs: 5,
        sample_wait_secs: 0,
        error_cooldown_secs: 10,
        startup_delay_secs: 0,
        ..Default::default()
    }
}

// =============================================================================
// Collector
// =============================================================================

/// Accepts or rejects samples on command. `fail_calls` are 1-indexed
/// `send` call numbers that fail once regardless of `accepting`.
pub struct Collector {
    accepting: AtomicBool,
    hang: AtomicBool,
    delay: Mutex<Duration>,
    calls: AtomicUsize,
    fail_calls: Mutex<Vec<usize>>,
    received: Mutex<Vec<PositionSample>>,
}

impl Collector {
    pub fn new(accepting: bool) -> Arc<Self> {
        Arc::new(Self {
            accepting: AtomicBool::new(accepting),
            hang: AtomicBool::new(false),
            delay: Mutex::new(Duration::ZERO),
            calls: AtomicUsize::new(0),
            fail_calls: Mutex::new(Vec::new()),
            received: Mutex::new(Vec::new()),
        })
    }

    pub fn set_accepting(&self, accepting: bool) {
        self.accepting.store(accepting, Ordering::SeqCst);
    }

    /// Make every `send` block forever.
    pub fn set_hang(&self, hang: bool) {
        self.hang.store(hang, Ordering::SeqCst);
    }

    /// Time every `send` takes before answering.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = delay;
    }

    pub fn fail_calls(&self, calls: &[usize]) {
        *self.fail_calls.lock() = calls.to_vec();
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn received(&self) -> Vec<PositionSample> {
        self.received.lock().clone()
    }

    pub fn received_seqs(&self) -> Vec<u32> {
        seqs(&self.received())
    }
}

#[async_trait]
impl DeliveryClient for Collector {
    async fn send(&self, sample: &PositionSample) -> Result<(), DeliveryError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;

        if self.hang.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        let delay = *self.delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if !self.accepting.load(Ordering::SeqCst) || self.fail_calls.lock().contains(&call) {
            return Err(DeliveryError::Status(503));
        }

        self.received.lock().push(sample.clone());
        Ok(())
    }
}

// =============================================================================
// Probe
// =============================================================================

pub struct Switch {
    up: AtomicBool,
    hang: AtomicBool,
}

impl Switch {
    pub fn new(up: bool) -> Arc<Self> {
        Arc::new(Self { up: AtomicBool::new(up), hang: AtomicBool::new(false) })
    }

    pub fn set(&self, up: bool) {
        self.up.store(up, Ordering::SeqCst);
    }

    pub fn set_hang(&self, hang: bool) {
        self.hang.store(hang, Ordering::SeqCst);
    }
}

#[async_trait]
impl AvailabilityProbe for Switch {
    async fn is_available(&self) -> bool {
        if self.hang.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        self.up.load(Ordering::SeqCst)
    }
}

// =============================================================================
// Failing Store Wrapper - Precise Error Injection
// =============================================================================

pub struct FailingStore {
    inner: InMemoryStore,
    pub fail_append: AtomicBool,
    pub fail_read: AtomicBool,
    pub fail_clear: AtomicBool,
    clear_calls: AtomicUsize,
}

impl FailingStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: InMemoryStore::new(),
            fail_append: AtomicBool::new(false),
            fail_read: AtomicBool::new(false),
            fail_clear: AtomicBool::new(false),
            clear_calls: AtomicUsize::new(0),
        })
    }

    pub fn samples(&self) -> Vec<PositionSample> {
        self.inner.samples()
    }

    pub fn clear_calls(&self) -> usize {
        self.clear_calls.load(Ordering::SeqCst)
    }

    fn maybe_fail(flag: &AtomicBool, op: &str) -> Result<(), StorageError> {
        if flag.load(Ordering::SeqCst) {
            Err(StorageError::Backend(format!("injected {} failure", op)))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl LocalStore for FailingStore {
    async fn init(&self) -> Result<(), StorageError> {
        self.inner.init().await
    }

    async fn append(&self, batch: &[PositionSample]) -> Result<(), StorageError> {
        Self::maybe_fail(&self.fail_append, "append")?;
        self.inner.append(batch).await
    }

    async fn read_all(&self) -> Result<Vec<StoredSample>, StorageError> {
        Self::maybe_fail(&self.fail_read, "read")?;
        self.inner.read_all().await
    }

    async fn clear(&self, through: RowId) -> Result<u64, StorageError> {
        self.clear_calls.fetch_add(1, Ordering::SeqCst);
        Self::maybe_fail(&self.fail_clear, "clear")?;
        self.inner.clear(through).await
    }

    async fn count(&self) -> Result<u64, StorageError> {
        self.inner.count().await
    }
}

// =============================================================================
// Harness
// =============================================================================

pub struct Harness {
    pub engine: SyncEngine,
    pub input: UnboundedSender<SourceEvent>,
    pub probe: Arc<Switch>,
    pub collector: Arc<Collector>,
    pub store: Arc<dyn LocalStore>,
}

impl Harness {
    pub async fn new(config: ForwarderConfig, store: Arc<dyn LocalStore>) -> Self {
        let backlog = Backlog::open(store.clone()).await.unwrap();
        let probe = Switch::new(true);
        let collector = Collector::new(true);
        let (input, source) = ChannelSource::new();

        let engine = SyncEngine::new(
            config,
            backlog,
            collector.clone(),
            probe.clone(),
            Box::new(source),
        );

        Self { engine, input, probe, collector, store }
    }

    pub async fn in_memory(buffer_size: usize) -> Self {
        Self::new(test_config(buffer_size), Arc::new(InMemoryStore::new())).await
    }

    pub fn send_fix(&self, n: u32) {
        self.input.send(SourceEvent::Sample(fix(n))).unwrap();
    }

    pub fn set_mode(&self, mode: DeviceMode) {
        self.input.send(SourceEvent::Mode(mode)).unwrap();
    }

    pub async fn stored(&self) -> Vec<PositionSample> {
        self.store.read_all().await.unwrap().into_iter().map(|r| r.sample).collect()
    }

    pub async fn stored_seqs(&self) -> Vec<u32> {
        seqs(&self.stored().await)
    }
}
