//! Buffer flushing and backlog resync.
//!
//! A flushed batch goes to exactly one place: the collector (confirmed),
//! the local store, or, if the store write fails, back into memory.

use tracing::{debug, error, info};

use crate::batching::memory_buffer::FlushReason;
use crate::resilience::backlog::DrainOutcome;
use crate::transport::delivery::deliver_within;

use super::{EngineError, EngineState, FlushOutcome, FlushTarget, SyncEngine};

impl SyncEngine {
    /// Which flush condition holds, given this tick's reachability answer.
    pub(super) fn flush_reason(&self, available: bool) -> Option<FlushReason> {
        if self.buffer.is_empty() {
            return None;
        }
        if self.buffer.at_capacity() {
            return Some(FlushReason::Capacity);
        }
        if let (Some(max_age), Some(age)) = (self.config.buffer_max_age(), self.buffer.age()) {
            if age >= max_age {
                return Some(FlushReason::Age);
            }
        }
        available.then_some(FlushReason::Reachable)
    }

    /// Drain the memory buffer and hand the batch on.
    pub(super) async fn flush_buffer(&mut self, reason: FlushReason, available: bool) -> FlushOutcome {
        self.set_state(EngineState::Flushing);

        let batch = self.buffer.drain_all();
        let samples = batch.len();
        debug!(%reason, samples, available, "Flushing memory buffer");

        let target = if available && deliver_within(self.client.as_ref(), &batch, self.config.delivery_budget()).await {
            debug!(samples, "Batch confirmed by collector");
            FlushTarget::Collector
        } else {
            match self.backlog.persist(&batch).await {
                Ok(()) => {
                    if available {
                        info!(samples, "Delivery failed, batch moved to local store");
                    }
                    FlushTarget::Store
                }
                Err(e) => {
                    error!(
                        error = %e,
                        samples,
                        "Failed to persist batch, keeping it in memory until next tick"
                    );
                    self.buffer.requeue_front(batch);
                    FlushTarget::Memory
                }
            }
        };

        crate::metrics::record_flush(reason.as_str(), target.as_str(), samples);
        crate::metrics::set_buffer_samples(self.buffer.len());

        FlushOutcome { reason, samples, target }
    }

    /// Offer the stored backlog to the collector if it is reachable.
    ///
    /// Returns `None` when the probe said no. A store read error fails the
    /// cycle; an unconfirmed delivery does not.
    pub(super) async fn resync_backlog(&mut self) -> Result<Option<DrainOutcome>, EngineError> {
        if !self.reachability.check().await {
            if self.backlog.has_pending() {
                debug!(pending = self.backlog.stats().pending_samples, "Collector unreachable, backlog waits");
            }
            return Ok(None);
        }

        self.set_state(EngineState::Resyncing);
        let outcome = self
            .backlog
            .drain_to(self.client.as_ref(), self.config.delivery_budget())
            .await?;
        Ok(Some(outcome))
    }
}
