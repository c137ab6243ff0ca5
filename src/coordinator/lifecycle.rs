//! Engine lifecycle: tick, run loop, shutdown.

use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::batching::memory_buffer::FlushReason;
use crate::sample::PositionSample;
use crate::source::DeviceMode;

use super::{EngineError, EngineState, FlushTarget, SyncEngine, TickReport};

impl SyncEngine {
    /// Run one cycle: sample, buffer, maybe flush, resync.
    ///
    /// Delivery failures and store write failures are absorbed here (the
    /// samples stay in the store or in memory). Only a failure to read the
    /// backlog is returned, and the caller decides how long to back off.
    pub async fn tick(&mut self) -> Result<TickReport, EngineError> {
        let mode = self.observe_mode().await;

        self.set_state(EngineState::Sampling);
        let reading = match mode {
            DeviceMode::Active => self.source.poll_sample(self.config.sample_wait()).await,
            DeviceMode::Inactive => None,
        };
        let sample = reading.unwrap_or_else(PositionSample::heartbeat);
        let sampled = sample.kind();

        crate::metrics::record_sample(sampled);
        self.buffer.append(sample);
        crate::metrics::set_buffer_samples(self.buffer.len());

        let available = self.reachability.check().await;
        let flush = match self.flush_reason(available) {
            Some(reason) => Some(self.flush_buffer(reason, available).await),
            None => {
                debug!(buffered = self.buffer.len(), "No flush condition, holding samples");
                None
            }
        };

        let resync = self.resync_backlog().await?;

        self.set_state(EngineState::Idle);
        Ok(TickReport { mode, sampled, flush, resync })
    }

    /// Tick interval for a device mode.
    #[must_use]
    pub fn interval_for(&self, mode: DeviceMode) -> Duration {
        match mode {
            DeviceMode::Active => self.config.active_interval(),
            DeviceMode::Inactive => self.config.inactive_interval(),
        }
    }

    async fn observe_mode(&mut self) -> DeviceMode {
        let mode = self.source.device_mode().await;
        if mode != self.mode {
            info!(
                from = %self.mode,
                to = %mode,
                interval = ?self.interval_for(mode),
                "Device mode changed"
            );
            self.mode = mode;
        }
        mode
    }

    /// Run until `shutdown` turns true (or its sender is dropped), then
    /// flush what is left in memory.
    ///
    /// A failed cycle is logged and followed by the error cooldown; the loop
    /// itself never gives up.
    #[tracing::instrument(skip(self, shutdown))]
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        self.set_state(EngineState::Starting);
        info!(
            collector = %self.config.collector_url(),
            device_id = %self.config.device_id,
            buffer_size = self.config.buffer_size,
            interval = ?self.config.active_interval(),
            pending = self.backlog.stats().pending_samples,
            "Forwarder starting"
        );

        let delay = self.config.startup_delay();
        if !delay.is_zero() {
            info!(?delay, "Waiting before first tick");
            if wait_or_shutdown(&mut shutdown, delay).await {
                self.shutdown().await;
                return;
            }
        }

        self.set_state(EngineState::Idle);
        info!("Forwarder running");

        loop {
            let started = Instant::now();

            let pause = match self.tick().await {
                Ok(report) => self.interval_for(report.mode).saturating_sub(started.elapsed()),
                Err(e) => {
                    let cooldown = self.config.error_cooldown();
                    error!(error = %e, ?cooldown, "Forwarder cycle failed, cooling down");
                    crate::metrics::record_cycle_error();
                    self.set_state(EngineState::Cooldown);
                    cooldown
                }
            };

            if wait_or_shutdown(&mut shutdown, pause).await {
                break;
            }
            self.set_state(EngineState::Idle);
        }

        self.shutdown().await;
    }

    /// Final flush. Delivered if the collector is reachable, otherwise
    /// persisted so a clean exit loses nothing.
    #[tracing::instrument(skip(self))]
    pub async fn shutdown(&mut self) {
        let shutdown_start = std::time::Instant::now();
        self.set_state(EngineState::ShuttingDown);
        info!(buffered = self.buffer.len(), "Initiating forwarder shutdown...");

        if !self.buffer.is_empty() {
            let available = self.reachability.check().await;
            let outcome = self.flush_buffer(FlushReason::Shutdown, available).await;
            if outcome.target == FlushTarget::Memory {
                warn!(samples = outcome.samples, "Final flush failed, buffered samples are lost");
            }
        }

        self.set_state(EngineState::Stopped);
        info!(
            pending = self.backlog.stats().pending_samples,
            elapsed = ?shutdown_start.elapsed(),
            "Forwarder shutdown complete"
        );
    }
}

/// Sleep for `pause`, returning early with `true` if shutdown was requested.
async fn wait_or_shutdown(shutdown: &mut watch::Receiver<bool>, pause: Duration) -> bool {
    if *shutdown.borrow() {
        return true;
    }

    let sleep = tokio::time::sleep(pause);
    tokio::pin!(sleep);

    loop {
        tokio::select! {
            _ = &mut sleep => return false,
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    return true;
                }
            }
        }
    }
}
