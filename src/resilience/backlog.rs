//! Durable backlog of undelivered samples.
//!
//! When the collector is unreachable or a delivery is not confirmed, the
//! batch is appended to the local store. Every tick the backlog is offered
//! to the collector again; rows are deleted only after the *whole* backlog
//! read for that attempt was confirmed.
//!
//! This is NOT an archive - it's a durability buffer. Rows in the backlog
//! are "in flight" to the collector, not a permanent storage location.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::sample::PositionSample;
use crate::storage::traits::{LocalStore, StorageError};
use crate::transport::delivery::{deliver_within, DeliveryClient};

/// Backlog state for observability
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BacklogStats {
    /// Rows currently in the store (best known)
    pub pending_samples: u64,
    /// Samples persisted since startup
    pub total_persisted: u64,
    /// Samples confirmed by the collector via resync since startup
    pub total_drained: u64,
    /// Whether a drain is in progress
    pub draining: bool,
}

/// Result of one drain attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// Another drain was already running
    Busy,
    /// Nothing stored
    Empty,
    /// Every row was confirmed. `cleared` is false if the delete failed,
    /// in which case those rows will be delivered again next time.
    Delivered { samples: usize, cleared: bool },
    /// At least one sample was not confirmed; the backlog is untouched
    Failed { samples: usize },
}

pub struct Backlog {
    store: Arc<dyn LocalStore>,
    pending_count: AtomicU64,
    total_persisted: AtomicU64,
    total_drained: AtomicU64,
    draining: AtomicBool,
}

impl Backlog {
    /// Ensure the store schema exists and count rows left by a previous run.
    ///
    /// Failure here means there is no durable store, which the forwarder
    /// treats as fatal.
    pub async fn open(store: Arc<dyn LocalStore>) -> Result<Self, StorageError> {
        store.init().await?;

        let pending = store.count().await?;
        if pending > 0 {
            warn!(pending, "Local store has samples from a previous run, will resync");
        } else {
            info!("Local store initialized");
        }
        crate::metrics::set_backlog_samples(pending);

        Ok(Self {
            store,
            pending_count: AtomicU64::new(pending),
            total_persisted: AtomicU64::new(0),
            total_drained: AtomicU64::new(0),
            draining: AtomicBool::new(false),
        })
    }

    /// Append a batch. On error nothing was written and the caller keeps the batch.
    pub async fn persist(&self, batch: &[PositionSample]) -> Result<(), StorageError> {
        if batch.is_empty() {
            return Ok(());
        }

        if let Err(e) = self.store.append(batch).await {
            crate::metrics::record_storage_error("append");
            return Err(e);
        }

        let pending = self.pending_count.fetch_add(batch.len() as u64, Ordering::AcqRel) + batch.len() as u64;
        self.total_persisted.fetch_add(batch.len() as u64, Ordering::Relaxed);
        crate::metrics::record_persisted(batch.len());
        crate::metrics::set_backlog_samples(pending);

        debug!(samples = batch.len(), pending, "Batch persisted to local store");
        Ok(())
    }

    /// Offer the whole backlog to the collector, allowing `per_sample` of
    /// delivery time for each stored row.
    ///
    /// Rows are cleared up to the highest id that was read, so anything
    /// appended while delivery was in flight survives. Read errors are
    /// returned; delivery failures are an `Ok(DrainOutcome::Failed)`.
    pub async fn drain_to(
        &self,
        client: &dyn DeliveryClient,
        per_sample: Duration,
    ) -> Result<DrainOutcome, StorageError> {
        if self.draining.swap(true, Ordering::AcqRel) {
            return Ok(DrainOutcome::Busy);
        }
        let _guard = DrainGuard(&self.draining);

        let rows = match self.store.read_all().await {
            Ok(rows) => rows,
            Err(e) => {
                crate::metrics::record_storage_error("read_all");
                return Err(e);
            }
        };
        let Some(through) = rows.last().map(|r| r.id) else {
            self.set_pending(0);
            return Ok(DrainOutcome::Empty);
        };

        let samples: Vec<PositionSample> = rows.into_iter().map(|r| r.sample).collect();
        let count = samples.len();
        info!(pending = count, "Resyncing local backlog");

        if !deliver_within(client, &samples, per_sample).await {
            warn!(samples = count, "Backlog resync failed, keeping stored samples");
            crate::metrics::record_resync("failed", count);
            return Ok(DrainOutcome::Failed { samples: count });
        }

        self.total_drained.fetch_add(count as u64, Ordering::Relaxed);
        crate::metrics::record_resync("success", count);

        let cleared = match self.store.clear(through).await {
            Ok(removed) => {
                debug!(removed, through, "Backlog rows cleared");
                true
            }
            Err(e) => {
                // Rows stay and will be re-sent; duplicates are acceptable.
                error!(error = %e, "Failed to clear backlog after successful resync");
                crate::metrics::record_storage_error("clear");
                false
            }
        };

        if cleared {
            self.refresh_pending().await;
            if self.pending_count.load(Ordering::Acquire) == 0 {
                if let Err(e) = self.store.compact().await {
                    warn!(error = %e, "Failed to compact local store after drain");
                }
            }
        }

        info!(samples = count, cleared, "Backlog resync complete");
        Ok(DrainOutcome::Delivered { samples: count, cleared })
    }

    /// Re-read the row count from the store.
    pub async fn refresh_pending(&self) {
        match self.store.count().await {
            Ok(n) => self.set_pending(n),
            Err(e) => warn!(error = %e, "Failed to count local store rows"),
        }
    }

    fn set_pending(&self, n: u64) {
        self.pending_count.store(n, Ordering::Release);
        crate::metrics::set_backlog_samples(n);
    }

    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.pending_count.load(Ordering::Acquire) > 0
    }

    #[must_use]
    pub fn stats(&self) -> BacklogStats {
        BacklogStats {
            pending_samples: self.pending_count.load(Ordering::Acquire),
            total_persisted: self.total_persisted.load(Ordering::Relaxed),
            total_drained: self.total_drained.load(Ordering::Relaxed),
            draining: self.draining.load(Ordering::Acquire),
        }
    }

}

/// RAII guard to reset draining flag.
struct DrainGuard<'a>(&'a AtomicBool);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
