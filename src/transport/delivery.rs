// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Delivery of sample batches to the remote collector.
//!
//! A batch is confirmed only when *every* sample in it was acknowledged.
//! Delivery never short-circuits: after the first failure the remaining
//! samples are still attempted, so the collector receives as much as
//! possible, but the batch as a whole is reported unconfirmed and the caller
//! must keep all of it. Duplicates at the collector are the accepted price.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::sample::PositionSample;

/// Why a single sample was not acknowledged.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// Connection refused, DNS failure, reset, ...
    #[error("transport error: {0}")]
    Transport(String),
    /// No response within the request timeout
    #[error("request timed out")]
    Timeout,
    /// Collector answered with something other than success
    #[error("collector returned status {0}")]
    Status(u16),
}

impl DeliveryError {
    /// Short label for metrics
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport",
            Self::Timeout => "timeout",
            Self::Status(_) => "status",
        }
    }
}

#[async_trait]
pub trait DeliveryClient: Send + Sync {
    /// Push one sample to the collector.
    async fn send(&self, sample: &PositionSample) -> Result<(), DeliveryError>;

    /// Push a batch; `true` only if every sample was acknowledged.
    async fn deliver(&self, batch: &[PositionSample]) -> bool {
        let mut failed = 0usize;

        for sample in batch {
            match self.send(sample).await {
                Ok(()) => {
                    crate::metrics::record_delivered(1);
                }
                Err(e) => {
                    failed += 1;
                    crate::metrics::record_delivery_error(e.kind());
                    debug!(timestamp = %sample.timestamp, error = %e, "Sample not acknowledged");
                }
            }
        }

        if failed > 0 {
            warn!(total = batch.len(), failed, "Batch not confirmed by collector");
        }
        failed == 0
    }
}

/// [`DeliveryClient::deliver`] bounded by a time budget that grows with
/// the batch: `per_sample × batch.len()`.
///
/// Running out of budget counts as an unconfirmed batch. The batch is
/// borrowed, so nothing is lost when the attempt is abandoned.
pub async fn deliver_within(client: &dyn DeliveryClient, batch: &[PositionSample], per_sample: Duration) -> bool {
    let budget = batch_budget(per_sample, batch.len());
    match tokio::time::timeout(budget, client.deliver(batch)).await {
        Ok(confirmed) => confirmed,
        Err(_) => {
            warn!(samples = batch.len(), ?budget, "Delivery budget exhausted");
            crate::metrics::record_delivery_error("budget");
            false
        }
    }
}

/// Total time allowed for a batch of `samples`.
fn batch_budget(per_sample: Duration, samples: usize) -> Duration {
    let samples = u32::try_from(samples.max(1)).unwrap_or(u32::MAX);
    per_sample.saturating_mul(samples)
}
