// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Network reachability probing.
//!
//! The probe is advisory: it only saves pointless delivery attempts while
//! offline. A wrong answer costs at most one failed delivery (which then
//! lands in the local store) or one extra tick of buffering.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default well-known endpoint used to test general connectivity.
pub const DEFAULT_PROBE_URL: &str = "http://www.google.com";

#[async_trait]
pub trait AvailabilityProbe: Send + Sync {
    /// `true` if the network looks usable right now.
    async fn is_available(&self) -> bool;
}

/// `GET` against a fixed URL; reachable means `200 OK` within the timeout.
pub struct HttpProbe {
    client: Client,
    url: String,
}

impl HttpProbe {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            url: url.into(),
        })
    }
}

#[async_trait]
impl AvailabilityProbe for HttpProbe {
    async fn is_available(&self) -> bool {
        match self.client.get(&self.url).send().await {
            Ok(resp) if resp.status() == StatusCode::OK => true,
            Ok(resp) => {
                debug!(url = %self.url, status = resp.status().as_u16(), "Probe got non-success status");
                false
            }
            Err(e) => {
                debug!(url = %self.url, error = %e, "Probe request failed");
                false
            }
        }
    }
}

/// Probe that always answers yes. Used when probing is disabled; delivery
/// failures then take the normal fallback path.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysAvailable;

#[async_trait]
impl AvailabilityProbe for AlwaysAvailable {
    async fn is_available(&self) -> bool {
        true
    }
}

/// Wraps a probe with a hard timeout and remembers the last answer so
/// reachability changes are logged once instead of every tick.
pub struct ReachabilityTracker {
    probe: Arc<dyn AvailabilityProbe>,
    timeout: Duration,
    /// Last known state
    reachable: AtomicBool,
    checked: AtomicBool,
    /// Consecutive unreachable answers
    failures: AtomicU64,
}

impl ReachabilityTracker {
    pub fn new(probe: Arc<dyn AvailabilityProbe>, timeout: Duration) -> Self {
        Self {
            probe,
            timeout,
            reachable: AtomicBool::new(false),
            checked: AtomicBool::new(false),
            failures: AtomicU64::new(0),
        }
    }

    /// Ask the probe, bounded by the tracker's timeout.
    pub async fn check(&self) -> bool {
        let available = match tokio::time::timeout(self.timeout, self.probe.is_available()).await {
            Ok(available) => available,
            Err(_) => {
                debug!(timeout = ?self.timeout, "Reachability probe timed out");
                false
            }
        };

        if available {
            self.record_success();
        } else {
            self.record_failure();
        }
        available
    }

    fn record_success(&self) {
        let first = !self.checked.swap(true, Ordering::AcqRel);
        let was = self.reachable.swap(true, Ordering::AcqRel);
        let failures = self.failures.swap(0, Ordering::AcqRel);
        if first || !was {
            info!(after_failures = failures, "Collector network reachable");
        }
        crate::metrics::set_reachable(true);
    }

    fn record_failure(&self) {
        let first = !self.checked.swap(true, Ordering::AcqRel);
        let was = self.reachable.swap(false, Ordering::AcqRel);
        let failures = self.failures.fetch_add(1, Ordering::AcqRel) + 1;
        if first || was {
            warn!(failures, "Collector network unreachable, samples will be held locally");
        }
        crate::metrics::set_reachable(false);
    }

    /// Last answer (false before the first check).
    #[must_use]
    pub fn is_reachable(&self) -> bool {
        self.reachable.load(Ordering::Acquire)
    }

    /// Consecutive unreachable answers.
    #[must_use]
    pub fn failure_count(&self) -> u64 {
        self.failures.load(Ordering::Acquire)
    }
}
