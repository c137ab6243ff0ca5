// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Bounded retry with exponential backoff.
//!
//! Only used where giving up is the right answer: opening the local store at
//! startup. Delivery never goes through here; its retry is the control loop
//! itself (every tick, forever).
//!
//! # Example
//!
//! ```
//! use telemetry_forwarder::RetryConfig;
//! use std::time::Duration;
//!
//! let startup = RetryConfig::startup();
//! assert_eq!(startup.max_retries, 5);
//! assert_eq!(startup.delay_after(1), Duration::from_millis(400));
//! ```

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

/// Backoff schedule for a retried operation.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub factor: f64,
    /// Total attempts, including the first
    pub max_retries: usize,
}

impl RetryConfig {
    /// Fast-fail schedule for opening storage at startup.
    /// 5 attempts, ~3 seconds in total.
    #[must_use]
    pub fn startup() -> Self {
        Self {
            max_retries: 5,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(2),
            factor: 2.0,
        }
    }

    /// Minimal delays for tests
    #[cfg(test)]
    pub fn test() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(10),
            factor: 2.0,
        }
    }

    /// Delay to wait after the given (0-based) failed attempt.
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let scaled = self.initial_delay.mul_f64(self.factor.powi(attempt as i32));
        scaled.min(self.max_delay)
    }
}

/// Run `operation` until it succeeds or `config.max_retries` attempts fail.
/// The last error is returned.
pub async fn retry<F, Fut, T, E>(
    operation_name: &str,
    config: &RetryConfig,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt: u32 = 0;

    loop {
        match operation().await {
            Ok(val) => {
                if attempt > 0 {
                    info!(operation = operation_name, retries = attempt, "Operation succeeded after retry");
                }
                return Ok(val);
            }
            Err(err) => {
                if attempt as usize + 1 >= config.max_retries {
                    return Err(err);
                }

                let delay = config.delay_after(attempt);
                warn!(
                    operation = operation_name,
                    attempt = attempt + 1,
                    max = config.max_retries,
                    error = %err,
                    ?delay,
                    "Operation failed, retrying"
                );

                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
