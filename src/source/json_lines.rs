// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Newline-delimited JSON bus adapter.
//!
//! Reads messages like
//!
//! ```text
//! {"type":"fix","latitude":52.1,"longitude":4.3,"speed":3.2,"vNED":[1.0,0.5,0.0]}
//! {"type":"device_state","started":false}
//! ```
//!
//! from any async line reader (stdin in the binary). Readings are
//! conflated: each poll returns only the newest fix received since the
//! previous poll. Malformed lines are logged and skipped.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

use crate::sample::PositionSample;
use super::{DeviceMode, FixConverter, GpsFix, SampleSource};

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum BusMessage {
    Fix(GpsFix),
    DeviceState { started: bool },
}

pub struct JsonLinesSource<R> {
    lines: Lines<R>,
    converter: FixConverter,
    mode: DeviceMode,
    pending_fix: Option<GpsFix>,
    closed: bool,
}

impl<R: AsyncBufRead + Unpin + Send> JsonLinesSource<R> {
    pub fn new(reader: R, speed_factor: f64) -> Self {
        Self {
            lines: reader.lines(),
            converter: FixConverter::new(speed_factor),
            mode: DeviceMode::Active,
            pending_fix: None,
            closed: false,
        }
    }

    /// Apply one line; returns true if it carried a fix.
    fn handle_line(&mut self, line: &str) -> bool {
        let line = line.trim();
        if line.is_empty() {
            return false;
        }
        match serde_json::from_str::<BusMessage>(line) {
            Ok(BusMessage::Fix(_)) if self.mode == DeviceMode::Inactive => {
                debug!("Dropping fix received while inactive");
                false
            }
            Ok(BusMessage::Fix(fix)) => {
                self.pending_fix = Some(fix);
                true
            }
            Ok(BusMessage::DeviceState { started }) => {
                let mode = DeviceMode::from_started(started);
                debug!(%mode, "Device state message");
                if mode == DeviceMode::Inactive {
                    self.pending_fix = None;
                }
                self.mode = mode;
                false
            }
            Err(e) => {
                warn!(error = %e, "Skipping malformed bus message");
                false
            }
        }
    }

    /// Read lines until `deadline`, or until a fix arrived and nothing
    /// more is immediately available.
    async fn read_until(&mut self, deadline: Instant) {
        let mut have_fix = self.pending_fix.is_some();
        while !self.closed {
            let until = if have_fix { Instant::now() } else { deadline };
            match timeout_at(until, self.lines.next_line()).await {
                Ok(Ok(Some(line))) => {
                    have_fix |= self.handle_line(&line);
                }
                Ok(Ok(None)) => {
                    info!("Bus input closed, continuing with heartbeats");
                    self.closed = true;
                }
                Ok(Err(e)) => {
                    warn!(error = %e, "Bus input failed, continuing with heartbeats");
                    self.closed = true;
                }
                Err(_) => break,
            }
        }
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> SampleSource for JsonLinesSource<R> {
    async fn device_mode(&mut self) -> DeviceMode {
        self.read_until(Instant::now()).await;
        self.mode
    }

    async fn poll_sample(&mut self, wait: Duration) -> Option<PositionSample> {
        self.read_until(Instant::now() + wait).await;
        let fix = self.pending_fix.take()?;
        Some(self.converter.convert(&fix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncWriteExt, BufReader};

    #[tokio::test]
    async fn test_reads_fix_and_conflates() {
        let input = concat!(
            r#"{"type":"fix","latitude":1.0,"longitude":1.0}"#, "\n",
            r#"{"type":"fix","latitude":2.0,"longitude":2.0,"speed":4.0}"#, "\n",
        );
        let mut source = JsonLinesSource::new(BufReader::new(input.as_bytes()), 1.0);

        let sample = source.poll_sample(Duration::from_millis(50)).await.unwrap();
        assert_eq!(sample.lat, Some(2.0));
        assert_eq!(sample.speed, Some(4.0));
        assert!(source.poll_sample(Duration::from_millis(10)).await.is_none());
        assert!(source.closed);
    }

    #[tokio::test]
    async fn test_device_state_and_malformed_lines() {
        let input = concat!(
            "not json\n",
            r#"{"type":"device_state","started":false}"#, "\n",
            r#"{"type":"unknown"}"#, "\n",
        );
        let mut source = JsonLinesSource::new(BufReader::new(input.as_bytes()), 1.0);

        assert_eq!(source.device_mode().await, DeviceMode::Inactive);
        assert!(source.poll_sample(Duration::from_millis(10)).await.is_none());
    }

    #[tokio::test]
    async fn test_fixes_while_inactive_are_dropped() {
        let input = concat!(
            r#"{"type":"fix","latitude":1.0,"longitude":1.0}"#, "\n",
            r#"{"type":"device_state","started":false}"#, "\n",
            r#"{"type":"fix","latitude":2.0,"longitude":2.0}"#, "\n",
            r#"{"type":"device_state","started":true}"#, "\n",
        );
        let mut source = JsonLinesSource::new(BufReader::new(input.as_bytes()), 1.0);

        // A stale position must not go out stamped with a fresh time.
        assert_eq!(source.device_mode().await, DeviceMode::Active);
        assert!(source.poll_sample(Duration::from_millis(10)).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_for_fix_until_deadline() {
        let (reader, mut writer) = tokio::io::duplex(1024);
        let mut source = JsonLinesSource::new(BufReader::new(reader), 1.0);

        assert!(source.poll_sample(Duration::from_secs(5)).await.is_none());
        assert!(!source.closed);

        writer
            .write_all(b"{\"type\":\"fix\",\"latitude\":3.0,\"longitude\":4.0}\n")
            .await
            .unwrap();
        let sample = source.poll_sample(Duration::from_secs(5)).await.unwrap();
        assert_eq!(sample.lon, Some(4.0));
    }
}
