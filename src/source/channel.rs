//! In-process source fed through a tokio channel.
//!
//! For embedding the forwarder next to whatever produces readings, and for
//! driving the engine deterministically in tests.

use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::sample::PositionSample;
use super::{DeviceMode, SampleSource};

#[derive(Debug, Clone)]
pub enum SourceEvent {
    Sample(PositionSample),
    Mode(DeviceMode),
}

pub struct ChannelSource {
    rx: mpsc::UnboundedReceiver<SourceEvent>,
    mode: DeviceMode,
    latest: Option<PositionSample>,
}

impl ChannelSource {
    /// New source starting in `Active` mode, plus the sender that feeds it.
    pub fn new() -> (mpsc::UnboundedSender<SourceEvent>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self { rx, mode: DeviceMode::Active, latest: None })
    }

    /// Readings taken while inactive are discarded.
    fn apply(&mut self, event: SourceEvent) {
        match event {
            SourceEvent::Sample(_) if self.mode == DeviceMode::Inactive => {}
            SourceEvent::Sample(sample) => self.latest = Some(sample),
            SourceEvent::Mode(mode) => {
                if mode == DeviceMode::Inactive {
                    self.latest = None;
                }
                self.mode = mode;
            }
        }
    }

    /// Consume every event already queued.
    fn drain_ready(&mut self) {
        while let Ok(event) = self.rx.try_recv() {
            self.apply(event);
        }
    }
}

#[async_trait]
impl SampleSource for ChannelSource {
    async fn device_mode(&mut self) -> DeviceMode {
        self.drain_ready();
        self.mode
    }

    async fn poll_sample(&mut self, wait: Duration) -> Option<PositionSample> {
        self.drain_ready();
        if self.latest.is_none() {
            if let Ok(Some(event)) = tokio::time::timeout(wait, self.rx.recv()).await {
                self.apply(event);
                self.drain_ready();
            }
        }
        self.latest.take()
    }
}
