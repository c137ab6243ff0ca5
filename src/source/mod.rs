// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Input side: where samples come from.
//!
//! The engine only sees a [`SampleSource`]: "what mode is the device in"
//! and "give me the latest reading, waiting at most this long". Adapters
//! turn raw receiver fixes ([`GpsFix`]) into [`PositionSample`]s, filling in
//! speed and bearing when the receiver leaves them out.

pub mod channel;
pub mod json_lines;

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use crate::sample::{utc_timestamp_now, PositionSample};

pub use channel::{ChannelSource, SourceEvent};
pub use json_lines::JsonLinesSource;

/// Whether the device is in use. Drives the tick cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceMode {
    /// In use: poll for fixes every tick
    Active,
    /// Parked / low power: heartbeat only, at a coarser cadence
    Inactive,
}

impl DeviceMode {
    #[must_use]
    pub fn from_started(started: bool) -> Self {
        if started { Self::Active } else { Self::Inactive }
    }
}

impl std::fmt::Display for DeviceMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Inactive => write!(f, "inactive"),
        }
    }
}

#[async_trait]
pub trait SampleSource: Send {
    /// Current device mode, after consuming any state updates already available.
    async fn device_mode(&mut self) -> DeviceMode;

    /// The latest reading since the last call, waiting at most `wait` for one.
    async fn poll_sample(&mut self, wait: Duration) -> Option<PositionSample>;
}

/// Raw receiver reading.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GpsFix {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub altitude: Option<f64>,
    #[serde(default)]
    pub speed: Option<f64>,
    #[serde(default, alias = "bearingDeg")]
    pub bearing_deg: Option<f64>,
    #[serde(default, alias = "horizontalAccuracy")]
    pub horizontal_accuracy: Option<f64>,
    /// Velocity north/east/down, m/s
    #[serde(default, alias = "vNED")]
    pub v_ned: Option<[f64; 3]>,
}

/// Initial great-circle bearing from the first point to the second, in
/// degrees normalized to `[0, 360)`.
#[must_use]
pub fn bearing_between(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lon = (lon2 - lon1).to_radians();
    let (lat1, lat2) = (lat1.to_radians(), lat2.to_radians());

    let x = d_lon.sin() * lat2.cos();
    let y = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * d_lon.cos();

    (x.atan2(y).to_degrees() + 360.0) % 360.0
}

/// Magnitude of a velocity vector.
#[must_use]
pub fn speed_from_velocity(v: [f64; 3]) -> f64 {
    (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt()
}

/// Turns fixes into samples, remembering the previous position so a
/// missing bearing can be derived from the direction of travel.
#[derive(Debug, Clone)]
pub struct FixConverter {
    speed_factor: f64,
    previous: Option<(f64, f64)>,
}

impl FixConverter {
    pub fn new(speed_factor: f64) -> Self {
        Self { speed_factor, previous: None }
    }

    /// Convert a fix stamped with the current time.
    pub fn convert(&mut self, fix: &GpsFix) -> PositionSample {
        self.convert_at(fix, utc_timestamp_now())
    }

    pub fn convert_at(&mut self, fix: &GpsFix, timestamp: String) -> PositionSample {
        let speed = fix
            .speed
            .filter(|s| *s > 0.0)
            .or_else(|| fix.v_ned.map(speed_from_velocity))
            .map(|s| s * self.speed_factor);

        // A reported bearing of exactly 0 is how receivers say "unknown".
        let bearing = fix.bearing_deg.filter(|b| *b != 0.0).or_else(|| {
            self.previous
                .map(|(lat, lon)| bearing_between(lat, lon, fix.latitude, fix.longitude))
        });

        self.previous = Some((fix.latitude, fix.longitude));

        PositionSample {
            lat: Some(fix.latitude),
            lon: Some(fix.longitude),
            altitude: fix.altitude,
            accuracy: fix.horizontal_accuracy,
            timestamp,
            speed,
            bearing,
        }
    }
}
