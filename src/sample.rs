// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Position sample data structure.
//!
//! A [`PositionSample`] is the unit that flows through the forwarder: it is
//! buffered in memory, persisted to the local store when delivery fails and
//! finally pushed to the collector. Samples are immutable once built.
//!
//! # Example
//!
//! ```
//! use telemetry_forwarder::PositionSample;
//!
//! let fix = PositionSample::at("2025-01-01T00:00:00.000000Z")
//!     .with_position(52.1, 4.3)
//!     .with_speed(12.5);
//! assert!(!fix.is_heartbeat());
//!
//! let ping = PositionSample::heartbeat();
//! assert!(ping.is_heartbeat());
//! ```

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Format used for every sample timestamp (ISO-8601, UTC, microseconds, `Z` suffix).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

/// Current UTC time formatted with [`TIMESTAMP_FORMAT`].
#[must_use]
pub fn utc_timestamp_now() -> String {
    Utc::now().format(TIMESTAMP_FORMAT).to_string()
}

/// One positional reading plus the time it was captured.
///
/// Every geo field is optional; a sample with none of them set is a
/// heartbeat, used by the collector as a liveness signal when no fix is
/// available. The timestamp is always present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSample {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub altitude: Option<f64>,
    pub accuracy: Option<f64>,
    /// ISO-8601 UTC capture time
    pub timestamp: String,
    pub speed: Option<f64>,
    pub bearing: Option<f64>,
}

impl PositionSample {
    /// An empty sample captured at `timestamp`. Add fields with the `with_*` methods.
    pub fn at(timestamp: impl Into<String>) -> Self {
        Self {
            lat: None,
            lon: None,
            altitude: None,
            accuracy: None,
            timestamp: timestamp.into(),
            speed: None,
            bearing: None,
        }
    }

    /// Heartbeat stamped with the current time.
    #[must_use]
    pub fn heartbeat() -> Self {
        Self::at(utc_timestamp_now())
    }

    #[must_use]
    pub fn with_position(mut self, lat: f64, lon: f64) -> Self {
        self.lat = Some(lat);
        self.lon = Some(lon);
        self
    }

    #[must_use]
    pub fn with_altitude(mut self, altitude: f64) -> Self {
        self.altitude = Some(altitude);
        self
    }

    #[must_use]
    pub fn with_accuracy(mut self, accuracy: f64) -> Self {
        self.accuracy = Some(accuracy);
        self
    }

    #[must_use]
    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = Some(speed);
        self
    }

    #[must_use]
    pub fn with_bearing(mut self, bearing: f64) -> Self {
        self.bearing = Some(bearing);
        self
    }

    /// True when no geo field is set.
    #[must_use]
    pub fn is_heartbeat(&self) -> bool {
        self.lat.is_none()
            && self.lon.is_none()
            && self.altitude.is_none()
            && self.accuracy.is_none()
            && self.speed.is_none()
            && self.bearing.is_none()
    }

    /// Metric/log label for the sample kind.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        if self.is_heartbeat() {
            "heartbeat"
        } else {
            "fix"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heartbeat_has_only_timestamp() {
        let sample = PositionSample::heartbeat();
        assert!(sample.is_heartbeat());
        assert_eq!(sample.kind(), "heartbeat");
        assert!(sample.timestamp.ends_with('Z'));
    }

    #[test]
    fn test_any_geo_field_makes_a_fix() {
        let sample = PositionSample::at("2025-01-01T00:00:00.000000Z").with_altitude(10.0);
        assert!(!sample.is_heartbeat());
        assert_eq!(sample.kind(), "fix");
    }

    #[test]
    fn test_timestamp_format_parses_back() {
        let ts = utc_timestamp_now();
        let parsed = chrono::NaiveDateTime::parse_from_str(&ts, TIMESTAMP_FORMAT);
        assert!(parsed.is_ok(), "unparseable timestamp {ts}");
    }

    #[test]
    fn test_serde_keeps_nulls() {
        let sample = PositionSample::at("2025-01-01T00:00:00.000000Z").with_position(1.0, 2.0);
        let json = serde_json::to_value(&sample).unwrap();
        assert_eq!(json["lat"], 1.0);
        assert!(json["speed"].is_null());

        let back: PositionSample = serde_json::from_value(json).unwrap();
        assert_eq!(back, sample);
    }
}
