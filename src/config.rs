//! Configuration for the forwarder.
//!
//! Values come from the process environment (see [`ForwarderConfig::from_env`])
//! or from any serde source; every field has a default.
//!
//! # Example
//!
//! ```
//! use telemetry_forwarder::ForwarderConfig;
//! use std::time::Duration;
//!
//! let config = ForwarderConfig {
//!     server_url: "http://collector.local".into(),
//!     server_port: Some("5055".into()),
//!     buffer_size: 3,
//!     ..Default::default()
//! };
//! assert_eq!(config.collector_url(), "http://collector.local:5055");
//! assert_eq!(config.active_interval(), Duration::from_secs(5));
//! assert_eq!(config.inactive_interval(), Duration::from_secs(60));
//! ```

use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::transport::probe::DEFAULT_PROBE_URL;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Configuration for the forwarder.
#[derive(Debug, Clone, Deserialize)]
pub struct ForwarderConfig {
    /// SQLite file backing the local store
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Memory buffer flush threshold (samples)
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,

    /// Collector endpoint, without port
    #[serde(default)]
    pub server_url: String,

    /// Optional collector port, appended as `:{port}`
    #[serde(default)]
    pub server_port: Option<String>,

    /// Sent as `deviceid` with every sample
    #[serde(default = "default_device_id")]
    pub device_id: String,

    /// Tick interval while the device is active
    #[serde(default = "default_update_frequency_secs")]
    pub update_frequency_secs: u64,

    /// Inactive tick interval = update frequency × this factor
    #[serde(default = "default_offroad_update_factor")]
    pub offroad_update_factor: u32,

    /// Reachability endpoint; `None` disables probing
    #[serde(default = "default_probe_url")]
    pub probe_url: Option<String>,
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,

    /// Per-request timeout for collector GETs
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Delivery time allowed per sample; a batch gets this × its length
    #[serde(default = "default_delivery_budget_secs")]
    pub delivery_budget_secs: u64,

    /// How long to wait for a reading each active tick
    #[serde(default = "default_sample_wait_secs")]
    pub sample_wait_secs: u64,

    /// Sleep after a failed cycle
    #[serde(default = "default_error_cooldown_secs")]
    pub error_cooldown_secs: u64,

    /// Delay before the first tick
    #[serde(default = "default_startup_delay_secs")]
    pub startup_delay_secs: u64,

    /// Flush once the oldest buffered sample is this old (0 = disabled)
    #[serde(default)]
    pub buffer_max_age_secs: u64,

    /// Multiplier applied to fix speeds before they become samples
    #[serde(default = "default_speed_factor")]
    pub speed_factor: f64,
}

fn default_db_path() -> String { "gps_data.db".to_string() }
fn default_buffer_size() -> usize { 10 }
fn default_device_id() -> String { "123456".to_string() }
fn default_update_frequency_secs() -> u64 { 5 }
fn default_offroad_update_factor() -> u32 { 12 }
fn default_probe_url() -> Option<String> { Some(DEFAULT_PROBE_URL.to_string()) }
fn default_probe_timeout_secs() -> u64 { 5 }
fn default_request_timeout_secs() -> u64 { 10 }
fn default_delivery_budget_secs() -> u64 { 15 }
fn default_sample_wait_secs() -> u64 { 5 }
fn default_error_cooldown_secs() -> u64 { 10 }
fn default_startup_delay_secs() -> u64 { 30 }
fn default_speed_factor() -> f64 { 1.0 }

impl Default for ForwarderConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            buffer_size: default_buffer_size(),
            server_url: String::new(),
            server_port: None,
            device_id: default_device_id(),
            update_frequency_secs: default_update_frequency_secs(),
            offroad_update_factor: default_offroad_update_factor(),
            probe_url: default_probe_url(),
            probe_timeout_secs: default_probe_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            delivery_budget_secs: default_delivery_budget_secs(),
            sample_wait_secs: default_sample_wait_secs(),
            error_cooldown_secs: default_error_cooldown_secs(),
            startup_delay_secs: default_startup_delay_secs(),
            buffer_max_age_secs: 0,
            speed_factor: default_speed_factor(),
        }
    }
}

impl ForwarderConfig {
    /// Load from environment variables (`DB_PATH`, `BUFFER_SIZE`, ...).
    /// Unset variables keep their defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup. Keys are the upper-case
    /// environment names.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = lookup("DB_PATH") { config.db_path = v; }
        if let Some(v) = lookup("SERVER_URL") { config.server_url = v; }
        if let Some(v) = lookup("SERVER_PORT") {
            config.server_port = Some(v).filter(|p| !p.trim().is_empty());
        }
        if let Some(v) = lookup("DEVICE_ID") { config.device_id = v; }
        if let Some(v) = lookup("PROBE_URL") {
            config.probe_url = Some(v).filter(|u| !u.trim().is_empty());
        }

        parse_into(&lookup, "BUFFER_SIZE", &mut config.buffer_size)?;
        parse_into(&lookup, "UPDATE_FREQUENCY", &mut config.update_frequency_secs)?;
        parse_into(&lookup, "OFFROAD_UPDATE_FACTOR", &mut config.offroad_update_factor)?;
        parse_into(&lookup, "PROBE_TIMEOUT_SECS", &mut config.probe_timeout_secs)?;
        parse_into(&lookup, "REQUEST_TIMEOUT_SECS", &mut config.request_timeout_secs)?;
        parse_into(&lookup, "DELIVERY_BUDGET_SECS", &mut config.delivery_budget_secs)?;
        parse_into(&lookup, "SAMPLE_WAIT_SECS", &mut config.sample_wait_secs)?;
        parse_into(&lookup, "ERROR_COOLDOWN_SECS", &mut config.error_cooldown_secs)?;
        parse_into(&lookup, "STARTUP_DELAY_SECS", &mut config.startup_delay_secs)?;
        parse_into(&lookup, "BUFFER_MAX_AGE_SECS", &mut config.buffer_max_age_secs)?;
        parse_into(&lookup, "SPEED_FACTOR", &mut config.speed_factor)?;

        config.validate()?;
        Ok(config)
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.buffer_size == 0 {
            return Err(invalid("BUFFER_SIZE", "0", "must be at least 1"));
        }
        if self.update_frequency_secs == 0 {
            return Err(invalid("UPDATE_FREQUENCY", "0", "must be at least 1 second"));
        }
        if self.offroad_update_factor == 0 {
            return Err(invalid("OFFROAD_UPDATE_FACTOR", "0", "must be at least 1"));
        }
        for (key, secs) in [
            ("PROBE_TIMEOUT_SECS", self.probe_timeout_secs),
            ("REQUEST_TIMEOUT_SECS", self.request_timeout_secs),
            ("DELIVERY_BUDGET_SECS", self.delivery_budget_secs),
        ] {
            if secs == 0 {
                return Err(invalid(key, "0", "must be at least 1 second"));
            }
        }
        if !self.speed_factor.is_finite() || self.speed_factor <= 0.0 {
            return Err(invalid("SPEED_FACTOR", &self.speed_factor.to_string(), "must be a positive number"));
        }
        Ok(())
    }

    /// Collector URL with the optional port applied.
    #[must_use]
    pub fn collector_url(&self) -> String {
        match &self.server_port {
            Some(port) => format!("{}:{}", self.server_url, port),
            None => self.server_url.clone(),
        }
    }

    #[must_use]
    pub fn active_interval(&self) -> Duration {
        Duration::from_secs(self.update_frequency_secs)
    }

    #[must_use]
    pub fn inactive_interval(&self) -> Duration {
        Duration::from_secs(self.update_frequency_secs * u64::from(self.offroad_update_factor))
    }

    #[must_use]
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    #[must_use]
    pub fn delivery_budget(&self) -> Duration {
        Duration::from_secs(self.delivery_budget_secs)
    }

    #[must_use]
    pub fn sample_wait(&self) -> Duration {
        Duration::from_secs(self.sample_wait_secs)
    }

    #[must_use]
    pub fn error_cooldown(&self) -> Duration {
        Duration::from_secs(self.error_cooldown_secs)
    }

    #[must_use]
    pub fn startup_delay(&self) -> Duration {
        Duration::from_secs(self.startup_delay_secs)
    }

    #[must_use]
    pub fn buffer_max_age(&self) -> Option<Duration> {
        (self.buffer_max_age_secs > 0).then(|| Duration::from_secs(self.buffer_max_age_secs))
    }
}

fn invalid(key: &'static str, value: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        key,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_into<T, F>(lookup: &F, key: &'static str, target: &mut T) -> Result<(), ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else { return Ok(()) };
    *target = raw
        .trim()
        .parse()
        .map_err(|e: T::Err| invalid(key, &raw, &e.to_string()))?;
    Ok(())
}
