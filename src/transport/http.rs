// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! HTTP collector client.
//!
//! Each sample is one `GET {collector_url}?deviceid=..&lat=..&...`. Absent
//! fields are omitted from the query, except `bearing` which is sent as `0`.
//! Only `200 OK` counts as acknowledged.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::debug;

use crate::sample::PositionSample;
use super::delivery::{DeliveryClient, DeliveryError};

pub struct HttpDeliveryClient {
    client: Client,
    url: String,
    device_id: String,
}

impl HttpDeliveryClient {
    /// Build a client for `url`, tagging every sample with `device_id`.
    /// `request_timeout` bounds each individual GET.
    pub fn new(url: impl Into<String>, device_id: impl Into<String>, request_timeout: Duration) -> Result<Self, DeliveryError> {
        let client = Client::builder()
            .timeout(request_timeout)
            .pool_max_idle_per_host(2)
            .build()
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            url: url.into(),
            device_id: device_id.into(),
        })
    }

    /// Collector endpoint
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Query parameters for one sample, in wire order.
    #[must_use]
    pub fn query_params(&self, sample: &PositionSample) -> Vec<(&'static str, String)> {
        let mut params = Vec::with_capacity(8);
        params.push(("deviceid", self.device_id.clone()));

        let optional = [
            ("lat", sample.lat),
            ("lon", sample.lon),
            ("altitude", sample.altitude),
            ("accuracy", sample.accuracy),
        ];
        params.extend(optional.into_iter().filter_map(|(k, v)| v.map(|v| (k, v.to_string()))));

        params.push(("timestamp", sample.timestamp.clone()));
        if let Some(speed) = sample.speed {
            params.push(("speed", speed.to_string()));
        }
        params.push(("bearing", sample.bearing.unwrap_or(0.0).to_string()));
        params
    }
}

fn classify(err: reqwest::Error) -> DeliveryError {
    if err.is_timeout() {
        DeliveryError::Timeout
    } else {
        DeliveryError::Transport(err.to_string())
    }
}

#[async_trait]
impl DeliveryClient for HttpDeliveryClient {
    async fn send(&self, sample: &PositionSample) -> Result<(), DeliveryError> {
        let response = self.client
            .get(&self.url)
            .query(&self.query_params(sample))
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(DeliveryError::Status(status.as_u16()));
        }

        debug!(timestamp = %sample.timestamp, kind = sample.kind(), "Sample delivered");
        Ok(())
    }
}
