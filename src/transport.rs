//! Metrics delivery.
//!
//! A single POST with a bounded timeout. Failures are returned to the
//! orchestrator, which logs them; there is no retry, the next scheduled run
//! simply sends fresh numbers.

use std::time::Duration;

use herakles_host_sampler::{DeliveryError, MetricsPayload, MetricsTransport};
use reqwest::Client as HttpClient;
use tracing::debug;

/// Posts payloads as JSON to the collector.
pub struct HttpTransport {
    client: HttpClient,
    url: String,
}

impl HttpTransport {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, DeliveryError> {
        let client = HttpClient::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .user_agent(concat!("herakles-host-sampler/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DeliveryError::Request(e.to_string()))?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

impl MetricsTransport for HttpTransport {
    async fn deliver(&self, payload: &MetricsPayload) -> Result<u16, DeliveryError> {
        debug!("POST {}", self.url);
        let response = self
            .client
            .post(&self.url)
            .json(payload)
            .send()
            .await
            .map_err(|e| DeliveryError::Request(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(status.as_u16())
        } else {
            Err(DeliveryError::Status(status.as_u16()))
        }
    }
}

/// Prints the payload instead of sending it (`--dry-run`).
pub struct StdoutTransport;

impl MetricsTransport for StdoutTransport {
    async fn deliver(&self, payload: &MetricsPayload) -> Result<u16, DeliveryError> {
        let json = serde_json::to_string_pretty(payload)
            .map_err(|e| DeliveryError::Encode(e.to_string()))?;
        println!("{}", json);
        Ok(0)
    }
}
