//! One sampling run, start to finish.
//!
//! Order matters: state is saved before the network attempt so that a failed
//! delivery never loses rate tracking. Only a concurrent run holding the lock
//! stops a run; missing host counters, an unusable state directory or a failed
//! delivery degrade it.

use std::path::PathBuf;

use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::logscan::LogPeriodCounter;
use crate::rate::{counter_rate_per_minute, elapsed_seconds, rate_per_minute};
use crate::state_store::{PersistedState, StateError, StateStore};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Point-in-time host counters. `None` means unavailable this run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sample {
    pub cpu_percent: f64,
    pub mem_percent: f64,
    /// Cumulative bytes read from block devices.
    pub disk_read_bytes: Option<u64>,
    /// Cumulative bytes written to block devices.
    pub disk_write_bytes: Option<u64>,
    /// Cumulative received packets on the configured interface.
    pub rx_packets: Option<u64>,
}

#[derive(Debug, thiserror::Error)]
pub enum SampleError {
    #[error("Failed to read {what}: {reason}")]
    Read { what: &'static str, reason: String },

    #[error("Interface {0} not found in /proc/net/dev")]
    UnknownInterface(String),
}

/// Source of point-in-time host counters.
pub trait HostSampler {
    fn sample(&self) -> Result<Sample, SampleError>;
}

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("HTTP request failed: {0}")]
    Request(String),

    #[error("Collector answered with status {0}")]
    Status(u16),

    #[error("Failed to encode payload: {0}")]
    Encode(String),
}

/// Delivers a payload to the collector.
#[allow(async_fn_in_trait)]
pub trait MetricsTransport {
    /// Returns the HTTP status (or 0 for transports without one).
    async fn deliver(&self, payload: &MetricsPayload) -> Result<u16, DeliveryError>;
}

/// Where the derived request rate comes from.
///
/// Both fill the same payload field, so a deployment uses exactly one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestSource {
    /// Count matching syslog lines since the previous run.
    #[default]
    Log,
    /// Received packet delta on the configured interface.
    Packets,
}

/// Body of the outbound metrics call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsPayload {
    pub server: String,
    pub timestamp: i64,
    pub cpu_usage: f64,
    pub mem_usage: f64,
    pub disk_read_mb: f64,
    pub disk_write_mb: f64,
    pub disk_read_mb_per_min: f64,
    pub disk_write_mb_per_min: f64,
    /// Field name expected by the collector regardless of the event source.
    #[serde(rename = "nginx_request_count_per_min")]
    pub request_count_per_min: f64,
}

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// Another run holds the lock.
    #[error("Run skipped: {0}")]
    Locked(StateError),
}

/// What happened during one run.
#[derive(Debug)]
pub struct RunReport {
    pub payload: MetricsPayload,
    /// Matching log lines or received packets in the period.
    pub request_count: u64,
    pub elapsed_seconds: i64,
    /// Some host counter was unavailable and the previous value was reused.
    pub degraded: bool,
    pub state_saved: bool,
    pub delivery: Result<u16, DeliveryError>,
}

/// Ties state, host sampling, log counting and delivery together.
pub struct SampleOrchestrator<Tz: TimeZone = chrono::Local> {
    server: String,
    store: StateStore,
    counter: LogPeriodCounter<Tz>,
    log_path: PathBuf,
    source: RequestSource,
}

impl<Tz: TimeZone> SampleOrchestrator<Tz> {
    pub fn new(
        server: impl Into<String>,
        store: StateStore,
        counter: LogPeriodCounter<Tz>,
        log_path: impl Into<PathBuf>,
        source: RequestSource,
    ) -> Self {
        Self {
            server: server.into(),
            store,
            counter,
            log_path: log_path.into(),
            source,
        }
    }

    /// Runs once at the current wall-clock time.
    pub async fn run<S, T>(&self, sampler: &S, transport: &T) -> Result<RunReport, RunError>
    where
        S: HostSampler,
        T: MetricsTransport,
    {
        self.run_at(Utc::now().timestamp(), sampler, transport).await
    }

    /// Runs once with `now` as the upper bound of the period.
    pub async fn run_at<S, T>(
        &self,
        now: i64,
        sampler: &S,
        transport: &T,
    ) -> Result<RunReport, RunError>
    where
        S: HostSampler,
        T: MetricsTransport,
    {
        let _lock = match self.store.lock() {
            Ok(lock) => Some(lock),
            Err(e @ StateError::Busy { .. }) => return Err(RunError::Locked(e)),
            Err(e) => {
                warn!("Running without the run lock: {}", e);
                None
            }
        };

        let previous = self.store.load();
        let sample = sampler.sample().unwrap_or_else(|e| {
            warn!("Host sampling failed, reusing previous counters: {}", e);
            Sample::default()
        });

        let last_ts = previous.timestamp.unwrap_or(now);
        let watermark = previous.watermark().unwrap_or(now);
        let elapsed = elapsed_seconds(last_ts, now);
        let elapsed_f = elapsed as f64;

        let disk_read = sample.disk_read_bytes.or(previous.disk_read_bytes);
        let disk_write = sample.disk_write_bytes.or(previous.disk_write_bytes);
        let rx_packets = sample.rx_packets.or(previous.rx_packets);
        let mut degraded = sample.disk_read_bytes.is_none() || sample.disk_write_bytes.is_none();

        let request_count = match self.source {
            RequestSource::Log => self.counter.count_matches(&self.log_path, watermark, now),
            RequestSource::Packets => match (previous.rx_packets, sample.rx_packets) {
                (Some(last), Some(current)) if current < last => current,
                (Some(last), Some(current)) => current - last,
                (None, Some(_)) => 0,
                (_, None) => {
                    warn!("Packet request source configured but no packet counter sampled");
                    degraded = true;
                    0
                }
            },
        };

        let read_rate = counter_rate(previous.disk_read_bytes, disk_read, elapsed_f);
        let write_rate = counter_rate(previous.disk_write_bytes, disk_write, elapsed_f);
        let request_rate = rate_per_minute(0.0, request_count as f64, elapsed_f);

        let next = PersistedState {
            disk_read_bytes: disk_read,
            disk_write_bytes: disk_write,
            rx_packets,
            timestamp: Some(now),
            log_watermark: Some(now),
        };
        let state_saved = match self.store.save(&next) {
            Ok(()) => true,
            Err(e) => {
                error!("Failed to persist state, next run starts fresh: {}", e);
                false
            }
        };

        let payload = MetricsPayload {
            server: self.server.clone(),
            timestamp: now,
            cpu_usage: sample.cpu_percent,
            mem_usage: sample.mem_percent,
            disk_read_mb: round2(disk_read.unwrap_or(0) as f64 / BYTES_PER_MB),
            disk_write_mb: round2(disk_write.unwrap_or(0) as f64 / BYTES_PER_MB),
            disk_read_mb_per_min: round2(read_rate / BYTES_PER_MB),
            disk_write_mb_per_min: round2(write_rate / BYTES_PER_MB),
            request_count_per_min: round2(request_rate),
        };

        let delivery = transport.deliver(&payload).await;
        match &delivery {
            Ok(status) => info!(
                "Sent metrics: {} (request_count={}, elapsed={}s, degraded={})",
                status, request_count, elapsed, degraded
            ),
            Err(e) => warn!(
                "Failed to send metrics: {} (request_count={}, elapsed={}s, degraded={})",
                e, request_count, elapsed, degraded
            ),
        }

        Ok(RunReport {
            payload,
            request_count,
            elapsed_seconds: elapsed,
            degraded,
            state_saved,
            delivery,
        })
    }
}

/// Zero unless both samples exist.
fn counter_rate(previous: Option<u64>, current: Option<u64>, elapsed_seconds: f64) -> f64 {
    match (previous, current) {
        (Some(p), Some(c)) => counter_rate_per_minute(p, c, elapsed_seconds),
        _ => 0.0,
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
