//! Integration tests for the one-shot sampling run.
//!
//! These drive `SampleOrchestrator::run_at` with a fixed host sampler and an
//! in-memory transport, so state handling and rate derivation can be checked
//! across several consecutive runs without touching /proc or the network.

use std::fs;
use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use herakles_host_sampler::syslog::format_syslog_timestamp;
use herakles_host_sampler::{
    DeliveryError, HostSampler, LogPattern, LogPeriodCounter, MetricsPayload, MetricsTransport,
    PersistedState, RequestSource, RunError, Sample, SampleError, SampleOrchestrator, StateError,
    StateStore,
};

/// 2024-11-06 00:00:00 UTC
const T0: i64 = 1_730_851_200;
const MB: u64 = 1024 * 1024;

struct FixedSampler(Sample);

impl HostSampler for FixedSampler {
    fn sample(&self) -> Result<Sample, SampleError> {
        Ok(self.0.clone())
    }
}

struct BrokenSampler;

impl HostSampler for BrokenSampler {
    fn sample(&self) -> Result<Sample, SampleError> {
        Err(SampleError::Read {
            what: "/proc/diskstats",
            reason: "permission denied".into(),
        })
    }
}

#[derive(Default)]
struct RecordingTransport {
    sent: Mutex<Vec<MetricsPayload>>,
}

impl MetricsTransport for RecordingTransport {
    async fn deliver(&self, payload: &MetricsPayload) -> Result<u16, DeliveryError> {
        self.sent.lock().unwrap().push(payload.clone());
        Ok(200)
    }
}

struct FailingTransport;

impl MetricsTransport for FailingTransport {
    async fn deliver(&self, _payload: &MetricsPayload) -> Result<u16, DeliveryError> {
        Err(DeliveryError::Request("connection refused".into()))
    }
}

fn sample(read_bytes: u64, write_bytes: u64, rx_packets: Option<u64>) -> Sample {
    Sample {
        cpu_percent: 12.5,
        mem_percent: 43.1,
        disk_read_bytes: Some(read_bytes),
        disk_write_bytes: Some(write_bytes),
        rx_packets,
    }
}

fn query_line(ts: i64) -> String {
    format!(
        "{} ns1 pdns_server: Remote 192.0.2.10 wants 'example.com|A', do = 0, bufsize = 1232, rd = 1\n",
        format_syslog_timestamp(&Utc, ts).unwrap()
    )
}

fn noise_line(ts: i64) -> String {
    format!(
        "{} ns1 systemd[1]: Started Session 7 of user root.\n",
        format_syslog_timestamp(&Utc, ts).unwrap()
    )
}

fn orchestrator(dir: &Path, source: RequestSource) -> SampleOrchestrator<Utc> {
    SampleOrchestrator::new(
        "ns1",
        StateStore::new(dir.join("state.json")),
        LogPeriodCounter::with_timezone(LogPattern::default(), Utc).block_size(64),
        dir.join("messages"),
        source,
    )
}

#[tokio::test]
async fn test_first_run_creates_state_with_zero_rates() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("messages"), query_line(T0 - 10)).unwrap();

    let orch = orchestrator(dir.path(), RequestSource::Log);
    let transport = RecordingTransport::default();
    let report = orch
        .run_at(T0, &FixedSampler(sample(100 * MB, 50 * MB, None)), &transport)
        .await
        .unwrap();

    assert!(report.state_saved);
    assert!(report.delivery.is_ok());
    assert_eq!(report.request_count, 0);
    assert_eq!(report.elapsed_seconds, 1);
    assert_eq!(report.payload.disk_read_mb, 100.0);
    assert_eq!(report.payload.disk_write_mb, 50.0);
    assert_eq!(report.payload.disk_read_mb_per_min, 0.0);
    assert_eq!(report.payload.disk_write_mb_per_min, 0.0);
    assert_eq!(report.payload.request_count_per_min, 0.0);

    let state = StateStore::new(dir.path().join("state.json")).try_load().unwrap();
    assert_eq!(state.timestamp, Some(T0));
    assert_eq!(state.log_watermark, Some(T0));
    assert_eq!(state.disk_read_bytes, Some(100 * MB));

    let sent = transport.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].server, "ns1");
    assert_eq!(sent[0].timestamp, T0);
}

#[tokio::test]
async fn test_second_run_derives_rates_from_previous_state() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("messages");
    let orch = orchestrator(dir.path(), RequestSource::Log);
    let transport = RecordingTransport::default();

    orch.run_at(T0, &FixedSampler(sample(100 * MB, 50 * MB, None)), &transport)
        .await
        .unwrap();

    let mut content = String::new();
    content.push_str(&query_line(T0 - 5));
    content.push_str(&query_line(T0));
    content.push_str(&query_line(T0 + 10));
    content.push_str(&noise_line(T0 + 20));
    content.push_str(&query_line(T0 + 30));
    content.push_str(&query_line(T0 + 60));
    content.push_str(&query_line(T0 + 70));
    fs::write(&log, content).unwrap();

    let report = orch
        .run_at(
            T0 + 60,
            &FixedSampler(sample(160 * MB, 80 * MB, None)),
            &transport,
        )
        .await
        .unwrap();

    // T0+10, T0+30 and T0+60; T0 itself is the exclusive watermark
    assert_eq!(report.request_count, 3);
    assert_eq!(report.elapsed_seconds, 60);
    assert_eq!(report.payload.request_count_per_min, 3.0);
    assert_eq!(report.payload.disk_read_mb_per_min, 60.0);
    assert_eq!(report.payload.disk_write_mb_per_min, 30.0);
    assert_eq!(report.payload.cpu_usage, 12.5);
    assert_eq!(report.payload.mem_usage, 43.1);

    let state = StateStore::new(dir.path().join("state.json")).load();
    assert_eq!(state.watermark(), Some(T0 + 60));
    assert_eq!(transport.sent.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_consecutive_runs_never_count_a_line_twice() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("messages");
    let orch = orchestrator(dir.path(), RequestSource::Log);
    let transport = RecordingTransport::default();
    let host = FixedSampler(sample(MB, MB, None));

    let content: String = (1..=30).map(|i| query_line(T0 + i * 10)).collect();
    fs::write(&log, content).unwrap();

    orch.run_at(T0, &host, &transport).await.unwrap();
    let first = orch.run_at(T0 + 100, &host, &transport).await.unwrap();
    let second = orch.run_at(T0 + 250, &host, &transport).await.unwrap();
    let third = orch.run_at(T0 + 300, &host, &transport).await.unwrap();

    assert_eq!(first.request_count, 10);
    assert_eq!(second.request_count, 15);
    assert_eq!(third.request_count, 5);
}

#[tokio::test]
async fn test_failed_delivery_still_persists_state() {
    let dir = tempfile::tempdir().unwrap();
    let orch = orchestrator(dir.path(), RequestSource::Log);

    let report = orch
        .run_at(T0, &FixedSampler(sample(MB, MB, None)), &FailingTransport)
        .await
        .unwrap();

    assert!(report.state_saved);
    assert!(matches!(report.delivery, Err(DeliveryError::Request(_))));

    let state = StateStore::new(dir.path().join("state.json")).try_load().unwrap();
    assert_eq!(state.timestamp, Some(T0));
}

#[tokio::test]
async fn test_sampling_failure_still_counts_persists_and_delivers() {
    let dir = tempfile::tempdir().unwrap();
    let state_path = dir.path().join("state.json");
    StateStore::new(&state_path)
        .save(&PersistedState {
            disk_read_bytes: Some(7 * MB),
            disk_write_bytes: Some(3 * MB),
            rx_packets: None,
            timestamp: Some(T0),
            log_watermark: Some(T0),
        })
        .unwrap();
    let content: String = [T0 - 5, T0 + 10, T0 + 30]
        .iter()
        .map(|&ts| query_line(ts))
        .collect();
    fs::write(dir.path().join("messages"), content).unwrap();

    let orch = orchestrator(dir.path(), RequestSource::Log);
    let transport = RecordingTransport::default();
    let report = orch
        .run_at(T0 + 60, &BrokenSampler, &transport)
        .await
        .unwrap();

    assert!(report.degraded);
    assert!(report.state_saved);
    assert_eq!(report.request_count, 2);
    assert_eq!(report.payload.request_count_per_min, 2.0);
    assert_eq!(report.payload.disk_read_mb, 7.0);
    assert_eq!(report.payload.disk_read_mb_per_min, 0.0);
    assert_eq!(report.payload.disk_write_mb_per_min, 0.0);
    assert_eq!(report.payload.cpu_usage, 0.0);

    let state = StateStore::new(&state_path).try_load().unwrap();
    assert_eq!(state.timestamp, Some(T0 + 60));
    assert_eq!(state.log_watermark, Some(T0 + 60));
    assert_eq!(state.disk_read_bytes, Some(7 * MB));
    assert_eq!(state.disk_write_bytes, Some(3 * MB));
    assert_eq!(transport.sent.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_missing_disk_counters_on_first_run_stay_unset() {
    let dir = tempfile::tempdir().unwrap();
    let orch = orchestrator(dir.path(), RequestSource::Log);
    let transport = RecordingTransport::default();
    let partial = Sample {
        cpu_percent: 5.0,
        mem_percent: 20.0,
        ..Sample::default()
    };

    let report = orch
        .run_at(T0, &FixedSampler(partial), &transport)
        .await
        .unwrap();
    assert!(report.degraded);
    assert_eq!(report.payload.disk_read_mb, 0.0);
    assert_eq!(report.payload.cpu_usage, 5.0);

    let state = StateStore::new(dir.path().join("state.json")).try_load().unwrap();
    assert_eq!(state.disk_read_bytes, None);
    assert_eq!(state.timestamp, Some(T0));

    // Counters come back: no bogus rate against a zero baseline
    let report = orch
        .run_at(T0 + 60, &FixedSampler(sample(500 * MB, MB, None)), &transport)
        .await
        .unwrap();
    assert!(!report.degraded);
    assert_eq!(report.payload.disk_read_mb_per_min, 0.0);
}

#[tokio::test]
async fn test_unusable_state_directory_still_delivers() {
    let dir = tempfile::tempdir().unwrap();
    let not_a_dir = dir.path().join("notadir");
    fs::write(&not_a_dir, "plain file").unwrap();
    fs::write(dir.path().join("messages"), query_line(T0 + 10)).unwrap();

    let orch = SampleOrchestrator::new(
        "ns1",
        StateStore::new(not_a_dir.join("state.json")),
        LogPeriodCounter::with_timezone(LogPattern::default(), Utc),
        dir.path().join("messages"),
        RequestSource::Log,
    );
    let transport = RecordingTransport::default();
    let report = orch
        .run_at(T0 + 60, &FixedSampler(sample(MB, MB, None)), &transport)
        .await
        .unwrap();

    assert!(!report.state_saved);
    assert!(report.delivery.is_ok());
    assert_eq!(transport.sent.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_concurrent_run_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let _held = StateStore::new(dir.path().join("state.json")).lock().unwrap();

    let orch = orchestrator(dir.path(), RequestSource::Log);
    let transport = RecordingTransport::default();
    let result = orch
        .run_at(T0, &FixedSampler(sample(MB, MB, None)), &transport)
        .await;

    assert!(matches!(
        result,
        Err(RunError::Locked(StateError::Busy { .. }))
    ));
    assert!(!dir.path().join("state.json").exists());
    assert!(transport.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_packet_source_uses_rx_delta() {
    let dir = tempfile::tempdir().unwrap();
    // A log full of matches must be ignored by the packet strategy
    let content: String = (1..=10).map(|i| query_line(T0 + i)).collect();
    fs::write(dir.path().join("messages"), content).unwrap();

    let orch = orchestrator(dir.path(), RequestSource::Packets);
    let transport = RecordingTransport::default();

    orch.run_at(T0, &FixedSampler(sample(MB, MB, Some(1_000))), &transport)
        .await
        .unwrap();
    let report = orch
        .run_at(
            T0 + 120,
            &FixedSampler(sample(MB, MB, Some(1_600))),
            &transport,
        )
        .await
        .unwrap();

    assert_eq!(report.request_count, 600);
    assert_eq!(report.payload.request_count_per_min, 300.0);

    let state = StateStore::new(dir.path().join("state.json")).load();
    assert_eq!(state.rx_packets, Some(1_600));
}

#[tokio::test]
async fn test_counter_reset_is_measured_from_zero() {
    let dir = tempfile::tempdir().unwrap();
    let orch = orchestrator(dir.path(), RequestSource::Log);
    let transport = RecordingTransport::default();

    orch.run_at(T0, &FixedSampler(sample(900 * MB, 900 * MB, None)), &transport)
        .await
        .unwrap();
    let report = orch
        .run_at(T0 + 60, &FixedSampler(sample(MB, 2 * MB, None)), &transport)
        .await
        .unwrap();

    assert_eq!(report.payload.disk_read_mb_per_min, 1.0);
    assert_eq!(report.payload.disk_write_mb_per_min, 2.0);
}

#[tokio::test]
async fn test_legacy_state_watermark_is_honoured() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("state.json"),
        format!(
            r#"{{"timestamp": {}, "last_log_ts": {}, "disk_read_bytes": 0, "disk_write_bytes": 0}}"#,
            T0,
            T0 - 30
        ),
    )
    .unwrap();
    let content: String = [T0 - 40, T0 - 20, T0 - 10, T0 + 30]
        .iter()
        .map(|&ts| query_line(ts))
        .collect();
    fs::write(dir.path().join("messages"), content).unwrap();

    let orch = orchestrator(dir.path(), RequestSource::Log);
    let report = orch
        .run_at(
            T0 + 60,
            &FixedSampler(sample(0, 0, None)),
            &RecordingTransport::default(),
        )
        .await
        .unwrap();

    assert_eq!(report.request_count, 3);
    assert_eq!(report.elapsed_seconds, 60);
}

#[tokio::test]
async fn test_corrupt_state_starts_fresh() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("state.json"), "{ not json").unwrap();

    let orch = orchestrator(dir.path(), RequestSource::Log);
    let report = orch
        .run_at(
            T0,
            &FixedSampler(sample(5 * MB, 5 * MB, None)),
            &RecordingTransport::default(),
        )
        .await
        .unwrap();

    assert_eq!(report.payload.disk_read_mb_per_min, 0.0);
    assert!(report.state_saved);
    let state = StateStore::new(dir.path().join("state.json")).try_load().unwrap();
    assert_eq!(state.disk_read_bytes, Some(5 * MB));
}
