//! Generate test log command implementation.
//!
//! Writes a synthetic syslog file mixing PowerDNS query lines with other
//! daemon chatter, in ascending time order, for exercising the log counter.

use chrono::{Local, TimeZone, Utc};
use rand::Rng;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info};

use herakles_host_sampler::syslog::format_syslog_timestamp;

const HOST: &str = "ns1";

const QNAMES: &[&str] = &[
    "example.com",
    "www.example.com",
    "mail.example.org",
    "_dmarc.example.net",
    "api.internal.example",
];
const QTYPES: &[&str] = &["A", "AAAA", "MX", "TXT", "NS", "SOA"];

const NOISE: &[&str] = &[
    "systemd[1]: Started Session 42 of user root.",
    "kernel: [12345.678901] eth0: link up, 1000Mbps, full-duplex",
    "sshd[2211]: Accepted publickey for deploy from 198.51.100.7 port 52144 ssh2",
    "CROND[3120]: (root) CMD (/usr/bin/herakles-host-sampler)",
    "pdns_server: Done launching threads, ready to distribute questions",
    "pdns_server: UDP server bound to 0.0.0.0:53",
];

/// Summary of a generated log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedLog {
    pub content: String,
    pub query_lines: usize,
    pub first_ts: i64,
    pub last_ts: i64,
}

/// Builds `lines` syslog lines spread over `[start, end]`, in ascending order,
/// with timestamps rendered in `tz`.
pub fn generate_syslog<R, Tz>(
    rng: &mut R,
    tz: &Tz,
    lines: usize,
    start: i64,
    end: i64,
    query_ratio: f64,
) -> GeneratedLog
where
    R: Rng,
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let ratio = query_ratio.clamp(0.0, 1.0);
    let mut stamps: Vec<i64> = (0..lines).map(|_| rng.gen_range(start..=end)).collect();
    stamps.sort_unstable();

    let mut content = String::with_capacity(lines * 96);
    let mut query_lines = 0;

    for &ts in &stamps {
        let Some(prefix) = format_syslog_timestamp(tz, ts) else {
            continue;
        };

        let body = if rng.gen_bool(ratio) {
            query_lines += 1;
            format!(
                "pdns_server: Remote 192.0.2.{} wants '{}|{}', do = {}, bufsize = 1232, rd = 1: packetcache HIT",
                rng.gen_range(1..=254),
                QNAMES[rng.gen_range(0..QNAMES.len())],
                QTYPES[rng.gen_range(0..QTYPES.len())],
                rng.gen_range(0..=1)
            )
        } else {
            NOISE[rng.gen_range(0..NOISE.len())].to_string()
        };

        content.push_str(&prefix);
        content.push(' ');
        content.push_str(HOST);
        content.push(' ');
        content.push_str(&body);
        content.push('\n');
    }

    GeneratedLog {
        content,
        query_lines,
        first_ts: stamps.first().copied().unwrap_or(start),
        last_ts: stamps.last().copied().unwrap_or(end),
    }
}

/// Generates a synthetic syslog file ending at the current time.
pub fn command_generate_testlog(
    output: PathBuf,
    lines: usize,
    span_secs: i64,
    query_ratio: f64,
) -> Result<(), Box<dyn std::error::Error>> {
    if span_secs <= 0 {
        return Err("--span-secs must be greater than 0".into());
    }
    if !(0.0..=1.0).contains(&query_ratio) {
        return Err("--query-ratio must be between 0.0 and 1.0".into());
    }

    let end = Utc::now().timestamp();
    let start = end - span_secs;
    debug!(
        "Generating test log: lines={}, span={}s, query_ratio={}, output={}",
        lines,
        span_secs,
        query_ratio,
        output.display()
    );

    let mut rng = rand::thread_rng();
    let log = generate_syslog(&mut rng, &Local, lines, start, end, query_ratio);
    fs::write(&output, &log.content)?;

    info!("Wrote {} lines to {}", lines, output.display());
    println!("✅ Test log written to: {}", output.display());
    println!("   Lines:         {}", lines);
    println!("   Query lines:   {}", log.query_lines);
    println!("   Period:        {} .. {}", log.first_ts, log.last_ts);
    println!(
        "   Verify with:   herakles-host-sampler --log-path {} count --since {}",
        output.display(),
        log.first_ts - 1
    );

    Ok(())
}
