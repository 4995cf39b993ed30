//! Count command implementation.
//!
//! Runs only the reverse log scan for an explicit period. Read-only: the
//! state file is neither read nor written.

use std::time::Instant;

use chrono::{Local, TimeZone, Utc};
use herakles_host_sampler::LogPeriodCounter;

use crate::config::Config;

/// Counts matching log lines in `(since, until]`.
pub fn command_count(
    since: i64,
    until: Option<i64>,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let until = until.unwrap_or_else(|| Utc::now().timestamp());
    if since >= until {
        return Err(format!("--since ({}) must be before --until ({})", since, until).into());
    }

    let log_path = config.log_path();
    let counter = LogPeriodCounter::new(config.log_pattern.clone())
        .block_size(config.block_size.unwrap_or(herakles_host_sampler::DEFAULT_BLOCK_SIZE));

    let start = Instant::now();
    let count = counter.scan(&log_path, since, until)?;
    let elapsed = start.elapsed();

    let fmt = |ts: i64| {
        Local
            .timestamp_opt(ts, 0)
            .single()
            .map(|dt| dt.to_rfc3339())
            .unwrap_or_else(|| ts.to_string())
    };

    println!("🔎 Log scan of {}", log_path.display());
    println!("   Period:  ({}, {}]", fmt(since), fmt(until));
    println!(
        "   Pattern: marker={:?} event={:?} token={:?}",
        counter.pattern().marker,
        counter.pattern().event,
        counter.pattern().token
    );
    println!("   Matches: {}", count);
    println!(
        "   Rate:    {:.2}/min",
        herakles_host_sampler::rate_per_minute(0.0, count as f64, (until - since) as f64)
    );
    println!("   Took:    {:.2?}", elapsed);

    Ok(())
}
