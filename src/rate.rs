//! Per-minute rate computation from two cumulative samples.
//!
//! Runs may fire faster than once per second (manual invocation right after a
//! cron run), so elapsed time is clamped to at least one second before
//! dividing.

/// Smallest elapsed time used as a divisor, in seconds.
pub const MIN_ELAPSED_SECONDS: f64 = 1.0;

/// Returns `(current - previous)` scaled to a per-minute rate.
///
/// `elapsed_seconds` below one second is treated as exactly one second.
pub fn rate_per_minute(previous: f64, current: f64, elapsed_seconds: f64) -> f64 {
    let elapsed = if elapsed_seconds.is_nan() {
        MIN_ELAPSED_SECONDS
    } else {
        elapsed_seconds.max(MIN_ELAPSED_SECONDS)
    };
    (current - previous) / (elapsed / 60.0)
}

/// Seconds between two epoch timestamps, floored to one.
pub fn elapsed_seconds(previous_ts: i64, now_ts: i64) -> i64 {
    now_ts.saturating_sub(previous_ts).max(1)
}

/// Rate for a monotonically increasing kernel counter.
///
/// A value lower than the previous one means the counter was reset (reboot or
/// device re-attach); the delta is then taken from zero.
pub fn counter_rate_per_minute(previous: u64, current: u64, elapsed_seconds: f64) -> f64 {
    let previous = if current < previous { 0 } else { previous };
    rate_per_minute(previous as f64, current as f64, elapsed_seconds)
}
