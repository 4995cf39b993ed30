//! Herakles Host Sampler Library
//!
//! This library contains the run-once sampling core: persisted state between
//! runs, per-minute rate computation, and the reverse syslog scanner that
//! counts server events since the previous run. It is framework-agnostic; the
//! binary wires it to `/proc` readers and an HTTP transport.
//!
//! # Features
//!
//! - **Reverse Log Scanning**: Count matching syslog lines in `(watermark, now]`
//!   by reading the file backward in fixed-size blocks
//! - **Year Inference**: Syslog timestamps lack a year; it is inferred with
//!   new-year rollover detection
//! - **Best-Effort State**: Missing or corrupt state never blocks a run
//! - **Pluggable Collaborators**: Host sampling and delivery are traits
//!
//! # Usage
//!
//! ```rust,no_run
//! use herakles_host_sampler::{LogPattern, LogPeriodCounter};
//!
//! let counter = LogPeriodCounter::new(LogPattern::default());
//! let now = chrono::Utc::now().timestamp();
//! let count = counter.count_matches("/var/log/messages", now - 60, now);
//! println!("pdns queries in the last minute: {}", count);
//! ```

pub mod logscan;
pub mod rate;
pub mod sampler;
pub mod state_store;
pub mod syslog;

// Re-export main types for convenience
pub use logscan::{
    LogPattern, LogPeriodCounter, LogScanError, DEFAULT_BLOCK_SIZE, MAX_LINE_LEN,
};
pub use rate::{counter_rate_per_minute, elapsed_seconds, rate_per_minute};
pub use sampler::{
    DeliveryError, HostSampler, MetricsPayload, MetricsTransport, RequestSource, RunError,
    RunReport, Sample, SampleError, SampleOrchestrator,
};
pub use state_store::{PersistedState, RunLock, StateError, StateStore};
