//! Reverse block scanner that counts syslog events in a time window.
//!
//! The log is append-only and unbounded, so it is never read forward or loaded
//! whole. Reading starts at end-of-file and walks backward in fixed-size
//! blocks. The earliest (possibly incomplete) line of each block is carried
//! over and completed by the next, further-back block. Lines are visited
//! newest first and the scan stops at the first line at or before the
//! watermark, so each run only touches what was appended since the last run.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, TimeZone};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::syslog::parse_syslog_timestamp;

/// Default read block size in bytes.
pub const DEFAULT_BLOCK_SIZE: usize = 4096;

/// Longest line kept across block boundaries. Longer runs without a newline
/// (a NUL-padded log after a crash) are skipped as one malformed line.
pub const MAX_LINE_LEN: usize = 64 * 1024;

/// Default pre-filter: the syslog tag of the PowerDNS authoritative server.
pub const DEFAULT_MARKER: &str = "pdns_server:";
/// Default event phrase of a query log line.
pub const DEFAULT_EVENT: &str = "pdns_server: Remote";
/// Default secondary token of a query log line (`Remote 1.2.3.4 wants 'x|A'`).
pub const DEFAULT_TOKEN: &str = "wants";

/// What a counted line must contain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogPattern {
    /// Cheap pre-filter checked before timestamp parsing. Lines without it do
    /// not participate in the watermark check either.
    #[serde(default = "default_marker")]
    pub marker: String,
    /// Event phrase required for a line to be counted.
    #[serde(default = "default_event")]
    pub event: String,
    /// Secondary token required for a line to be counted.
    #[serde(default = "default_token")]
    pub token: String,
}

fn default_marker() -> String {
    DEFAULT_MARKER.to_string()
}
fn default_event() -> String {
    DEFAULT_EVENT.to_string()
}
fn default_token() -> String {
    DEFAULT_TOKEN.to_string()
}

impl Default for LogPattern {
    fn default() -> Self {
        Self {
            marker: default_marker(),
            event: default_event(),
            token: default_token(),
        }
    }
}

impl LogPattern {
    /// Pre-filter applied before any timestamp parsing.
    pub fn has_marker(&self, line: &str) -> bool {
        line.contains(&self.marker)
    }

    /// Full content predicate for a counted line.
    pub fn is_match(&self, line: &str) -> bool {
        line.contains(&self.event) && line.contains(&self.token)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LogScanError {
    #[error("Failed to open {}: {source}", path.display())]
    Open { path: PathBuf, source: io::Error },

    #[error("Failed to read {} at offset {offset}: {source}", path.display())]
    Read {
        path: PathBuf,
        offset: u64,
        source: io::Error,
    },

    #[error("Timestamp {0} is outside the representable range")]
    InvalidNow(i64),

    #[error("Block size must be greater than zero")]
    ZeroBlockSize,
}

/// Outcome of inspecting one complete line.
enum LineVerdict {
    Skip,
    Count,
    Stop,
}

/// Counts matching log lines whose timestamp lies in `(watermark, now]`.
#[derive(Debug, Clone)]
pub struct LogPeriodCounter<Tz: TimeZone = Local> {
    pattern: LogPattern,
    block_size: usize,
    tz: Tz,
}

impl LogPeriodCounter<Local> {
    /// Counter interpreting log timestamps in the host's local timezone.
    pub fn new(pattern: LogPattern) -> Self {
        Self {
            pattern,
            block_size: DEFAULT_BLOCK_SIZE,
            tz: Local,
        }
    }
}

impl<Tz: TimeZone> LogPeriodCounter<Tz> {
    /// Counter interpreting log timestamps in `tz`.
    pub fn with_timezone(pattern: LogPattern, tz: Tz) -> Self {
        Self {
            pattern,
            block_size: DEFAULT_BLOCK_SIZE,
            tz,
        }
    }

    pub fn block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    pub fn pattern(&self) -> &LogPattern {
        &self.pattern
    }

    /// Best-effort count: a missing file counts as zero and any other failure
    /// is logged and also counts as zero.
    pub fn count_matches<P: AsRef<Path>>(&self, log_path: P, watermark: i64, now: i64) -> u64 {
        match self.scan(log_path.as_ref(), watermark, now) {
            Ok(count) => count,
            Err(e) => {
                warn!("Log scan failed, counting 0 matches for this run: {}", e);
                0
            }
        }
    }

    /// Strict variant of [`count_matches`](Self::count_matches). Only a
    /// missing file is mapped to `Ok(0)`.
    pub fn scan(&self, log_path: &Path, watermark: i64, now: i64) -> Result<u64, LogScanError> {
        if self.block_size == 0 {
            return Err(LogScanError::ZeroBlockSize);
        }
        let now_local = self
            .tz
            .timestamp_opt(now, 0)
            .single()
            .ok_or(LogScanError::InvalidNow(now))?;

        let mut file = match File::open(log_path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("Log file {} not found, nothing to count", log_path.display());
                return Ok(0);
            }
            Err(e) => {
                return Err(LogScanError::Open {
                    path: log_path.to_path_buf(),
                    source: e,
                })
            }
        };

        let read_err = |offset: u64, source: io::Error| LogScanError::Read {
            path: log_path.to_path_buf(),
            offset,
            source,
        };

        let file_size = file.seek(SeekFrom::End(0)).map_err(|e| read_err(0, e))?;
        let mut pos = file_size;
        let mut block = vec![0u8; self.block_size];
        let mut buffer: Vec<u8> = Vec::with_capacity(self.block_size + MAX_LINE_LEN);
        let mut carry: Vec<u8> = Vec::new();
        // Set while walking through a line longer than MAX_LINE_LEN
        let mut overlong = false;
        let mut count = 0u64;
        let mut blocks = 0usize;

        while pos > 0 {
            let read_size = (self.block_size as u64).min(pos);
            pos -= read_size;
            file.seek(SeekFrom::Start(pos)).map_err(|e| read_err(pos, e))?;

            let chunk = &mut block[..read_size as usize];
            file.read_exact(chunk).map_err(|e| read_err(pos, e))?;
            buffer.clear();
            buffer.extend_from_slice(chunk);
            buffer.extend_from_slice(&carry);
            blocks += 1;

            // The first segment may continue in the previous block; everything
            // after the first newline is a complete line.
            let first_newline = match buffer.iter().position(|&b| b == b'\n') {
                Some(idx) => idx,
                None => {
                    if overlong || buffer.len() > MAX_LINE_LEN {
                        if !overlong {
                            debug!(
                                "Discarding line longer than {} bytes before offset {} of {}",
                                MAX_LINE_LEN,
                                pos + buffer.len() as u64,
                                log_path.display()
                            );
                        }
                        overlong = true;
                        carry.clear();
                    } else {
                        std::mem::swap(&mut carry, &mut buffer);
                    }
                    continue;
                }
            };

            let mut lines = buffer[first_newline + 1..].rsplit(|&b| b == b'\n');
            if overlong {
                // Head of the discarded line
                lines.next();
                overlong = false;
            }
            for line in lines {
                match self.inspect(line, watermark, now, &now_local) {
                    LineVerdict::Skip => {}
                    LineVerdict::Count => count += 1,
                    LineVerdict::Stop => {
                        debug!(
                            "Reached watermark after {} blocks of {}: {} matches",
                            blocks,
                            log_path.display(),
                            count
                        );
                        return Ok(count);
                    }
                }
            }

            carry.clear();
            carry.extend_from_slice(&buffer[..first_newline]);
        }

        // Offset 0 reached: the carry-over is the file's first line, which has
        // no newline before it but is complete. Inspecting it is intentional.
        if let LineVerdict::Count = self.inspect(&carry, watermark, now, &now_local) {
            count += 1;
        }

        debug!(
            "Scanned all {} bytes of {} without crossing the watermark: {} matches",
            file_size,
            log_path.display(),
            count
        );
        Ok(count)
    }

    fn inspect(
        &self,
        raw: &[u8],
        watermark: i64,
        now: i64,
        now_local: &DateTime<Tz>,
    ) -> LineVerdict {
        if raw.is_empty() {
            return LineVerdict::Skip;
        }
        let line = String::from_utf8_lossy(raw);
        if !self.pattern.has_marker(&line) {
            return LineVerdict::Skip;
        }

        let ts = match parse_syslog_timestamp(&line, now_local) {
            Some(ts) => ts,
            None => return LineVerdict::Skip,
        };

        if ts > now {
            // Clock skew or lines appended while we run.
            return LineVerdict::Skip;
        }
        if ts <= watermark {
            return LineVerdict::Stop;
        }

        if self.pattern.is_match(&line) {
            LineVerdict::Count
        } else {
            LineVerdict::Skip
        }
    }
}
