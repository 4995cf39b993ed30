//! System-wide metrics collection from /proc filesystem.
//!
//! This module provides functions to read CPU utilisation, memory usage and
//! the host name for the sampler.

use std::fs;
use std::thread;
use std::time::Duration;

/// Aggregate CPU time counters from the `cpu` line of /proc/stat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuStat {
    pub user: u64,
    pub nice: u64,
    pub system: u64,
    pub idle: u64,
    pub iowait: u64,
    pub irq: u64,
    pub softirq: u64,
    pub steal: u64,
}

impl CpuStat {
    /// Calculate total CPU time (all fields).
    pub fn total(&self) -> u64 {
        self.user
            + self.nice
            + self.system
            + self.idle
            + self.iowait
            + self.irq
            + self.softirq
            + self.steal
    }

    /// Calculate non-active time (idle + iowait).
    pub fn idle_total(&self) -> u64 {
        self.idle + self.iowait
    }

    /// Busy percentage between `previous` and `self` (0.0 - 100.0).
    pub fn busy_percent_since(&self, previous: &CpuStat) -> f64 {
        let delta_total = self.total().saturating_sub(previous.total());
        if delta_total == 0 {
            return 0.0;
        }
        let delta_idle = self.idle_total().saturating_sub(previous.idle_total());
        let busy = delta_total.saturating_sub(delta_idle);
        busy as f64 / delta_total as f64 * 100.0
    }
}

/// Parses the aggregate `cpu` line from /proc/stat content.
pub fn parse_cpu_stat(content: &str) -> Result<CpuStat, String> {
    let line = content
        .lines()
        .find(|l| l.split_whitespace().next() == Some("cpu"))
        .ok_or_else(|| "No aggregate cpu line found in /proc/stat".to_string())?;

    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 8 {
        return Err(format!(
            "Invalid cpu line in /proc/stat: expected at least 8 fields, got {}",
            parts.len()
        ));
    }

    let field = |idx: usize| parts.get(idx).and_then(|v| v.parse::<u64>().ok()).unwrap_or(0);

    Ok(CpuStat {
        user: field(1),
        nice: field(2),
        system: field(3),
        idle: field(4),
        iowait: field(5),
        irq: field(6),
        softirq: field(7),
        steal: field(8),
    })
}

/// Reads aggregate CPU statistics from /proc/stat.
pub fn read_cpu_stat() -> Result<CpuStat, String> {
    let content = fs::read_to_string("/proc/stat")
        .map_err(|e| format!("Failed to read /proc/stat: {}", e))?;
    parse_cpu_stat(&content)
}

/// Samples CPU utilisation over `interval`. Blocks for the whole interval.
pub fn sample_cpu_percent(interval: Duration) -> Result<f64, String> {
    let before = read_cpu_stat()?;
    thread::sleep(interval);
    let after = read_cpu_stat()?;
    Ok(after.busy_percent_since(&before))
}

/// Parses /proc/meminfo content into used-memory percentage.
///
/// Used memory is `MemTotal - MemAvailable`, matching what `free` reports.
pub fn parse_memory_percent(content: &str) -> Result<f64, String> {
    let mut total_kb: Option<u64> = None;
    let mut available_kb: Option<u64> = None;

    for line in content.lines() {
        let mut parts = line.split_whitespace();
        let key = parts.next();
        let value = parts.next().and_then(|v| v.parse::<u64>().ok());
        match key {
            Some("MemTotal:") => total_kb = value,
            Some("MemAvailable:") => available_kb = value,
            _ => {}
        }
        if total_kb.is_some() && available_kb.is_some() {
            break;
        }
    }

    match (total_kb, available_kb) {
        (Some(total), Some(available)) if total > 0 => {
            let used = total.saturating_sub(available);
            Ok(used as f64 / total as f64 * 100.0)
        }
        _ => Err("Failed to parse MemTotal/MemAvailable from /proc/meminfo".to_string()),
    }
}

/// Reads used-memory percentage from /proc/meminfo.
pub fn read_memory_percent() -> Result<f64, String> {
    let content = fs::read_to_string("/proc/meminfo")
        .map_err(|e| format!("Failed to read /proc/meminfo: {}", e))?;
    parse_memory_percent(&content)
}

/// Reads the node name from the uname syscall.
pub fn read_hostname() -> Result<String, String> {
    use std::ffi::CStr;
    use std::mem;

    unsafe {
        // SAFETY: libc::utsname is a C struct with only arrays of i8/c_char
        // which are valid for zeroed memory initialization
        let mut utsname: libc::utsname = mem::zeroed();
        if libc::uname(&mut utsname) == 0 {
            let nodename = CStr::from_ptr(utsname.nodename.as_ptr())
                .to_string_lossy()
                .into_owned();
            Ok(nodename)
        } else {
            Err("Failed to call uname".to_string())
        }
    }
}
