//! Disk I/O statistics collector.
//!
//! This module provides functionality to read disk I/O statistics from /proc/diskstats
//! and sum them into host-wide read/write byte counters.

use std::collections::HashMap;
use std::fs;

/// /proc/diskstats always counts in 512-byte sectors, whatever the device's
/// logical block size.
pub const SECTOR_SIZE: u64 = 512;

/// Disk statistics for a single device.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiskStats {
    pub reads_completed: u64,
    pub sectors_read: u64,
    pub writes_completed: u64,
    pub sectors_written: u64,
}

impl DiskStats {
    pub fn read_bytes(&self) -> u64 {
        self.sectors_read.saturating_mul(SECTOR_SIZE)
    }

    pub fn write_bytes(&self) -> u64 {
        self.sectors_written.saturating_mul(SECTOR_SIZE)
    }
}

/// Parses /proc/diskstats content.
///
/// Returns a HashMap mapping device names to their statistics.
/// Format: major minor name read_ios read_merges read_sectors read_ticks write_ios write_merges write_sectors ...
pub fn parse_diskstats(content: &str) -> HashMap<String, DiskStats> {
    let mut stats = HashMap::new();

    for line in content.lines() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 14 {
            continue; // Skip malformed lines
        }

        let device = parts[2].to_string();

        // Loop and RAM devices are not real disk traffic
        if device.starts_with("loop") || device.starts_with("ram") {
            continue;
        }

        let disk_stat = DiskStats {
            reads_completed: parts[3].parse().unwrap_or(0),
            sectors_read: parts[5].parse().unwrap_or(0),
            writes_completed: parts[7].parse().unwrap_or(0),
            sectors_written: parts[9].parse().unwrap_or(0),
        };

        stats.insert(device, disk_stat);
    }

    stats
}

/// Reads disk statistics from /proc/diskstats.
pub fn read_diskstats() -> Result<HashMap<String, DiskStats>, String> {
    let content = fs::read_to_string("/proc/diskstats")
        .map_err(|e| format!("Failed to read /proc/diskstats: {}", e))?;
    Ok(parse_diskstats(&content))
}

/// Whether `device` is a partition of another device present in `all`.
///
/// Partitions are counted by their parent already; summing both would double
/// the totals. Covers `sda1` under `sda`, and `nvme0n1p1` or `mmcblk0p1` under
/// a parent ending in a digit. `nvme0n10` is a sibling of `nvme0n1`, not a
/// partition.
fn is_partition(device: &str, all: &HashMap<String, DiskStats>) -> bool {
    all.keys().any(|parent| {
        let Some(suffix) = device.strip_prefix(parent.as_str()) else {
            return false;
        };
        let digits = if parent.ends_with(|c: char| c.is_ascii_digit()) {
            match suffix.strip_prefix('p') {
                Some(d) => d,
                None => return false,
            }
        } else {
            suffix
        };
        !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
    })
}

/// Sums read/write bytes across devices.
///
/// With `devices` set, only those names are summed. Otherwise every whole
/// disk is summed and partitions are skipped.
pub fn total_bytes(stats: &HashMap<String, DiskStats>, devices: Option<&[String]>) -> (u64, u64) {
    stats
        .iter()
        .filter(|(name, _)| match devices {
            Some(list) => list.iter().any(|d| d == *name),
            None => !is_partition(name, stats),
        })
        .fold((0u64, 0u64), |(r, w), (_, s)| {
            (r.saturating_add(s.read_bytes()), w.saturating_add(s.write_bytes()))
        })
}

/// Sums completed read/write operations across all devices.
pub fn total_ops(stats: &HashMap<String, DiskStats>) -> (u64, u64) {
    stats.values().fold((0u64, 0u64), |(r, w), s| {
        (r.saturating_add(s.reads_completed), w.saturating_add(s.writes_completed))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const DISKSTATS: &str = "\
   7       0 loop0 100 0 2000 10 0 0 0 0 0 10 10 0 0 0 0
   8       0 sda 1000 50 20000 500 400 20 8000 300 0 700 800 0 0 0 0
   8       1 sda1 900 40 18000 450 380 18 7600 280 0 650 730 0 0 0 0
 259       0 nvme0n1 3000 0 60000 900 1000 0 40000 600 0 1200 1500 0 0 0 0
 259       1 nvme0n1p1 2500 0 50000 800 900 0 36000 550 0 1100 1350 0 0 0 0
   8      16 sdb 10 0 100
";

    #[test]
    fn test_parse_diskstats_skips_loop_and_malformed() {
        let stats = parse_diskstats(DISKSTATS);
        assert!(!stats.contains_key("loop0"));
        assert!(!stats.contains_key("sdb"));
        assert_eq!(stats["sda"].sectors_read, 20000);
        assert_eq!(stats["sda"].sectors_written, 8000);
        assert_eq!(stats["sda"].read_bytes(), 20000 * 512);
    }

    #[test]
    fn test_total_bytes_skips_partitions() {
        let stats = parse_diskstats(DISKSTATS);
        let (read, write) = total_bytes(&stats, None);
        assert_eq!(read, (20000 + 60000) * 512);
        assert_eq!(write, (8000 + 40000) * 512);
    }

    #[test]
    fn test_numbered_sibling_disks_are_not_partitions() {
        let stats = parse_diskstats(
            "\
 259       0 nvme0n1 10 0 1000 0 10 0 100 0 0 0 0 0 0 0 0
 259       5 nvme0n10 10 0 2000 0 10 0 200 0 0 0 0 0 0 0 0
 259       6 nvme0n10p2 10 0 1500 0 10 0 150 0 0 0 0 0 0 0 0
 179       0 mmcblk0 10 0 4000 0 10 0 400 0 0 0 0 0 0 0 0
 179       1 mmcblk0p1 10 0 3000 0 10 0 300 0 0 0 0 0 0 0 0
   8      32 sdc 10 0 8000 0 10 0 800 0 0 0 0 0 0 0 0
   8      33 sdc1 10 0 7000 0 10 0 700 0 0 0 0 0 0 0 0
",
        );
        let (read, write) = total_bytes(&stats, None);
        assert_eq!(read, (1000 + 2000 + 4000 + 8000) * 512);
        assert_eq!(write, (100 + 200 + 400 + 800) * 512);
    }

    #[test]
    fn test_totals_saturate_instead_of_overflowing() {
        let mut stats = HashMap::new();
        for name in ["sda", "sdb"] {
            stats.insert(
                name.to_string(),
                DiskStats {
                    reads_completed: u64::MAX - 1,
                    sectors_read: u64::MAX / SECTOR_SIZE,
                    writes_completed: 3,
                    sectors_written: 1,
                },
            );
        }
        assert_eq!(total_ops(&stats), (u64::MAX, 6));
        assert_eq!(total_bytes(&stats, None).0, u64::MAX);
    }

    #[test]
    fn test_total_bytes_explicit_devices() {
        let stats = parse_diskstats(DISKSTATS);
        let devices = vec!["sda1".to_string()];
        let (read, write) = total_bytes(&stats, Some(&devices));
        assert_eq!(read, 18000 * 512);
        assert_eq!(write, 7600 * 512);
    }

    #[test]
    fn test_read_diskstats() {
        let result = read_diskstats();
        assert!(result.is_ok(), "Failed to read diskstats: {:?}", result);
    }
}
