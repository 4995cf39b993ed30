//! Network interface statistics collector.
//!
//! This module provides functionality to read network interface statistics from
//! /proc/net/dev for the packet-based request rate.

use std::collections::HashMap;
use std::fs;

/// Network interface statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetDevStats {
    pub receive_bytes: u64,
    pub receive_packets: u64,
    pub transmit_bytes: u64,
    pub transmit_packets: u64,
}

/// Parses /proc/net/dev content.
///
/// Returns a HashMap mapping interface names to their statistics.
pub fn parse_netdev(content: &str) -> HashMap<String, NetDevStats> {
    let mut stats = HashMap::new();

    // Skip the first two header lines
    for line in content.lines().skip(2) {
        // Split by ':' to separate interface name from stats
        let Some((interface, stats_str)) = line.split_once(':') else {
            continue;
        };

        let values: Vec<&str> = stats_str.split_whitespace().collect();
        if values.len() < 16 {
            continue; // Skip malformed lines
        }

        let net_stat = NetDevStats {
            receive_bytes: values[0].parse().unwrap_or(0),
            receive_packets: values[1].parse().unwrap_or(0),
            transmit_bytes: values[8].parse().unwrap_or(0),
            transmit_packets: values[9].parse().unwrap_or(0),
        };

        stats.insert(interface.trim().to_string(), net_stat);
    }

    stats
}

/// Reads network interface statistics from /proc/net/dev.
pub fn read_netdev_stats() -> Result<HashMap<String, NetDevStats>, String> {
    let content = fs::read_to_string("/proc/net/dev")
        .map_err(|e| format!("Failed to read /proc/net/dev: {}", e))?;
    Ok(parse_netdev(&content))
}
