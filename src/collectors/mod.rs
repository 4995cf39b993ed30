//! Collectors module for system metrics.
//!
//! This module contains collectors for the cumulative counters the sampler
//! turns into rates: disk I/O and network interface statistics.

pub mod diskstats;
pub mod netdev;
