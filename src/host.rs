//! `/proc`-backed host sampler.
//!
//! Every reading is best-effort. CPU and memory fall back to 0. Disk and packet
//! counters fall back to `None` rather than 0: a zero would be persisted and
//! turn the next run's rate into garbage.

use std::time::Duration;

use herakles_host_sampler::{HostSampler, Sample, SampleError};
use tracing::{debug, warn};

use crate::collectors::{diskstats, netdev};
use crate::system;

pub struct ProcfsSampler {
    cpu_interval: Duration,
    devices: Option<Vec<String>>,
    interface: Option<String>,
}

impl ProcfsSampler {
    pub fn new(
        cpu_interval: Duration,
        devices: Option<Vec<String>>,
        interface: Option<String>,
    ) -> Self {
        Self {
            cpu_interval,
            devices,
            interface,
        }
    }
}

impl HostSampler for ProcfsSampler {
    fn sample(&self) -> Result<Sample, SampleError> {
        let cpu_percent = system::sample_cpu_percent(self.cpu_interval).unwrap_or_else(|e| {
            warn!("CPU sampling failed, reporting 0: {}", e);
            0.0
        });

        let mem_percent = system::read_memory_percent().unwrap_or_else(|e| {
            warn!("Memory sampling failed, reporting 0: {}", e);
            0.0
        });

        let (disk_read_bytes, disk_write_bytes) = match diskstats::read_diskstats() {
            Ok(disks) => {
                let (read, write) = diskstats::total_bytes(&disks, self.devices.as_deref());
                (Some(read), Some(write))
            }
            Err(reason) => {
                let e = SampleError::Read {
                    what: "disk counters",
                    reason,
                };
                warn!("{}, disk counters unavailable this run", e);
                (None, None)
            }
        };

        let rx_packets = self
            .interface
            .as_deref()
            .and_then(|iface| match read_rx_packets(iface) {
                Ok(packets) => Some(packets),
                Err(e) => {
                    warn!("{}, packet counter unavailable this run", e);
                    None
                }
            });

        debug!(
            "Sampled cpu={:.1}% mem={:.1}% disk_read={:?}B disk_write={:?}B rx_packets={:?}",
            cpu_percent, mem_percent, disk_read_bytes, disk_write_bytes, rx_packets
        );

        Ok(Sample {
            cpu_percent: round1(cpu_percent),
            mem_percent: round1(mem_percent),
            disk_read_bytes,
            disk_write_bytes,
            rx_packets,
        })
    }
}

fn read_rx_packets(iface: &str) -> Result<u64, SampleError> {
    let stats = netdev::read_netdev_stats().map_err(|reason| SampleError::Read {
        what: "network counters",
        reason,
    })?;
    stats
        .get(iface)
        .map(|dev| dev.receive_packets)
        .ok_or_else(|| SampleError::UnknownInterface(iface.to_string()))
}

// psutil-style one decimal place
fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_live_host() {
        let sampler = ProcfsSampler::new(Duration::from_millis(50), None, None);
        let sample = sampler.sample().unwrap();
        assert!((0.0..=100.0).contains(&sample.cpu_percent));
        assert!((0.0..=100.0).contains(&sample.mem_percent));
        assert!(sample.disk_read_bytes.is_some());
        assert_eq!(sample.rx_packets, None);
    }

    #[test]
    fn test_unknown_interface_degrades_to_none() {
        let sampler = ProcfsSampler::new(
            Duration::from_millis(10),
            None,
            Some("does-not-exist0".into()),
        );
        let sample = sampler.sample().unwrap();
        assert_eq!(sample.rx_packets, None);
        assert!(sample.disk_write_bytes.is_some());
        assert!(matches!(
            read_rx_packets("does-not-exist0"),
            Err(SampleError::UnknownInterface(_))
        ));
    }

    #[test]
    fn test_loopback_packets() {
        let sampler = ProcfsSampler::new(Duration::from_millis(10), None, Some("lo".into()));
        assert!(sampler.sample().unwrap().rx_packets.is_some());
    }
}
