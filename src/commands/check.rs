//! Check command implementation.
//!
//! Validates system requirements and configuration.

use std::fs::File;
use std::time::Duration;

use herakles_host_sampler::{RequestSource, StateError, StateStore};
use nix::unistd::geteuid;

use crate::collectors::{diskstats, netdev};
use crate::config::{validate_effective_config, Config};
use crate::system;

/// Validates system requirements and configuration.
pub fn command_check(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Herakles Host Sampler - System Check");
    println!("=======================================");

    let mut all_ok = true;

    println!("\n👤 Checking privileges...");
    if geteuid().is_root() {
        println!("   ✅ Running as root (uid=0)");
    } else {
        println!("   ⚠️  Not running as root - the system log may not be readable");
    }

    println!("\n📁 Checking /proc counters...");
    match system::sample_cpu_percent(Duration::from_millis(100)) {
        Ok(pct) => println!("   ✅ /proc/stat readable (cpu {:.1}%)", pct),
        Err(e) => {
            println!("   ❌ {}", e);
            all_ok = false;
        }
    }
    match system::read_memory_percent() {
        Ok(pct) => println!("   ✅ /proc/meminfo readable (mem {:.1}%)", pct),
        Err(e) => {
            println!("   ❌ {}", e);
            all_ok = false;
        }
    }
    match diskstats::read_diskstats() {
        Ok(stats) => {
            let (read, write) = diskstats::total_bytes(&stats, config.devices.as_deref());
            let (reads, writes) = diskstats::total_ops(&stats);
            println!(
                "   ✅ /proc/diskstats readable ({} devices, read={}MB in {} ops, write={}MB in {} ops)",
                stats.len(),
                read / 1024 / 1024,
                reads,
                write / 1024 / 1024,
                writes
            );
        }
        Err(e) => {
            println!("   ❌ {}", e);
            all_ok = false;
        }
    }

    if config.request_source() == RequestSource::Packets {
        println!("\n🌐 Checking network interface...");
        let iface = config.interface.as_deref().unwrap_or_default();
        match netdev::read_netdev_stats() {
            Ok(stats) => match stats.get(iface) {
                Some(dev) => println!(
                    "   ✅ Interface {} (rx {} packets / {}MB, tx {} packets / {}MB)",
                    iface,
                    dev.receive_packets,
                    dev.receive_bytes / 1024 / 1024,
                    dev.transmit_packets,
                    dev.transmit_bytes / 1024 / 1024
                ),
                None => {
                    println!("   ❌ Interface {} not found in /proc/net/dev", iface);
                    all_ok = false;
                }
            },
            Err(e) => {
                println!("   ❌ {}", e);
                all_ok = false;
            }
        }
    } else {
        println!("\n📜 Checking system log...");
        let log_path = config.log_path();
        match File::open(&log_path) {
            Ok(_) => println!("   ✅ {} readable", log_path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                println!(
                    "   ⚠️  {} does not exist yet - request counts will be 0",
                    log_path.display()
                );
            }
            Err(e) => {
                println!("   ❌ Cannot read {}: {}", log_path.display(), e);
                all_ok = false;
            }
        }
    }

    println!("\n💾 Checking state file...");
    let store = StateStore::new(config.state_file());
    match store.try_load() {
        Ok(state) => match state.timestamp {
            Some(ts) => println!("   ✅ Previous sample at {} ({})", ts, store.path().display()),
            None => println!("   ✅ No previous sample - next run starts fresh"),
        },
        Err(e) => println!("   ⚠️  {} - next run starts fresh", e),
    }
    if let Some(parent) = store.path().parent().filter(|p| !p.as_os_str().is_empty()) {
        if !parent.exists() {
            println!("   ⚠️  {} will be created on first run", parent.display());
        }
    }
    match store.lock() {
        Ok(_) => println!("   ✅ Run lock available"),
        Err(StateError::Busy { .. }) => println!("   ⚠️  Another run is in progress"),
        Err(e) => {
            println!("   ❌ {}", e);
            all_ok = false;
        }
    }

    println!("\n⚙️  Checking configuration...");
    match validate_effective_config(config) {
        Ok(_) => println!("   ✅ Configuration is valid"),
        Err(e) => {
            println!("   ❌ Configuration invalid: {}", e);
            all_ok = false;
        }
    }

    println!("\n📋 Summary:");
    if all_ok {
        println!("   ✅ All checks passed - system is ready");
        Ok(())
    } else {
        println!("   ❌ Some checks failed - please review warnings");
        std::process::exit(1);
    }
}
