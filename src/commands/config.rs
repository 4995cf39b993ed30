//! Config command implementation.
//!
//! Generates configuration files in various formats.

use std::fs;
use std::path::PathBuf;

use crate::cli::ConfigFormat;
use crate::config::{render_config, Config};

/// Generates configuration files.
pub fn command_config(
    output: Option<PathBuf>,
    format: ConfigFormat,
    commented: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::default();
    let output = match output {
        Some(path) => path,
        None => PathBuf::from("herakles-host-sampler.yaml"),
    };

    let mut content = render_config(&config, &format)?;
    if commented && matches!(format, ConfigFormat::Yaml) {
        content = add_config_comments(content);
    }

    if output.to_string_lossy() == "-" {
        print!("{}", content);
    } else {
        fs::write(&output, content)?;
        println!("✅ Configuration written to: {}", output.display());
    }

    Ok(())
}

/// Adds comments to YAML configuration.
fn add_config_comments(yaml: String) -> String {
    let comments = r#"# Herakles Host Sampler Configuration
# ====================================
#
# Identity and Delivery
# ---------------------
# server_name: null            # Server identifier (null = $NAME, then host name)
# api_url: "http://127.0.0.1/api/metrics"
# timeout_secs: 5              # HTTP timeout, no retries
#
# Persistence
# -----------
# state_file: "/tmp/herakles-host-sampler-state.json"
#
# Request Rate
# ------------
# request_source: log          # log | packets (one per deployment)
# interface: null              # Interface for request_source=packets
#
# Log Scanning
# ------------
# log_path: "/var/log/messages"
# block_size: 4096             # Bytes read per backward step
# log_pattern:
#   marker: "pdns_server:"     # Pre-filter; only these lines bound the scan
#   event: "pdns_server: Remote"
#   token: "wants"
#
# Host Sampling
# -------------
# cpu_sample_ms: 1000          # CPU measurement window
# devices: null                # Block devices to sum (null = all whole disks)
#
# Logging
# -------
# log_level: "info"            # off, error, warn, info, debug, trace

"#;
    format!("{}{}", comments, yaml)
}
