//! Configuration management for herakles-host-sampler.
//!
//! This module handles loading, merging, and validating configuration from files
//! and CLI arguments. It supports YAML, JSON, and TOML formats.

use crate::cli::{Args, ConfigFormat, RequestSourceArg};
use herakles_host_sampler::{LogPattern, RequestSource, DEFAULT_BLOCK_SIZE};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

// Default configuration constants
pub const DEFAULT_API_URL: &str = "http://127.0.0.1/api/metrics";
pub const DEFAULT_STATE_FILE: &str = "/tmp/herakles-host-sampler-state.json";
pub const DEFAULT_LOG_PATH: &str = "/var/log/messages";
pub const DEFAULT_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_CPU_SAMPLE_MS: u64 = 1000;

/// Effective configuration. Every field is optional so partial files merge
/// cleanly over the defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Identity and delivery
    #[serde(alias = "server-name")]
    pub server_name: Option<String>,
    #[serde(alias = "api-url")]
    pub api_url: Option<String>,
    #[serde(alias = "timeout-secs")]
    pub timeout_secs: Option<u64>,

    // Persistence
    #[serde(alias = "state-file")]
    pub state_file: Option<PathBuf>,

    // Request rate
    #[serde(alias = "request-source")]
    pub request_source: Option<RequestSource>,
    pub interface: Option<String>,

    // Log scanning
    #[serde(alias = "log-path")]
    pub log_path: Option<PathBuf>,
    #[serde(alias = "block-size")]
    pub block_size: Option<usize>,

    // Host sampling
    #[serde(alias = "cpu-sample-ms")]
    pub cpu_sample_ms: Option<u64>,
    /// Block devices to sum for disk counters (default: all whole disks)
    pub devices: Option<Vec<String>>,

    // Logging
    pub log_level: Option<String>,

    // Log match pattern (kept last: TOML tables must follow plain values)
    #[serde(default)]
    pub log_pattern: LogPattern,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_name: None,
            api_url: Some(DEFAULT_API_URL.to_string()),
            timeout_secs: Some(DEFAULT_TIMEOUT_SECS),
            state_file: Some(PathBuf::from(DEFAULT_STATE_FILE)),
            request_source: Some(RequestSource::Log),
            interface: None,
            log_path: Some(PathBuf::from(DEFAULT_LOG_PATH)),
            block_size: Some(DEFAULT_BLOCK_SIZE),
            cpu_sample_ms: Some(DEFAULT_CPU_SAMPLE_MS),
            devices: None,
            log_level: Some("info".into()),
            log_pattern: LogPattern::default(),
        }
    }
}

impl Config {
    pub fn api_url(&self) -> &str {
        self.api_url.as_deref().unwrap_or(DEFAULT_API_URL)
    }

    pub fn state_file(&self) -> PathBuf {
        self.state_file
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_FILE))
    }

    pub fn log_path(&self) -> PathBuf {
        self.log_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_PATH))
    }

    pub fn request_source(&self) -> RequestSource {
        self.request_source.clone().unwrap_or_default()
    }
}

/// Validate effective config (used by --check-config and at startup)
pub fn validate_effective_config(cfg: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let url = cfg.api_url();
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(format!("api_url '{}' must start with http:// or https://", url).into());
    }

    if cfg.timeout_secs == Some(0) {
        return Err("timeout_secs must be greater than 0".into());
    }

    if cfg.block_size == Some(0) {
        return Err("block_size must be greater than 0".into());
    }

    if cfg.log_pattern.marker.is_empty() {
        return Err("log_pattern.marker must not be empty".into());
    }

    if cfg.server_name.as_deref().is_some_and(|s| s.trim().is_empty()) {
        return Err("server_name must not be blank".into());
    }

    if cfg.request_source() == RequestSource::Packets
        && cfg.interface.as_deref().map_or(true, str::is_empty)
    {
        return Err("request_source is 'packets' but no interface is configured".into());
    }

    Ok(())
}

/// Resolves configuration from CLI args, config file, and defaults.
/// This enforces precedence: CLI (if provided) > config file > default.
pub fn resolve_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = if args.no_config {
        Config::default()
    } else {
        load_config(args.config.as_deref())?
    };

    if let Some(name) = &args.server_name {
        config.server_name = Some(name.clone());
    }
    if let Some(url) = &args.api_url {
        config.api_url = Some(url.clone());
    }
    if let Some(path) = &args.state_file {
        config.state_file = Some(path.clone());
    }
    if let Some(path) = &args.log_path {
        config.log_path = Some(path.clone());
    }
    if let Some(source) = args.request_source {
        config.request_source = Some(match source {
            RequestSourceArg::Log => RequestSource::Log,
            RequestSourceArg::Packets => RequestSource::Packets,
        });
    }
    if let Some(iface) = &args.interface {
        config.interface = Some(iface.clone());
    }
    if let Some(timeout) = args.timeout_secs {
        config.timeout_secs = Some(timeout);
    }

    Ok(config)
}

/// Enhanced configuration loading with multiple format support
pub fn load_config(path: Option<&Path>) -> Result<Config, Box<dyn std::error::Error>> {
    let path = if let Some(p) = path {
        p.to_path_buf()
    } else {
        // Try default locations
        let defaults = [
            "/etc/herakles/host-sampler.yaml",
            "/etc/herakles/host-sampler.yml",
            "/etc/herakles/host-sampler.json",
            "./herakles-host-sampler.yaml",
            "./herakles-host-sampler.yml",
            "./herakles-host-sampler.json",
        ];

        match defaults.iter().find(|p| Path::new(p).exists()) {
            Some(p) => PathBuf::from(p),
            None => return Ok(Config::default()),
        }
    };

    if !path.exists() {
        return Err(format!("Config file not found: {}", path.display()).into());
    }

    let content = fs::read_to_string(&path)?;
    parse_config(&content, path.extension().and_then(|s| s.to_str())).map(|config| {
        info!("Loaded configuration from: {}", path.display());
        config
    })
}

/// Parses config text, choosing the format from the file extension.
pub fn parse_config(
    content: &str,
    extension: Option<&str>,
) -> Result<Config, Box<dyn std::error::Error>> {
    let config = match extension {
        Some("json") => serde_json::from_str(content)?,
        Some("toml") => toml::from_str(content)?,
        // Default to YAML
        _ => serde_yaml::from_str(content)?,
    };
    Ok(config)
}

/// Shows configuration in requested format
pub fn show_config(config: &Config, format: ConfigFormat) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", render_config(config, &format)?);
    Ok(())
}

/// Serializes configuration in the requested format.
pub fn render_config(
    config: &Config,
    format: &ConfigFormat,
) -> Result<String, Box<dyn std::error::Error>> {
    let output = match format {
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        ConfigFormat::Toml => toml::to_string_pretty(config)?,
        ConfigFormat::Yaml => serde_yaml::to_string(config)?,
    };
    Ok(output)
}
