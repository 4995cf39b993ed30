//! CLI arguments and subcommands for herakles-host-sampler.
//!
//! This module defines the command-line interface structure using the clap library,
//! including all flags, options, and subcommands.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Log level options for CLI parsing
#[derive(Debug, Clone, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Configuration format options for output
#[derive(Debug, Clone, ValueEnum)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

/// Request-rate strategy as accepted on the command line
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum RequestSourceArg {
    Log,
    Packets,
}

/// Main CLI arguments structure
#[derive(Parser, Debug)]
#[command(
    name = "herakles-host-sampler",
    about = "Run-once host sampler pushing CPU, memory, disk and request rates to a collector",
    long_about = "Run-once host sampler pushing CPU, memory, disk and request rates to a collector.\n\n\
                  Each invocation samples /proc, compares against the state persisted by the \
                  previous invocation to derive per-minute rates, counts PowerDNS queries logged \
                  since then by scanning the system log backward, and posts the result. \
                  Schedule it with cron or a systemd timer.",
    author = "Michael Moll <exporter@herakles.now> - Herakles",
    version = "0.1.0",
    propagate_version = true,
    after_help = "More info: https://www.herakles.now — Support: exporter@herakles.now"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Server identifier sent with every payload
    #[arg(short = 'n', long, env = "NAME")]
    pub server_name: Option<String>,

    /// Collector endpoint (http or https URL)
    #[arg(short = 'u', long)]
    pub api_url: Option<String>,

    /// State file carrying counters between runs
    #[arg(long)]
    pub state_file: Option<PathBuf>,

    /// System log to scan for request lines
    #[arg(long)]
    pub log_path: Option<PathBuf>,

    /// Where the request rate comes from
    #[arg(long, value_enum)]
    pub request_source: Option<RequestSourceArg>,

    /// Network interface for the packet request source
    #[arg(short = 'i', long)]
    pub interface: Option<String>,

    /// HTTP timeout in seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Print the payload instead of sending it (state is still updated)
    #[arg(long)]
    pub dry_run: bool,

    /// Log level (default: config file, then info)
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Config file (YAML/JSON/TOML)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Disable all config file loading
    #[arg(long)]
    pub no_config: bool,

    /// Print effective merged config and exit
    #[arg(long)]
    pub show_config: bool,

    /// Output format for --show-config
    #[arg(long, value_enum, default_value = "yaml")]
    pub config_format: ConfigFormat,

    /// Validate config and exit (return code 1 on error)
    #[arg(long)]
    pub check_config: bool,
}

/// Subcommands for additional functionality
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate configuration and system requirements
    Check,

    /// Generate configuration files
    Config {
        /// Output file path ("-" for stdout)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "yaml")]
        format: ConfigFormat,

        /// Include comments and examples
        #[arg(long)]
        commented: bool,
    },

    /// Count matching log lines in a period without touching state
    Count {
        /// Exclusive lower bound (epoch seconds)
        #[arg(long)]
        since: i64,

        /// Inclusive upper bound (epoch seconds, default: now)
        #[arg(long)]
        until: Option<i64>,
    },

    /// Generate a synthetic syslog file for exercising the log counter
    GenerateTestlog {
        /// Output file path
        #[arg(short = 'o', long, default_value = "messages.test")]
        output: PathBuf,

        /// Number of lines to generate
        #[arg(long, default_value_t = 10_000)]
        lines: usize,

        /// Time span covered by the file, ending now (seconds)
        #[arg(long, default_value_t = 3600)]
        span_secs: i64,

        /// Share of lines that are PowerDNS queries (0.0 - 1.0)
        #[arg(long, default_value_t = 0.6)]
        query_ratio: f64,
    },
}
