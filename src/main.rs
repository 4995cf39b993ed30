//! herakles-host-sampler - version 0.1.0
//!
//! Run-once host sampler with tracing logging.
//! This is the main entry point that performs one sampling run or handles subcommands.

mod cli;
mod collectors;
mod commands;
mod config;
mod host;
mod system;
mod transport;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use std::time::Duration;
use tracing::level_filters::LevelFilter;
use tracing::{debug, error, info, warn};

use cli::{Args, Commands, LogLevel};
use commands::{command_check, command_config, command_count, command_generate_testlog};
use config::{
    resolve_config, show_config, validate_effective_config, Config, DEFAULT_CPU_SAMPLE_MS,
    DEFAULT_TIMEOUT_SECS,
};
use herakles_host_sampler::{
    LogPeriodCounter, MetricsTransport, RunError, SampleOrchestrator, StateStore,
    DEFAULT_BLOCK_SIZE,
};
use host::ProcfsSampler;
use transport::{HttpTransport, StdoutTransport};

/// Initializes tracing logging subsystem with configured log level.
fn setup_logging(config: &Config, args: &Args) {
    let level = args
        .log_level
        .clone()
        .or_else(|| {
            config
                .log_level
                .as_deref()
                .and_then(|s| LogLevel::from_str(s, true).ok())
        })
        .unwrap_or(LogLevel::Info);

    let filter = match level {
        LogLevel::Off => LevelFilter::OFF,
        LogLevel::Error => LevelFilter::ERROR,
        LogLevel::Warn => LevelFilter::WARN,
        LogLevel::Info => LevelFilter::INFO,
        LogLevel::Debug => LevelFilter::DEBUG,
        LogLevel::Trace => LevelFilter::TRACE,
    };

    // stderr keeps stdout clean for --dry-run and subcommand output
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }

    debug!("Logging initialized with level: {:?}", level);
}

/// Helper function to load and validate configuration.
/// Exits the process with error code 1 if validation fails.
fn load_validated_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let config = resolve_config(args)?;
    if let Err(e) = validate_effective_config(&config) {
        eprintln!("❌ Configuration invalid: {}", e);
        std::process::exit(1);
    }
    Ok(config)
}

/// Server identifier: configured name, else the kernel node name.
fn resolve_server_name(config: &Config) -> String {
    if let Some(name) = &config.server_name {
        return name.clone();
    }
    match system::read_hostname() {
        Ok(name) if !name.is_empty() => name,
        Ok(_) | Err(_) => {
            warn!("No server_name configured and host name unavailable, using 'unknown'");
            "unknown".to_string()
        }
    }
}

/// Performs one sampling run and delivers through `transport`.
async fn run_once<T: MetricsTransport>(config: &Config, transport: &T) -> anyhow::Result<()> {
    let server = resolve_server_name(config);
    let store = StateStore::new(config.state_file());
    let counter = LogPeriodCounter::new(config.log_pattern.clone())
        .block_size(config.block_size.unwrap_or(DEFAULT_BLOCK_SIZE));
    let orchestrator = SampleOrchestrator::new(
        server,
        store,
        counter,
        config.log_path(),
        config.request_source(),
    );

    let sampler = ProcfsSampler::new(
        Duration::from_millis(config.cpu_sample_ms.unwrap_or(DEFAULT_CPU_SAMPLE_MS)),
        config.devices.clone(),
        config.interface.clone(),
    );

    match orchestrator.run(&sampler, transport).await {
        Ok(report) => {
            debug!(
                "Run complete: elapsed={}s degraded={} state_saved={} delivered={}",
                report.elapsed_seconds,
                report.degraded,
                report.state_saved,
                report.delivery.is_ok()
            );
        }
        Err(RunError::Locked(e)) => warn!("{}", e),
    }

    Ok(())
}

/// Builds the transport for this invocation and runs once.
async fn run_sampling(config: &Config, dry_run: bool) -> anyhow::Result<()> {
    if dry_run {
        return run_once(config, &StdoutTransport).await;
    }

    let timeout = Duration::from_secs(config.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS));
    let transport =
        HttpTransport::new(config.api_url(), timeout).context("Failed to build HTTP client")?;
    run_once(config, &transport).await
}

/// Main application entry point.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Early config resolution for show/check modes
    if args.show_config || args.check_config {
        let config = resolve_config(&args)?;

        if args.check_config {
            if let Err(e) = validate_effective_config(&config) {
                eprintln!("❌ Configuration invalid: {}", e);
                std::process::exit(1);
            }
            println!("✅ Configuration is valid");
            return Ok(());
        }

        return show_config(&config, args.config_format.clone());
    }

    // Handle subcommands
    if let Some(command) = &args.command {
        // Config generation doesn't need config validation
        if let Commands::Config {
            output,
            format,
            commented,
        } = command
        {
            return command_config(output.clone(), format.clone(), *commented);
        }

        let config = load_validated_config(&args)?;
        setup_logging(&config, &args);

        return match command {
            Commands::Check => command_check(&config),

            Commands::Count { since, until } => command_count(*since, *until, &config),

            Commands::GenerateTestlog {
                output,
                lines,
                span_secs,
                query_ratio,
            } => command_generate_testlog(output.clone(), *lines, *span_secs, *query_ratio),

            Commands::Config { .. } => unreachable!("Config handled above"),
        };
    }

    // Load configuration for the sampling run
    let config = load_validated_config(&args)?;
    setup_logging(&config, &args);

    debug!("Starting herakles-host-sampler run");

    // A failed run is logged, never turned into a non-zero exit for cron
    if let Err(e) = run_sampling(&config, args.dry_run).await {
        error!("Sampling run failed: {:#}", e);
    }

    info!("herakles-host-sampler run finished");
    Ok(())
}
