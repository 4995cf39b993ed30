//! CLI command implementations for herakles-host-sampler.
//!
//! This module provides implementations for all CLI subcommands:
//! - `check`: System validation
//! - `config`: Configuration file generation
//! - `count`: One-off log scan for an explicit period
//! - `generate-testlog`: Synthetic syslog generation

pub mod check;
pub mod config;
pub mod count;
pub mod generate;

// Re-export command functions
pub use check::command_check;
pub use config::command_config;
pub use count::command_count;
pub use generate::command_generate_testlog;
