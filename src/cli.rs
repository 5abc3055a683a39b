//! CLI arguments and subcommands for herakles-gpu-sampler.
//!
//! This module defines the command-line interface structure using the clap library,
//! including all flags, options, and subcommands.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Log level options for CLI parsing
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Parses a config file log level name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "off" => Some(LogLevel::Off),
            "error" => Some(LogLevel::Error),
            "warn" => Some(LogLevel::Warn),
            "info" => Some(LogLevel::Info),
            "debug" => Some(LogLevel::Debug),
            "trace" => Some(LogLevel::Trace),
            _ => None,
        }
    }
}

/// Configuration format options for output
#[derive(Debug, Clone, ValueEnum)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

/// Output format for samples
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Main CLI arguments structure
#[derive(Parser, Debug)]
#[command(
    name = "herakles-gpu-sampler",
    about = "Background GPU load and shader clock sampler built on radeontop",
    long_about = "Background GPU load and shader clock sampler built on radeontop.\n\n\
                  Runs the GPU statistics tool as a supervised child process, parses its \
                  dump output and prints the freshest sample at a fixed interval. Samples \
                  older than the staleness threshold are reported as 'no data'.",
    author = "Michael Moll <exporter@herakles.now> - Herakles",
    version = "0.1.0",
    propagate_version = true,
    after_help = "More info: https://www.herakles.now - Support: exporter@herakles.now"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Tool command line (whitespace separated, no quoting)
    #[arg(short = 'e', long = "exec")]
    pub tool_command: Option<String>,

    /// Seconds to wait before relaunching a finished tool
    #[arg(long)]
    pub restart_delay_secs: Option<u64>,

    /// Samples older than this many seconds are reported as 'no data'
    #[arg(long)]
    pub stale_threshold_secs: Option<u64>,

    /// Poll interval for watch mode in milliseconds
    #[arg(long)]
    pub poll_interval_ms: Option<u64>,

    /// Keep relaunching when the tool cannot be started
    #[arg(long)]
    pub retry_on_launch_failure: bool,

    /// Log level (overrides log_level from the config file)
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
    /// Sample continuously and print the freshest values (default)
    Watch {
        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Stop after N polls
        #[arg(short = 'n', long)]
        count: Option<u64>,

        /// Print supervisor statistics on exit
        #[arg(long)]
        stats: bool,
    },

    /// Parse captured tool output offline
    Parse {
        /// Input file ('-' or omitted for stdin)
        input: Option<PathBuf>,

        /// Treat the first line as data instead of a header
        #[arg(long)]
        no_header: bool,

        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Validate configuration and tool availability
    Check,

    /// Generate configuration files
    Config {
        /// Output file path ('-' for stdout)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "yaml")]
        format: ConfigFormat,

        /// Include comments and examples
        #[arg(long)]
        commented: bool,
    },
}
