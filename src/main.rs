//! herakles-gpu-sampler - version 0.1.0
//!
//! GPU load and shader clock sampler with tracing logging.
//! This is the main entry point that starts the sampler and handles subcommands.

mod cli;
mod commands;
mod config;

use clap::Parser;
use tracing::info;
use tracing::level_filters::LevelFilter;

use cli::{Args, Commands, LogLevel, OutputFormat};
use commands::{command_check, command_config, command_parse, command_watch};
use config::{resolve_config, show_config, validate_effective_config, Config};

/// Initializes tracing logging subsystem with configured log level.
///
/// Logs go to stderr so sample output on stdout stays machine readable.
fn setup_logging(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let log_level = config
        .log_level
        .as_deref()
        .and_then(LogLevel::from_name)
        .unwrap_or(LogLevel::Info);

    let filter = match log_level {
        LogLevel::Off => LevelFilter::OFF,
        LogLevel::Error => LevelFilter::ERROR,
        LogLevel::Warn => LevelFilter::WARN,
        LogLevel::Info => LevelFilter::INFO,
        LogLevel::Debug => LevelFilter::DEBUG,
        LogLevel::Trace => LevelFilter::TRACE,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Logging initialized with level: {:?}", log_level);
    Ok(())
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

/// Main application entry point.
///
/// Synchronous: the sampler owns its own tokio runtime.
fn main() -> Result<(), Box<dyn std::error::Error>> {
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

    // Config generation works without a valid config
    if let Some(Commands::Config {
        output,
        format,
        commented,
    }) = &args.command
    {
        return command_config(output.clone(), format.clone(), *commented);
    }

    // Check reports invalid configuration itself
    if let Some(Commands::Check) = &args.command {
        let config = resolve_config(&args)?;
        return command_check(&config);
    }

    let config = load_validated_config(&args)?;
    setup_logging(&config)?;

    match &args.command {
        Some(Commands::Parse {
            input,
            no_header,
            format,
        }) => command_parse(input.clone(), *no_header, *format, &config),

        Some(Commands::Watch {
            format,
            count,
            stats,
        }) => {
            info!("Starting herakles-gpu-sampler");
            command_watch(&config, *format, *count, *stats)
        }

        None => {
            info!("Starting herakles-gpu-sampler");
            command_watch(&config, OutputFormat::Text, None, false)
        }

        Some(Commands::Config { .. }) => unreachable!("Config handled above"),
        Some(Commands::Check) => unreachable!("Check handled above"),
    }
}
