//! Watch command implementation.
//!
//! Starts the sampler and prints the freshest sample at the poll interval
//! until interrupted.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use herakles_gpu_sampler::{Monitor, Sample, SupervisorExit};
use tracing::{error, info};

use crate::cli::OutputFormat;
use crate::config::Config;

/// Sleep granularity while waiting for the next poll, bounds Ctrl+C latency.
const TICK: Duration = Duration::from_millis(100);

/// Renders `name=value` pairs in field-name order.
pub fn format_values(values: &BTreeMap<String, f64>) -> String {
    values
        .iter()
        .map(|(name, value)| format!("{}={}", name, value))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Renders one polled sample as a single output line.
pub fn format_sample(
    sample: &Sample,
    format: OutputFormat,
) -> Result<String, Box<dyn std::error::Error>> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string(sample)?),
        OutputFormat::Text if sample.is_empty() => Ok("no data".to_string()),
        OutputFormat::Text => {
            let time = chrono::DateTime::<chrono::Utc>::from_timestamp(sample.timestamp, 0)
                .map(|t| t.format("%Y-%m-%dT%H:%M:%SZ").to_string())
                .unwrap_or_else(|| sample.timestamp.to_string());
            Ok(format!("{} {}", time, format_values(&sample.values)))
        }
    }
}

/// Runs the sampler until Ctrl+C/SIGTERM or until `count` polls are printed.
pub fn command_watch(
    config: &Config,
    format: OutputFormat,
    count: Option<u64>,
    show_stats: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let running = Arc::new(AtomicBool::new(true));
    let handler_flag = Arc::clone(&running);
    ctrlc::set_handler(move || handler_flag.store(false, Ordering::SeqCst))?;

    let monitor = Monitor::new(config.monitor_settings())?;
    monitor.start();

    let interval = config.poll_interval();
    let mut polls = 0u64;
    let mut failure = None;

    'outer: while running.load(Ordering::SeqCst) {
        let deadline = Instant::now() + interval;
        while Instant::now() < deadline {
            if !running.load(Ordering::SeqCst) {
                break 'outer;
            }
            std::thread::sleep(TICK.min(deadline.saturating_duration_since(Instant::now())));
        }

        if let Some(SupervisorExit::LaunchFailed(e)) = monitor.take_exit() {
            error!("Sampler gave up: {}", e);
            failure = Some(e);
            break;
        }

        let sample = monitor.poll();
        println!("{}", format_sample(&sample, format)?);

        polls += 1;
        if count.is_some_and(|n| polls >= n) {
            break;
        }
    }

    info!("Shutting down after {} polls", polls);
    monitor.stop();

    if show_stats {
        eprint!("{}", monitor.stats().render_table());
    }

    match failure {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}
