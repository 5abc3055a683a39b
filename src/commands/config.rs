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
        None => PathBuf::from("herakles-gpu-sampler.yaml"),
    };

    let mut content = render_config(&config, format.clone())?;
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
    let comments = r#"# Herakles GPU Sampler Configuration
# ==================================
#
# Tool Invocation
# ---------------
# command: "radeontop -d - -i 1"  # Whitespace separated, no quoting
# max_arguments: 128              # Extra tokens are dropped
#
# Supervision
# -----------
# restart_delay_secs: 5           # Pause before relaunching a finished tool
# retry_on_launch_failure: false  # Keep retrying when the tool can't start
# stop_timeout_secs: 10           # Abort the sampler if stop takes longer
# max_line_bytes: 65536           # Longer output lines are skipped
#
# Consumer
# --------
# stale_threshold_secs: 2         # Older samples read as 'no data'
# poll_interval_ms: 1000          # Watch mode print interval
#
# Logging
# -------
# log_level: "info"               # off, error, warn, info, debug, trace
#
# Fields
# ------
# fields:                         # Value follows the first occurrence of label
#   - name: gpu_pipe
#     label: "gpu "
#   - name: shader_clock
#     label: "sclk "
#   - name: memory_clock          # Example of an extra field
#     label: "mclk "
"#;

    format!("{comments}\n{yaml}")
}
