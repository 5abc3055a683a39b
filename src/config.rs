//! Configuration management for herakles-gpu-sampler.
//!
//! This module handles loading, merging, and validating configuration from files
//! and CLI arguments. It supports YAML, JSON, and TOML formats.

use crate::cli::{Args, ConfigFormat, LogLevel};
use herakles_gpu_sampler::command::{tokenize_with_limit, DEFAULT_COMMAND, MAX_ARGUMENTS};
use herakles_gpu_sampler::monitor::DEFAULT_STOP_TIMEOUT;
use herakles_gpu_sampler::parser::default_fields;
use herakles_gpu_sampler::reader::DEFAULT_STALE_THRESHOLD_SECS;
use herakles_gpu_sampler::supervisor::{DEFAULT_MAX_LINE_BYTES, DEFAULT_RESTART_DELAY};
use herakles_gpu_sampler::{FieldSpec, MonitorSettings, SupervisorSettings};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

// Default configuration constants
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

/// Enhanced configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Tool invocation
    pub command: Option<String>,
    #[serde(alias = "max-arguments")]
    pub max_arguments: Option<usize>,

    // Supervision
    #[serde(alias = "restart-delay-secs")]
    pub restart_delay_secs: Option<u64>,
    #[serde(alias = "retry-on-launch-failure")]
    pub retry_on_launch_failure: Option<bool>,
    #[serde(alias = "stop-timeout-secs")]
    pub stop_timeout_secs: Option<u64>,
    #[serde(alias = "max-line-bytes")]
    pub max_line_bytes: Option<usize>,

    // Consumer side
    #[serde(alias = "stale-threshold-secs")]
    pub stale_threshold_secs: Option<u64>,
    #[serde(alias = "poll-interval-ms")]
    pub poll_interval_ms: Option<u64>,

    // Logging
    pub log_level: Option<String>,

    /// Fields extracted from every output line; kept last so TOML output
    /// stays valid (tables after values).
    pub fields: Option<Vec<FieldSpec>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            command: Some(DEFAULT_COMMAND.to_string()),
            max_arguments: Some(MAX_ARGUMENTS),
            restart_delay_secs: Some(DEFAULT_RESTART_DELAY.as_secs()),
            retry_on_launch_failure: Some(false),
            stop_timeout_secs: Some(DEFAULT_STOP_TIMEOUT.as_secs()),
            max_line_bytes: Some(DEFAULT_MAX_LINE_BYTES),
            stale_threshold_secs: Some(DEFAULT_STALE_THRESHOLD_SECS as u64),
            poll_interval_ms: Some(DEFAULT_POLL_INTERVAL_MS),
            log_level: Some("info".into()),
            fields: Some(default_fields()),
        }
    }
}

impl Config {
    pub fn command(&self) -> &str {
        self.command.as_deref().unwrap_or(DEFAULT_COMMAND)
    }

    pub fn fields(&self) -> Vec<FieldSpec> {
        self.fields.clone().unwrap_or_else(default_fields)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.unwrap_or(DEFAULT_POLL_INTERVAL_MS))
    }

    /// Library settings for the effective configuration.
    pub fn monitor_settings(&self) -> MonitorSettings {
        MonitorSettings {
            command: self.command().to_string(),
            max_arguments: self.max_arguments.unwrap_or(MAX_ARGUMENTS),
            supervisor: SupervisorSettings {
                restart_delay: self
                    .restart_delay_secs
                    .map(Duration::from_secs)
                    .unwrap_or(DEFAULT_RESTART_DELAY),
                fields: self.fields(),
                retry_on_launch_failure: self.retry_on_launch_failure.unwrap_or(false),
                max_line_bytes: self.max_line_bytes.unwrap_or(DEFAULT_MAX_LINE_BYTES),
            },
            stale_threshold_secs: self
                .stale_threshold_secs
                .map(|s| s.min(i64::MAX as u64) as i64)
                .unwrap_or(DEFAULT_STALE_THRESHOLD_SECS),
            stop_timeout: self
                .stop_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_STOP_TIMEOUT),
        }
    }
}

/// Validate effective config (used by --check-config and at startup)
pub fn validate_effective_config(cfg: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let max_arguments = cfg.max_arguments.unwrap_or(MAX_ARGUMENTS);
    if max_arguments == 0 {
        return Err("max_arguments must be at least 1".into());
    }

    if tokenize_with_limit(cfg.command(), max_arguments).is_empty() {
        return Err("command is empty after tokenization".into());
    }

    if cfg.restart_delay_secs == Some(0) {
        return Err("restart_delay_secs must be greater than 0".into());
    }

    if cfg.poll_interval_ms == Some(0) {
        return Err("poll_interval_ms must be greater than 0".into());
    }

    if cfg.stop_timeout_secs == Some(0) {
        return Err("stop_timeout_secs must be greater than 0".into());
    }

    if cfg.max_line_bytes == Some(0) {
        return Err("max_line_bytes must be greater than 0".into());
    }

    let fields = cfg.fields();
    if fields.is_empty() {
        return Err("At least one field must be configured".into());
    }

    let mut seen = HashSet::new();
    for field in &fields {
        if field.name.trim().is_empty() {
            return Err("Field names must not be empty".into());
        }
        if field.label.is_empty() {
            return Err(format!("Field '{}' has an empty label", field.name).into());
        }
        if !seen.insert(field.name.as_str()) {
            return Err(format!("Duplicate field name '{}'", field.name).into());
        }
    }

    if let Some(level) = cfg.log_level.as_deref() {
        if LogLevel::from_name(level).is_none() {
            return Err(format!(
                "Invalid log_level '{}', expected off/error/warn/info/debug/trace",
                level
            )
            .into());
        }
    }

    Ok(())
}

/// Resolves configuration from CLI args, config file, and defaults.
/// This enforces precedence: CLI (if provided) > config file > default.
pub fn resolve_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = if args.no_config {
        Config::default()
    } else {
        load_config(args.config.as_deref().and_then(|p| p.to_str()))?
    };

    if let Some(command) = &args.tool_command {
        config.command = Some(command.clone());
    }
    if let Some(secs) = args.restart_delay_secs {
        config.restart_delay_secs = Some(secs);
    }
    if let Some(secs) = args.stale_threshold_secs {
        config.stale_threshold_secs = Some(secs);
    }
    if let Some(ms) = args.poll_interval_ms {
        config.poll_interval_ms = Some(ms);
    }
    if args.retry_on_launch_failure {
        config.retry_on_launch_failure = Some(true);
    }
    if let Some(level) = args.log_level {
        config.log_level = Some(format!("{:?}", level).to_lowercase());
    }

    Ok(config)
}

/// Enhanced configuration loading with multiple format support
pub fn load_config(path: Option<&str>) -> Result<Config, Box<dyn std::error::Error>> {
    let path = if let Some(p) = path {
        PathBuf::from(p)
    } else {
        // Try default locations
        let defaults = [
            "/etc/herakles/gpu-sampler.yaml",
            "/etc/herakles/gpu-sampler.yml",
            "/etc/herakles/gpu-sampler.json",
            "./herakles-gpu-sampler.yaml",
            "./herakles-gpu-sampler.yml",
            "./herakles-gpu-sampler.json",
        ];

        defaults
            .iter()
            .find(|p| Path::new(p).exists())
            .map(PathBuf::from)
            .unwrap_or_default()
    };

    if path.as_os_str().is_empty() || !path.exists() {
        return Ok(Config::default());
    }

    let content = fs::read_to_string(&path)?;

    match path.extension().and_then(|s| s.to_str()) {
        Some("json") => {
            let config: Config = serde_json::from_str(&content)?;
            info!("Loaded JSON configuration from: {}", path.display());
            Ok(config)
        }
        Some("toml") => {
            let config: Config = toml::from_str(&content)?;
            info!("Loaded TOML configuration from: {}", path.display());
            Ok(config)
        }
        _ => {
            // Default to YAML
            let config: Config = serde_yaml::from_str(&content)?;
            info!("Loaded YAML configuration from: {}", path.display());
            Ok(config)
        }
    }
}

/// Renders configuration in the requested format.
pub fn render_config(
    config: &Config,
    format: ConfigFormat,
) -> Result<String, Box<dyn std::error::Error>> {
    let output = match format {
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        ConfigFormat::Toml => toml::to_string_pretty(config)?,
        ConfigFormat::Yaml => serde_yaml::to_string(config)?,
    };
    Ok(output)
}

/// Shows configuration in requested format
pub fn show_config(config: &Config, format: ConfigFormat) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", render_config(config, format)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;

    fn write_temp(suffix: &str, content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(suffix)
            .tempfile()
            .expect("temp file");
        file.write_all(content.as_bytes()).expect("write temp file");
        file
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(validate_effective_config(&config).is_ok());
        assert_eq!(config.command(), "radeontop -d - -i 1");
        assert_eq!(config.poll_interval(), Duration::from_millis(1000));
    }

    #[test]
    fn test_default_monitor_settings() {
        let settings = Config::default().monitor_settings();
        assert_eq!(settings.command, DEFAULT_COMMAND);
        assert_eq!(settings.max_arguments, 128);
        assert_eq!(settings.stale_threshold_secs, 2);
        assert_eq!(settings.supervisor.restart_delay, Duration::from_secs(5));
        assert!(!settings.supervisor.retry_on_launch_failure);
        assert_eq!(settings.supervisor.fields.len(), 2);
        assert_eq!(settings.supervisor.max_line_bytes, 64 * 1024);
    }

    #[test]
    fn test_validation_rejects_empty_command() {
        let config = Config {
            command: Some("   \t ".into()),
            ..Config::default()
        };
        assert!(validate_effective_config(&config).is_err());
    }

    #[test]
    fn test_validation_rejects_zero_intervals() {
        let config = Config {
            restart_delay_secs: Some(0),
            ..Config::default()
        };
        assert!(validate_effective_config(&config).is_err());

        let config = Config {
            poll_interval_ms: Some(0),
            ..Config::default()
        };
        assert!(validate_effective_config(&config).is_err());

        let config = Config {
            max_line_bytes: Some(0),
            ..Config::default()
        };
        assert!(validate_effective_config(&config).is_err());
    }

    #[test]
    fn test_validation_rejects_bad_fields() {
        let config = Config {
            fields: Some(vec![]),
            ..Config::default()
        };
        assert!(validate_effective_config(&config).is_err());

        let config = Config {
            fields: Some(vec![
                FieldSpec::new("gpu_pipe", "gpu "),
                FieldSpec::new("gpu_pipe", "sclk "),
            ]),
            ..Config::default()
        };
        let err = validate_effective_config(&config).unwrap_err();
        assert!(err.to_string().contains("Duplicate"));

        let config = Config {
            fields: Some(vec![FieldSpec::new("vram", "")]),
            ..Config::default()
        };
        assert!(validate_effective_config(&config).is_err());
    }

    #[test]
    fn test_validation_rejects_unknown_log_level() {
        let config = Config {
            log_level: Some("verbose".into()),
            ..Config::default()
        };
        assert!(validate_effective_config(&config).is_err());
    }

    #[test]
    fn test_load_yaml_partial_config() {
        let file = write_temp(
            ".yaml",
            "command: \"radeontop -d - -i 2\"\n\
             restart_delay_secs: 3\n\
             fields:\n  - name: vram\n    label: \"vram \"\n",
        );
        let config = load_config(file.path().to_str()).unwrap();
        assert_eq!(config.command(), "radeontop -d - -i 2");
        assert_eq!(config.restart_delay_secs, Some(3));
        assert_eq!(config.poll_interval_ms, None);
        assert_eq!(config.fields(), vec![FieldSpec::new("vram", "vram ")]);

        let settings = config.monitor_settings();
        assert_eq!(settings.supervisor.restart_delay, Duration::from_secs(3));
        assert_eq!(settings.stale_threshold_secs, 2);
    }

    #[test]
    fn test_load_json_and_toml_by_extension() {
        let file = write_temp(".json", r#"{"command": "cat", "poll_interval_ms": 250}"#);
        let config = load_config(file.path().to_str()).unwrap();
        assert_eq!(config.command(), "cat");
        assert_eq!(config.poll_interval(), Duration::from_millis(250));

        let file = write_temp(".toml", "command = \"cat\"\nstale_threshold_secs = 5\n");
        let config = load_config(file.path().to_str()).unwrap();
        assert_eq!(config.stale_threshold_secs, Some(5));
    }

    #[test]
    fn test_load_invalid_yaml_fails() {
        let file = write_temp(".yaml", "restart_delay_secs: [not a number\n");
        assert!(load_config(file.path().to_str()).is_err());
    }

    #[test]
    fn test_toml_round_trip_of_defaults() {
        let rendered = render_config(&Config::default(), ConfigFormat::Toml).unwrap();
        let parsed: Config = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed.command(), DEFAULT_COMMAND);
        assert_eq!(parsed.fields(), default_fields());
    }

    #[test]
    fn test_cli_overrides_file() {
        let file = write_temp(".yaml", "command: \"radeontop\"\nrestart_delay_secs: 9\n");
        let path = file.path().to_string_lossy().to_string();
        let args = Args::parse_from([
            "herakles-gpu-sampler",
            "--config",
            path.as_str(),
            "--exec",
            "cat /dev/null",
            "--retry-on-launch-failure",
        ]);
        let config = resolve_config(&args).unwrap();
        assert_eq!(config.command(), "cat /dev/null");
        assert_eq!(config.restart_delay_secs, Some(9));
        assert_eq!(config.retry_on_launch_failure, Some(true));
    }

    #[test]
    fn test_no_config_uses_defaults() {
        let args = Args::parse_from(["herakles-gpu-sampler", "--no-config"]);
        let config = resolve_config(&args).unwrap();
        assert_eq!(config.command(), DEFAULT_COMMAND);
    }
}
