//! Integration tests for the command line binary.

use std::io::Write;
use tempfile::NamedTempFile;

/// Helper to get the binary path
fn binary_path() -> std::path::PathBuf {
    std::path::PathBuf::from(env!("CARGO_BIN_EXE_herakles-gpu-sampler"))
}

fn config_file(suffix: &str, content: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(suffix)
        .tempfile()
        .expect("Failed to create config file");
    file.write_all(content.as_bytes())
        .expect("Failed to write config file");
    file
}

#[test]
fn test_check_config_defaults_valid() {
    let output = std::process::Command::new(binary_path())
        .args(["--no-config", "--check-config"])
        .output()
        .expect("Failed to execute command");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success());
    assert!(stdout.contains("Configuration is valid"), "stdout: '{}'", stdout);
}

#[test]
fn test_check_config_rejects_empty_command() {
    let output = std::process::Command::new(binary_path())
        .args(["--no-config", "--exec", "   ", "--check-config"])
        .output()
        .expect("Failed to execute command");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(!output.status.success());
    assert!(
        stderr.contains("command is empty after tokenization"),
        "stderr: '{}'",
        stderr
    );
}

#[test]
fn test_check_config_rejects_zero_restart_delay_from_file() {
    let file = config_file(".yaml", "restart_delay_secs: 0\n");
    let output = std::process::Command::new(binary_path())
        .arg("--config")
        .arg(file.path())
        .arg("--check-config")
        .output()
        .expect("Failed to execute command");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(!output.status.success());
    assert!(stderr.contains("restart_delay_secs"), "stderr: '{}'", stderr);
}

#[test]
fn test_show_config_merges_cli_over_file() {
    let file = config_file(
        ".json",
        r#"{"command": "radeontop -d - -i 3", "poll_interval_ms": 250}"#,
    );
    let output = std::process::Command::new(binary_path())
        .arg("--config")
        .arg(file.path())
        .args(["--poll-interval-ms", "500", "--show-config", "--config-format", "json"])
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let value: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("show-config output is JSON");
    assert_eq!(value["command"], "radeontop -d - -i 3");
    assert_eq!(value["poll_interval_ms"], 500);
}

#[test]
fn test_config_subcommand_writes_stdout() {
    let output = std::process::Command::new(binary_path())
        .args(["config", "--output", "-", "--format", "toml"])
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("command = "), "stdout: '{}'", stdout);
    assert!(stdout.contains("radeontop -d - -i 1"), "stdout: '{}'", stdout);
    assert!(stdout.contains("[[fields]]"), "stdout: '{}'", stdout);
}

#[test]
fn test_parse_subcommand_reads_file() {
    let capture = config_file(
        ".txt",
        "radeontop unknown_version, running on POLARIS10\n\
         1.0: bus 01, gpu 12.50%, ee 0.00%, sclk 39.84% 0.518ghz\n",
    );
    let output = std::process::Command::new(binary_path())
        .args(["--no-config", "--log-level", "off", "parse", "--format", "json"])
        .arg(capture.path())
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let line = stdout.lines().next().expect("one parsed line");
    let value: serde_json::Value = serde_json::from_str(line).expect("parsed line is JSON");
    assert_eq!(value["line"], 2);
    assert_eq!(value["values"]["gpu_pipe"], 12.5);
    assert_eq!(value["values"]["shader_clock"], 39.84);
}

#[test]
fn test_watch_exits_after_count() {
    let tool = config_file(
        ".sh",
        "echo banner\necho 'gpu 42%, sclk 1200MHz'\nexec sleep 30\n",
    );
    let command = format!("sh {}", tool.path().display());
    let output = std::process::Command::new(binary_path())
        .args(["--no-config", "--log-level", "off", "--poll-interval-ms", "200"])
        .args(["--exec", command.as_str()])
        .args(["watch", "--count", "10", "--format", "json"])
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.lines().count(), 10);
    assert!(
        stdout.contains("\"gpu_pipe\":42.0"),
        "expected a sample with gpu_pipe 42, got: '{}'",
        stdout
    );
}

#[test]
fn test_watch_fails_when_tool_missing() {
    let output = std::process::Command::new(binary_path())
        .args(["--no-config", "--log-level", "off", "--poll-interval-ms", "50"])
        .args(["--exec", "/nonexistent/herakles-fake-tool"])
        .args(["watch", "--count", "100"])
        .output()
        .expect("Failed to execute command");

    assert!(!output.status.success());
}
