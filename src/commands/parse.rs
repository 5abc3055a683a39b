//! Parse command implementation.
//!
//! Runs the line parser over captured tool output, useful for checking a new
//! tool version's output format against the configured field labels.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;

use herakles_gpu_sampler::parser::ParsedLine;
use herakles_gpu_sampler::{parse_line, FieldSpec};

use super::watch::format_values;
use crate::cli::OutputFormat;
use crate::config::Config;

/// Totals over one parse run.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ParseSummary {
    pub lines: u64,
    pub lines_with_failures: u64,
    pub unavailable: u64,
    pub malformed: u64,
}

/// Parses every line of `reader`, calling `emit` for each data line.
pub fn parse_lines<R, F>(
    reader: R,
    fields: &[FieldSpec],
    skip_header: bool,
    mut emit: F,
) -> Result<ParseSummary, Box<dyn std::error::Error>>
where
    R: BufRead,
    F: FnMut(u64, &ParsedLine) -> Result<(), Box<dyn std::error::Error>>,
{
    let mut summary = ParseSummary::default();

    for (index, line) in reader.split(b'\n').enumerate() {
        let bytes = line?;
        if index == 0 && skip_header {
            continue;
        }
        let line = String::from_utf8_lossy(&bytes);
        let parsed = parse_line(&line, fields);

        summary.lines += 1;
        summary.unavailable += parsed.unavailable as u64;
        summary.malformed += parsed.malformed as u64;
        if parsed.failures() > 0 {
            summary.lines_with_failures += 1;
        }
        emit(index as u64 + 1, &parsed)?;
    }

    Ok(summary)
}

/// Parses captured output from a file or stdin and prints the values.
pub fn command_parse(
    input: Option<PathBuf>,
    no_header: bool,
    format: OutputFormat,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let reader: Box<dyn BufRead> = match input {
        Some(path) if path.to_string_lossy() != "-" => Box::new(BufReader::new(File::open(&path)?)),
        _ => Box::new(BufReader::new(io::stdin())),
    };

    let fields = config.fields();
    let summary = parse_lines(reader, &fields, !no_header, |line_no, parsed| {
        match format {
            OutputFormat::Text => {
                println!("line {}: {}", line_no, format_values(&parsed.values));
            }
            OutputFormat::Json => {
                let value = serde_json::json!({
                    "line": line_no,
                    "values": parsed.values,
                    "unavailable": parsed.unavailable,
                    "malformed": parsed.malformed,
                });
                println!("{}", serde_json::to_string(&value)?);
            }
        }
        Ok(())
    })?;

    eprintln!(
        "📋 {} lines parsed, {} with missing or unreadable fields ({} unavailable, {} malformed)",
        summary.lines, summary.lines_with_failures, summary.unavailable, summary.malformed
    );

    Ok(())
}
