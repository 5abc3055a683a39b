//! Line parser for radeontop dump output.
//!
//! A dump line looks like
//! `1699999999.123456: bus 03, gpu 12.50%, ee 0.00%, ..., mclk 100.00% 1.000ghz, sclk 39.84% 0.518ghz`
//! but field order, spacing and the set of fields change between tool
//! versions. Parsing is therefore best-effort: a missing or unreadable field
//! is reported and replaced by zero, it never aborts the line.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

use crate::error::CollectorError;

/// Name of the graphics-pipe load field.
pub const GPU_PIPE: &str = "gpu_pipe";
/// Name of the shader clock field.
pub const SHADER_CLOCK: &str = "shader_clock";

/// Plain or scientific decimal, optionally preceded by whitespace.
static NUMBER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([+-]?(?:\d+(?:\.\d*)?|\.\d+)(?:[eE][+-]?\d+)?)")
        .expect("number pattern is valid")
});

/// A named metric and the label that precedes its value in a line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub label: String,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
        }
    }
}

/// The two fields tracked by default: graphics pipe load and shader clock.
pub fn default_fields() -> Vec<FieldSpec> {
    vec![
        FieldSpec::new(GPU_PIPE, "gpu "),
        FieldSpec::new(SHADER_CLOCK, "sclk "),
    ]
}

/// Parses the number following the first occurrence of `label` in `line`.
///
/// The number may be integer, decimal or scientific; whatever follows it
/// (`%`, a unit, nothing) is ignored.
pub fn parse_field(line: &str, label: &str) -> Result<f64, CollectorError> {
    let start = line
        .find(label)
        .ok_or_else(|| CollectorError::FieldUnavailable {
            label: label.to_string(),
        })?;
    let rest = &line[start + label.len()..];

    NUMBER_RE
        .captures(rest)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .ok_or_else(|| CollectorError::FieldMalformed {
            label: label.to_string(),
            text: rest.trim_end().to_string(),
        })
}

/// Best-effort variant of [`parse_field`]: returns 0 and logs on any failure.
pub fn extract_field(line: &str, label: &str) -> f64 {
    match parse_field(line, label) {
        Ok(value) => value,
        Err(e) => {
            warn!("{} (line: {:?})", e, line.trim_end());
            0.0
        }
    }
}

/// Result of applying every configured field to one line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedLine {
    pub values: BTreeMap<String, f64>,
    pub unavailable: u32,
    pub malformed: u32,
}

impl ParsedLine {
    pub fn failures(&self) -> u32 {
        self.unavailable + self.malformed
    }
}

/// Extracts every field in `fields` from `line`, zero-filling failures.
pub fn parse_line(line: &str, fields: &[FieldSpec]) -> ParsedLine {
    let mut parsed = ParsedLine::default();

    for field in fields {
        let value = match parse_field(line, &field.label) {
            Ok(value) => value,
            Err(e) => {
                match e {
                    CollectorError::FieldUnavailable { .. } => parsed.unavailable += 1,
                    _ => parsed.malformed += 1,
                }
                warn!("{}: {} (line: {:?})", field.name, e, line.trim_end());
                0.0
            }
        };
        parsed.values.insert(field.name.clone(), value);
    }

    parsed
}
