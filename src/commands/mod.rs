//! CLI command implementations for herakles-gpu-sampler.
//!
//! This module provides implementations for all CLI subcommands:
//! - `watch`: Continuous sampling (default)
//! - `parse`: Offline parsing of captured tool output
//! - `check`: Configuration and tool validation
//! - `config`: Configuration file generation

pub mod check;
pub mod config;
pub mod parse;
pub mod watch;

// Re-export command functions
pub use check::command_check;
pub use config::command_config;
pub use parse::command_parse;
pub use watch::command_watch;
