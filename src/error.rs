//! Error types for the sampler core.
//!
//! Only [`CollectorError::LaunchFailure`] and [`CollectorError::EmptyCommand`]
//! ever change supervisor control flow. Every other variant is absorbed where
//! it happens: field errors become a zero value, stream and reap errors send
//! the supervisor down the restart path.

use std::io;

/// Errors produced while launching, reading and parsing the external tool.
#[derive(Debug, thiserror::Error)]
pub enum CollectorError {
    #[error("command is empty after tokenization")]
    EmptyCommand,

    #[error("can't launch '{command}': {source}")]
    LaunchFailure {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("no '{label}' marker in output line")]
    FieldUnavailable { label: String },

    #[error("can't decode '{label}' from '{text}'")]
    FieldMalformed { label: String, text: String },

    #[error("tool output stream ended")]
    StreamEnded,

    #[error("failed to read tool output: {0}")]
    StreamRead(#[source] io::Error),

    #[error("failed to reap tool process: {0}")]
    ReapFailure(#[source] io::Error),

    #[error("failed to build sampler runtime: {0}")]
    Runtime(#[source] io::Error),
}

/// Result alias for the sampler core.
pub type Result<T> = std::result::Result<T, CollectorError>;
