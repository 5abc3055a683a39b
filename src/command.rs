//! Command string handling.
//!
//! The external tool is configured as one whitespace-separated string. It is
//! re-tokenized right before every launch so that a changed command takes
//! effect on the next restart. Quoting is not supported: a token can never
//! contain whitespace.

use std::sync::{Arc, RwLock};
use tracing::warn;

/// Default invocation: dump one line per second to stdout.
pub const DEFAULT_COMMAND: &str = "radeontop -d - -i 1";

/// Maximum number of tokens kept from a command string.
pub const MAX_ARGUMENTS: usize = 128;

/// Splits `input` on runs of whitespace, keeping at most [`MAX_ARGUMENTS`] tokens.
pub fn tokenize(input: &str) -> Vec<String> {
    tokenize_with_limit(input, MAX_ARGUMENTS)
}

/// Splits `input` on runs of whitespace, keeping at most `limit` tokens.
///
/// Never fails. Tokens beyond `limit` are dropped with a warning.
pub fn tokenize_with_limit(input: &str, limit: usize) -> Vec<String> {
    let mut tokens = input.split_whitespace();
    let kept: Vec<String> = tokens.by_ref().take(limit).map(str::to_owned).collect();

    let dropped = tokens.count();
    if dropped > 0 {
        warn!(
            "Command has more than {} arguments, dropping the last {}",
            limit, dropped
        );
    }

    kept
}

/// Runtime-mutable command string shared by the controller and the supervisor.
///
/// Cloning yields another handle to the same string.
#[derive(Clone, Debug)]
pub struct CommandSpec {
    inner: Arc<RwLock<String>>,
    max_arguments: usize,
}

impl CommandSpec {
    pub fn new(command: impl Into<String>) -> Self {
        Self::with_max_arguments(command, MAX_ARGUMENTS)
    }

    pub fn with_max_arguments(command: impl Into<String>, max_arguments: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(command.into())),
            max_arguments,
        }
    }

    /// Current command string.
    pub fn get(&self) -> String {
        match self.inner.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Replaces the command string; picked up on the next launch.
    pub fn set(&self, command: impl Into<String>) {
        let command = command.into();
        match self.inner.write() {
            Ok(mut guard) => *guard = command,
            Err(poisoned) => *poisoned.into_inner() = command,
        }
    }

    /// Tokenizes the current command string.
    pub fn argv(&self) -> Vec<String> {
        tokenize_with_limit(&self.get(), self.max_arguments)
    }
}

impl Default for CommandSpec {
    fn default() -> Self {
        Self::new(DEFAULT_COMMAND)
    }
}
