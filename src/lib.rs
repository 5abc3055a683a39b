//! Herakles GPU Sampler Library
//!
//! Runs an external GPU statistics tool (radeontop by default) in the
//! background, parses its line-oriented output and keeps the freshest sample
//! available to a polling consumer.
//!
//! # Features
//!
//! - **Supervised tool process**: the tool is relaunched whenever its output ends
//! - **Best-effort parsing**: unreadable fields become zero, lines are never dropped
//! - **Staleness detection**: samples older than the threshold read as "no data"
//! - **Runtime command changes**: a new command is picked up on the next launch
//!
//! # Usage
//!
//! ```rust,no_run
//! use herakles_gpu_sampler::{Monitor, MonitorSettings};
//!
//! let monitor = Monitor::new(MonitorSettings::default()).expect("runtime");
//! monitor.start();
//!
//! let sample = monitor.poll();
//! if sample.is_empty() {
//!     println!("no data");
//! } else {
//!     println!("gpu {}%  sclk {}", sample.gpu_pipe(), sample.shader_clock());
//! }
//!
//! monitor.stop();
//! ```

pub mod command;
pub mod error;
pub mod monitor;
pub mod parser;
pub mod reader;
pub mod sample;
pub mod stats;
pub mod supervisor;

// Re-export main types for convenience
pub use command::{tokenize, CommandSpec};
pub use error::CollectorError;
pub use monitor::{Monitor, MonitorSettings};
pub use parser::{extract_field, parse_line, FieldSpec};
pub use reader::SampleReader;
pub use sample::{Sample, SampleStore};
pub use stats::SupervisorStats;
pub use supervisor::{SupervisorExit, SupervisorPhase, SupervisorSettings};
