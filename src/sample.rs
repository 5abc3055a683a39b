//! Samples and the single-slot store shared by producer and consumer.

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use crate::parser::{ParsedLine, GPU_PIPE, SHADER_CLOCK};

/// One measurement snapshot.
///
/// A timestamp of 0 marks the "no data yet" sentinel.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Sample {
    /// Capture time, unix seconds.
    pub timestamp: i64,
    pub values: BTreeMap<String, f64>,
}

impl Sample {
    pub fn new(timestamp: i64, values: BTreeMap<String, f64>) -> Self {
        Self { timestamp, values }
    }

    /// Builds a sample from a parsed line stamped with `timestamp`.
    pub fn from_parsed(parsed: ParsedLine, timestamp: i64) -> Self {
        Self::new(timestamp, parsed.values)
    }

    pub fn is_empty(&self) -> bool {
        self.timestamp == 0
    }

    /// Raw value of a named field, 0 when absent.
    pub fn get(&self, name: &str) -> f64 {
        self.values.get(name).copied().unwrap_or(0.0)
    }

    /// Named field truncated to an unsigned integer (negative and NaN become 0).
    pub fn get_u32(&self, name: &str) -> u32 {
        self.get(name) as u32
    }

    pub fn gpu_pipe(&self) -> u32 {
        self.get_u32(GPU_PIPE)
    }

    pub fn shader_clock(&self) -> u32 {
        self.get_u32(SHADER_CLOCK)
    }
}

/// Holds the most recent sample behind a mutex.
///
/// The lock only ever guards an `Arc` swap or clone, never I/O, so a reader
/// waits at most for one pointer copy.
#[derive(Debug, Default)]
pub struct SampleStore {
    current: Mutex<Arc<Sample>>,
}

impl SampleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the stored sample.
    pub fn write(&self, sample: Sample) {
        let sample = Arc::new(sample);
        match self.current.lock() {
            Ok(mut guard) => *guard = sample,
            Err(poisoned) => *poisoned.into_inner() = sample,
        }
    }

    /// Returns the stored sample; never a partially updated one.
    pub fn read_copy(&self) -> Arc<Sample> {
        match self.current.lock() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Resets the store to the sentinel sample.
    pub fn clear(&self) {
        self.write(Sample::default());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(timestamp: i64, gpu: f64, sclk: f64) -> Sample {
        let mut values = BTreeMap::new();
        values.insert(GPU_PIPE.to_string(), gpu);
        values.insert(SHADER_CLOCK.to_string(), sclk);
        Sample::new(timestamp, values)
    }

    #[test]
    fn test_new_store_holds_sentinel() {
        let store = SampleStore::new();
        let current = store.read_copy();
        assert!(current.is_empty());
        assert_eq!(current.gpu_pipe(), 0);
        assert_eq!(current.shader_clock(), 0);
    }

    #[test]
    fn test_write_replaces_sample() {
        let store = SampleStore::new();
        store.write(sample(100, 55.0, 900.0));
        store.write(sample(101, 60.7, 950.0));

        let current = store.read_copy();
        assert_eq!(current.timestamp, 101);
        assert_eq!(current.gpu_pipe(), 60);
        assert_eq!(current.shader_clock(), 950);
    }

    #[test]
    fn test_read_copy_is_unaffected_by_later_writes() {
        let store = SampleStore::new();
        store.write(sample(100, 55.0, 900.0));
        let before = store.read_copy();
        store.write(sample(101, 1.0, 1.0));
        assert_eq!(before.gpu_pipe(), 55);
    }

    #[test]
    fn test_get_u32_saturates() {
        let s = sample(1, -3.0, f64::NAN);
        assert_eq!(s.gpu_pipe(), 0);
        assert_eq!(s.shader_clock(), 0);
        assert_eq!(s.get_u32("missing"), 0);
    }

    #[test]
    fn test_clear_restores_sentinel() {
        let store = SampleStore::new();
        store.write(sample(100, 55.0, 900.0));
        store.clear();
        assert!(store.read_copy().is_empty());
    }
}
