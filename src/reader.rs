//! Consumer-side polling with staleness detection.

use std::sync::Arc;

use crate::sample::{Sample, SampleStore};

/// Default maximum sample age in seconds.
pub const DEFAULT_STALE_THRESHOLD_SECS: i64 = 2;

/// Polls the store and hides samples older than the staleness threshold.
#[derive(Debug, Clone)]
pub struct SampleReader {
    store: Arc<SampleStore>,
    stale_threshold_secs: i64,
}

impl SampleReader {
    pub fn new(store: Arc<SampleStore>, stale_threshold_secs: i64) -> Self {
        Self {
            store,
            stale_threshold_secs,
        }
    }

    pub fn stale_threshold_secs(&self) -> i64 {
        self.stale_threshold_secs
    }

    /// Returns the current sample, or the sentinel if it is older than the
    /// threshold at `now` (unix seconds).
    ///
    /// Costs one lock acquisition and an `Arc` clone. A sample stamped in the
    /// future (wall clock stepped back) is returned as is.
    pub fn poll(&self, now: i64) -> Arc<Sample> {
        let sample = self.store.read_copy();
        if now - sample.timestamp > self.stale_threshold_secs {
            Arc::new(Sample::default())
        } else {
            sample
        }
    }

    /// [`poll`](Self::poll) at the current wall-clock time.
    pub fn poll_now(&self) -> Arc<Sample> {
        self.poll(chrono::Utc::now().timestamp())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{GPU_PIPE, SHADER_CLOCK};
    use std::collections::BTreeMap;

    fn reader_with_sample(timestamp: i64) -> SampleReader {
        let store = Arc::new(SampleStore::new());
        let mut values = BTreeMap::new();
        values.insert(GPU_PIPE.to_string(), 55.0);
        values.insert(SHADER_CLOCK.to_string(), 900.0);
        store.write(Sample::new(timestamp, values));
        SampleReader::new(store, DEFAULT_STALE_THRESHOLD_SECS)
    }

    #[test]
    fn test_fresh_sample_is_returned() {
        let reader = reader_with_sample(1000);
        let sample = reader.poll(1001);
        assert_eq!(sample.timestamp, 1000);
        assert_eq!(sample.gpu_pipe(), 55);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let reader = reader_with_sample(1000);
        assert_eq!(reader.poll(1002).timestamp, 1000);
    }

    #[test]
    fn test_stale_sample_becomes_sentinel() {
        let reader = reader_with_sample(1000);
        let sample = reader.poll(1003);
        assert!(sample.is_empty());
        assert_eq!(sample.gpu_pipe(), 0);
        assert_eq!(sample.shader_clock(), 0);
    }

    #[test]
    fn test_empty_store_is_stale() {
        let reader = SampleReader::new(Arc::new(SampleStore::new()), 2);
        assert!(reader.poll(chrono::Utc::now().timestamp()).is_empty());
    }

    #[test]
    fn test_future_sample_is_kept() {
        let reader = reader_with_sample(1000);
        assert_eq!(reader.poll(990).timestamp, 1000);
    }
}
