//! Mock implementations for testing.

use async_trait::async_trait;
use engine_core::{EnrichedRecord, Error, Result};
use influx_client::PointSink;
use parking_lot::Mutex;
use std::sync::Arc;

/// Mock sink that captures records in memory.
///
/// Implements the same `PointSink` trait as `InfluxSink`, so tests see
/// exactly what would be written without an InfluxDB server.
#[derive(Clone)]
pub struct MockSink {
    /// All records written through this sink.
    records: Arc<Mutex<Vec<EnrichedRecord>>>,
    /// Size of every write, in order.
    batches: Arc<Mutex<Vec<usize>>>,
    /// Simulate failures if set.
    should_fail: Arc<Mutex<bool>>,
}

impl MockSink {
    pub fn new() -> Self {
        Self {
            records: Arc::new(Mutex::new(Vec::new())),
            batches: Arc::new(Mutex::new(Vec::new())),
            should_fail: Arc::new(Mutex::new(false)),
        }
    }

    /// Get all captured records.
    pub fn captured_records(&self) -> Vec<EnrichedRecord> {
        self.records.lock().clone()
    }

    /// Get the count of captured records.
    pub fn record_count(&self) -> usize {
        self.records.lock().len()
    }

    /// Sizes of the writes received so far.
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batches.lock().clone()
    }

    /// Captured subject IDs, sorted.
    pub fn subjects(&self) -> Vec<String> {
        let mut subjects: Vec<String> = self
            .records
            .lock()
            .iter()
            .map(|r| r.subject_id.clone())
            .collect();
        subjects.sort();
        subjects
    }

    /// Set failure mode for testing error handling.
    pub fn set_should_fail(&self, fail: bool) {
        *self.should_fail.lock() = fail;
    }
}

impl Default for MockSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PointSink for MockSink {
    async fn write(&self, records: &[EnrichedRecord]) -> Result<()> {
        if *self.should_fail.lock() {
            return Err(Error::sink("Mock sink failure"));
        }

        self.batches.lock().push(records.len());
        self.records.lock().extend_from_slice(records);
        Ok(())
    }

    async fn ping(&self) -> bool {
        !*self.should_fail.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    #[tokio::test]
    async fn test_mock_sink_captures_records() {
        let mock = MockSink::new();
        let record = fixtures::raw_event("ep-1", "10.0.0.1", "10:00").into_record("series-1");

        mock.write(&[record]).await.unwrap();
        assert_eq!(mock.record_count(), 1);
        assert_eq!(mock.batch_sizes(), vec![1]);
        assert_eq!(mock.captured_records()[0].series_id, "series-1");
    }

    #[tokio::test]
    async fn test_mock_sink_failure_mode() {
        let mock = MockSink::new();
        mock.set_should_fail(true);

        let result = mock.write(&[]).await;
        assert!(result.is_err());
        assert!(!mock.ping().await);
    }
}
