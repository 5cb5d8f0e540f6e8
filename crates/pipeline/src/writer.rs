//! Batched sink writer.

use engine_core::{EnrichedRecord, Result};
use influx_client::PointSink;
use std::sync::Arc;
use std::time::{Duration, Instant};
use telemetry::Metrics;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

/// Records waiting for the next sink write.
#[derive(Debug)]
pub struct RecordBatch {
    records: Vec<EnrichedRecord>,
    created_at: Instant,
}

impl RecordBatch {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: Vec::with_capacity(capacity),
            created_at: Instant::now(),
        }
    }

    pub fn push(&mut self, record: EnrichedRecord) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Take records and reset the batch.
    pub fn take(&mut self) -> Vec<EnrichedRecord> {
        self.created_at = Instant::now();
        std::mem::take(&mut self.records)
    }
}

/// Drains the record buffer into the sink.
///
/// A batch is written when it reaches `batch_size`, when it's older than
/// `flush_interval`, and when the buffer closes. A failed write ends the
/// run; records in that batch are lost.
pub struct BatchWriter {
    sink: Arc<dyn PointSink>,
    batch_size: usize,
    flush_interval: Duration,
    metrics: Arc<Metrics>,
    written: u64,
}

impl BatchWriter {
    pub fn new(
        sink: Arc<dyn PointSink>,
        batch_size: usize,
        flush_interval: Duration,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            sink,
            batch_size: batch_size.max(1),
            flush_interval,
            metrics,
            written: 0,
        }
    }

    /// Run until the buffer closes, returning the number of records written.
    pub async fn run(mut self, mut records: mpsc::Receiver<EnrichedRecord>) -> Result<u64> {
        let mut batch = RecordBatch::with_capacity(self.batch_size);
        let mut ticker = tokio::time::interval(self.flush_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                record = records.recv() => match record {
                    Some(record) => {
                        batch.push(record);
                        if batch.len() >= self.batch_size {
                            self.flush(&mut batch).await?;
                        }
                    }
                    None => break,
                },
                _ = ticker.tick() => {
                    if !batch.is_empty() && batch.age() >= self.flush_interval {
                        self.flush(&mut batch).await?;
                    }
                }
            }
        }

        self.flush(&mut batch).await?;
        info!(records = self.written, "Sink writer drained");
        Ok(self.written)
    }

    async fn flush(&mut self, batch: &mut RecordBatch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let records = batch.take();
        let start = Instant::now();
        self.sink.write(&records).await?;

        let count = records.len() as u64;
        self.written += count;
        self.metrics
            .sink_latency_ms
            .observe(start.elapsed().as_millis() as u64);
        self.metrics.records_written.inc_by(count);
        self.metrics.sink_batches.inc();
        debug!(count, "Wrote batch");
        Ok(())
    }
}
