//! Pipeline metrics.
//!
//! Collected in-memory and logged as a snapshot. A `Metrics` handle is
//! created once by the binary and passed into each component.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

/// A counter metric.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_by(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// A gauge metric (can go up or down).
#[derive(Debug, Default)]
pub struct Gauge(AtomicU64);

impl Gauge {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn set(&self, val: u64) {
        self.0.store(val, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Latency histogram with fixed millisecond buckets.
#[derive(Debug)]
pub struct Histogram {
    /// Buckets: 1ms, 10ms, 50ms, 100ms, 500ms, 1s, 5s, +inf
    buckets: [AtomicU64; 8],
    sum: AtomicU64,
    count: AtomicU64,
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

impl Histogram {
    const BUCKET_BOUNDS: [u64; 7] = [1, 10, 50, 100, 500, 1000, 5000];

    pub fn new() -> Self {
        Self {
            buckets: Default::default(),
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    /// Records a value in milliseconds.
    pub fn observe(&self, ms: u64) {
        self.sum.fetch_add(ms, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);

        let idx = Self::BUCKET_BOUNDS
            .iter()
            .position(|&bound| ms <= bound)
            .unwrap_or(Self::BUCKET_BOUNDS.len());
        self.buckets[idx].fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn mean(&self) -> f64 {
        let count = self.count();
        if count == 0 {
            0.0
        } else {
            self.sum.load(Ordering::Relaxed) as f64 / count as f64
        }
    }

    /// Bucket counts as (upper bound, count); the last bound is `u64::MAX`.
    pub fn buckets(&self) -> Vec<(u64, u64)> {
        Self::BUCKET_BOUNDS
            .iter()
            .copied()
            .chain(std::iter::once(u64::MAX))
            .zip(self.buckets.iter())
            .map(|(bound, count)| (bound, count.load(Ordering::Relaxed)))
            .collect()
    }
}

/// Counters for one pipeline run.
#[derive(Debug, Default)]
pub struct Metrics {
    // Input
    pub lines_read: Counter,
    pub events_received: Counter,
    pub events_dropped: Counter,

    // Window cache
    pub evictions: Counter,
    pub window_size: Gauge,

    // Enrichment
    pub metadata_cache_hits: Counter,
    pub metadata_cache_misses: Counter,
    pub metadata_errors: Counter,
    pub series_missing: Counter,

    // Sink
    pub records_written: Counter,
    pub sink_batches: Counter,
    pub buffer_depth: Gauge,
    pub sink_latency_ms: Histogram,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes a snapshot of current metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            timestamp: Utc::now(),
            lines_read: self.lines_read.get(),
            events_received: self.events_received.get(),
            events_dropped: self.events_dropped.get(),
            evictions: self.evictions.get(),
            window_size: self.window_size.get(),
            metadata_cache_hits: self.metadata_cache_hits.get(),
            metadata_cache_misses: self.metadata_cache_misses.get(),
            metadata_errors: self.metadata_errors.get(),
            series_missing: self.series_missing.get(),
            records_written: self.records_written.get(),
            sink_batches: self.sink_batches.get(),
            buffer_depth: self.buffer_depth.get(),
            sink_latency_mean_ms: self.sink_latency_ms.mean(),
        }
    }
}

/// A snapshot of metrics at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub timestamp: DateTime<Utc>,
    pub lines_read: u64,
    pub events_received: u64,
    pub events_dropped: u64,
    pub evictions: u64,
    pub window_size: u64,
    pub metadata_cache_hits: u64,
    pub metadata_cache_misses: u64,
    pub metadata_errors: u64,
    pub series_missing: u64,
    pub records_written: u64,
    pub sink_batches: u64,
    pub buffer_depth: u64,
    pub sink_latency_mean_ms: f64,
}

impl MetricsSnapshot {
    /// Log the snapshot as one structured line.
    pub fn log(&self) {
        info!(
            lines_read = self.lines_read,
            events_received = self.events_received,
            events_dropped = self.events_dropped,
            evictions = self.evictions,
            window_size = self.window_size,
            metadata_cache_hits = self.metadata_cache_hits,
            metadata_cache_misses = self.metadata_cache_misses,
            metadata_errors = self.metadata_errors,
            series_missing = self.series_missing,
            records_written = self.records_written,
            sink_batches = self.sink_batches,
            sink_latency_mean_ms = self.sink_latency_mean_ms,
            "Pipeline metrics"
        );
    }
}
