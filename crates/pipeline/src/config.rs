//! Pipeline tunables.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Pipeline configuration (the `[pipeline]` section).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Capacity of the buffers between fold, enrichment, and sink
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
    /// Capacity of the channel feeding parsed events into the pipeline
    #[serde(default = "default_input_buffer_size")]
    pub input_buffer_size: usize,
    /// Maximum enrichments in flight
    #[serde(default = "default_enrichment_concurrency")]
    pub enrichment_concurrency: usize,
    /// Records per sink write
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Maximum age of a partial batch before it's written
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,
}

fn default_buffer_size() -> usize {
    2048
}

fn default_input_buffer_size() -> usize {
    1024
}

fn default_enrichment_concurrency() -> usize {
    16
}

fn default_batch_size() -> usize {
    500
}

fn default_flush_interval_ms() -> u64 {
    1000
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            buffer_size: default_buffer_size(),
            input_buffer_size: default_input_buffer_size(),
            enrichment_concurrency: default_enrichment_concurrency(),
            batch_size: default_batch_size(),
            flush_interval_ms: default_flush_interval_ms(),
        }
    }
}

impl PipelineConfig {
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms.max(1))
    }

    /// Copy with every size clamped to at least one.
    pub fn normalized(&self) -> Self {
        Self {
            buffer_size: self.buffer_size.max(1),
            input_buffer_size: self.input_buffer_size.max(1),
            enrichment_concurrency: self.enrichment_concurrency.max(1),
            batch_size: self.batch_size.max(1),
            flush_interval_ms: self.flush_interval_ms.max(1),
        }
    }
}
