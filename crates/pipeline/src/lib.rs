//! Streaming pipeline: window fold, concurrent enrichment, batched sink writes.

pub mod config;
pub mod pipeline;
pub mod state;
pub mod writer;

pub use config::PipelineConfig;
pub use pipeline::{Pipeline, PipelineSummary};
pub use state::PipelineState;
pub use writer::{BatchWriter, RecordBatch};
