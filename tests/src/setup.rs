//! Common test setup functions.

use engine_core::{AccessLogFormat, AccessLogParser, EventFilter, RawEvent, Result};
use httpmock::MockServer;
use metadata_client::{Enricher, MetadataConfig};
use pipeline::{Pipeline, PipelineConfig, PipelineSummary};
use std::sync::Arc;
use telemetry::Metrics;
use tokio::sync::mpsc;

use crate::mocks::MockSink;

/// Test context with a mock sink and an optional mock metadata service.
///
/// Pipelines built here run the production fold, enrichment, and writer
/// code; only InfluxDB is replaced by `MockSink`.
pub struct TestContext {
    pub sink: Arc<MockSink>,
    pub metrics: Arc<Metrics>,
    pub metadata: Option<MockServer>,
}

impl TestContext {
    /// A context without a metadata service.
    pub fn new() -> Self {
        Self {
            sink: Arc::new(MockSink::new()),
            metrics: Arc::new(Metrics::new()),
            metadata: None,
        }
    }

    /// A context with a mock metadata service.
    pub async fn with_metadata() -> Self {
        Self {
            metadata: Some(MockServer::start_async().await),
            ..Self::new()
        }
    }

    /// The mock metadata service. Panics without one.
    pub fn metadata_server(&self) -> &MockServer {
        self.metadata.as_ref().expect("context has no metadata server")
    }

    /// Tenant-scoped configuration pointing at the mock service.
    pub fn metadata_config(&self, cache_expiration: &str) -> MetadataConfig {
        let mut config = MetadataConfig::new(self.metadata_server().url("/{tenant}"));
        config.cache_expiration = cache_expiration.parse().expect("valid duration");
        config.timeout_secs = 2;
        config
    }

    /// Build a pipeline over this context's sink and metrics.
    pub fn pipeline(
        &self,
        window: &str,
        metadata: Option<MetadataConfig>,
        config: PipelineConfig,
    ) -> Result<Pipeline> {
        let window: engine_core::IsoDuration = window.parse()?;
        let enricher = Enricher::new(metadata, self.metrics.clone())?;
        Ok(Pipeline::new(
            config,
            window.as_duration(),
            Arc::new(enricher),
            self.sink.clone(),
            self.metrics.clone(),
        ))
    }

    /// Feed `events` and wait for the run to finish.
    pub async fn run(&self, pipeline: &Pipeline, events: Vec<RawEvent>) -> Result<PipelineSummary> {
        let (tx, rx) = mpsc::channel(pipeline.config().input_buffer_size);
        let feed = async move {
            for event in events {
                if tx.send(event).await.is_err() {
                    break;
                }
            }
        };
        let (summary, _) = tokio::join!(pipeline.run(rx), feed);
        summary
    }

    /// Parse and filter access-log lines with the default grammar, then run them.
    pub async fn run_lines(
        &self,
        pipeline: &Pipeline,
        lines: &[String],
        filter: &EventFilter,
    ) -> Result<PipelineSummary> {
        let parser = AccessLogParser::new(&AccessLogFormat::default())?;
        let events = lines
            .iter()
            .filter_map(|line| parser.parse_event(line.trim_end(), filter))
            .collect();
        self.run(pipeline, events).await
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Small buffers so backpressure is exercised.
pub fn small_buffers() -> PipelineConfig {
    PipelineConfig {
        buffer_size: 4,
        input_buffer_size: 2,
        enrichment_concurrency: 4,
        batch_size: 3,
        flush_interval_ms: 50,
    }
}
