//! Pipeline orchestration.
//!
//! Three stages joined by bounded channels:
//! 1. Fold: advance the window cache once per event, in arrival order,
//!    and forward each transition's evictions.
//! 2. Enrich: resolve series for evicted events, several at a time.
//! 3. Write: batch records into the sink.
//!
//! The stages run as one joined future. The first fatal error drops the
//! other stages, cancelling in-flight enrichments and unsent batches.

use crate::config::PipelineConfig;
use crate::state::PipelineState;
use crate::writer::BatchWriter;
use chrono::Duration;
use engine_core::{EnrichedRecord, Error, RawEvent, Result, WindowCache};
use futures::stream::{self, StreamExt};
use influx_client::PointSink;
use metadata_client::Enricher;
use serde::Serialize;
use std::sync::Arc;
use telemetry::Metrics;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

/// Outcome of a successful run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PipelineSummary {
    /// Events taken from the input
    pub events: u64,
    /// Evictions produced by the window, including the final flush
    pub evictions: u64,
    /// Records accepted by the sink
    pub records_written: u64,
}

/// The deduplication pipeline.
pub struct Pipeline {
    config: PipelineConfig,
    window: Duration,
    enricher: Arc<Enricher>,
    sink: Arc<dyn PointSink>,
    metrics: Arc<Metrics>,
    state: watch::Sender<PipelineState>,
}

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        window: Duration,
        enricher: Arc<Enricher>,
        sink: Arc<dyn PointSink>,
        metrics: Arc<Metrics>,
    ) -> Self {
        let (state, _) = watch::channel(PipelineState::Idle);
        Self {
            config: config.normalized(),
            window,
            enricher,
            sink,
            metrics,
            state,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Observe lifecycle transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<PipelineState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> PipelineState {
        *self.state.borrow()
    }

    fn transition(&self, next: PipelineState) {
        let current = self.state();
        if !current.can_transition_to(next) {
            warn!(from = %current, to = %next, "Unexpected pipeline transition");
        }
        info!(from = %current, to = %next, "Pipeline state changed");
        self.state.send_replace(next);
    }

    /// Run until `input` closes or a fatal error occurs.
    ///
    /// Closing the input is the end-of-stream signal: the window is closed
    /// and its remaining entries flow through enrichment into the sink
    /// before this returns.
    pub async fn run(&self, input: mpsc::Receiver<RawEvent>) -> Result<PipelineSummary> {
        if self.state() != PipelineState::Idle {
            return Err(Error::internal(format!(
                "pipeline can't start from state {}",
                self.state()
            )));
        }
        self.transition(PipelineState::Running);
        info!(
            window = %engine_core::IsoDuration::new(self.window),
            buffer_size = self.config.buffer_size,
            enrichment_concurrency = self.config.enrichment_concurrency,
            metadata = self.enricher.is_configured(),
            "Pipeline starting"
        );

        let (evicted_tx, evicted_rx) = mpsc::channel(self.config.buffer_size);
        let (record_tx, record_rx) = mpsc::channel(self.config.buffer_size);

        let writer = BatchWriter::new(
            self.sink.clone(),
            self.config.batch_size,
            self.config.flush_interval(),
            self.metrics.clone(),
        );

        let result = tokio::try_join!(
            self.fold(input, evicted_tx),
            self.enrich(evicted_rx, record_tx),
            writer.run(record_rx),
        );

        match result {
            Ok(((events, evictions), _, records_written)) => {
                self.transition(PipelineState::Terminated);
                let summary = PipelineSummary {
                    events,
                    evictions,
                    records_written,
                };
                info!(?summary, "Pipeline finished");
                Ok(summary)
            }
            Err(e) => {
                error!(error = %e, "Pipeline failed");
                self.transition(PipelineState::Failed);
                self.transition(PipelineState::Terminated);
                Err(e)
            }
        }
    }

    /// Stage 1. Sole owner of the window cache.
    async fn fold(
        &self,
        mut input: mpsc::Receiver<RawEvent>,
        evicted: mpsc::Sender<RawEvent>,
    ) -> Result<(u64, u64)> {
        let mut cache = WindowCache::empty();
        let mut events = 0u64;
        let mut evictions = 0u64;

        while let Some(event) = input.recv().await {
            events += 1;
            self.metrics.events_received.inc();

            cache = cache.advance(event, self.window);
            self.metrics.window_size.set(cache.len() as u64);
            evictions += self.forward(&evicted, cache.take_evictions()).await?;
        }

        self.transition(PipelineState::Draining);
        let mut cache = cache.close();
        self.metrics.window_size.set(0);
        evictions += self.forward(&evicted, cache.take_evictions()).await?;

        debug!(events, evictions, "Window fold finished");
        Ok((events, evictions))
    }

    async fn forward(&self, evicted: &mpsc::Sender<RawEvent>, batch: Vec<RawEvent>) -> Result<u64> {
        let count = batch.len() as u64;
        for event in batch {
            evicted
                .send(event)
                .await
                .map_err(|_| Error::internal("enrichment stage stopped"))?;
        }
        self.metrics.evictions.inc_by(count);
        Ok(count)
    }

    /// Stage 2. Completion order is not arrival order.
    async fn enrich(
        &self,
        mut evicted: mpsc::Receiver<RawEvent>,
        records: mpsc::Sender<EnrichedRecord>,
    ) -> Result<()> {
        let enricher = &self.enricher;
        let enriched = stream::poll_fn(move |cx| evicted.poll_recv(cx))
            .map(|event| enricher.enrich(event))
            .buffer_unordered(self.config.enrichment_concurrency);
        let mut enriched = std::pin::pin!(enriched);

        while let Some(record) = enriched.next().await {
            records
                .send(record?)
                .await
                .map_err(|_| Error::internal("sink writer stopped"))?;
            self.metrics
                .buffer_depth
                .set((records.max_capacity() - records.capacity()) as u64);
        }
        Ok(())
    }
}
