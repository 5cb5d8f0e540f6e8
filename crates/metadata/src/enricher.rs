//! Enrichment of evicted events with their series.

use crate::cache::MetadataCache;
use crate::client::MetadataClient;
use crate::config::MetadataConfig;
use engine_core::{EnrichedRecord, EventIdentity, RawEvent, Result};
use std::sync::Arc;
use telemetry::{health, Metrics};
use tracing::{debug, error};

/// Resolves series IDs and builds sink-ready records.
///
/// Shared by all concurrent enrichment tasks; the cache and the endpoint
/// map are the only state mutated concurrently.
pub struct Enricher {
    client: Option<MetadataClient>,
    cache: MetadataCache,
    series_are_optional: bool,
    metrics: Arc<Metrics>,
}

impl Enricher {
    /// Creates an enricher, or a pass-through one if `config` is `None`.
    pub fn new(config: Option<MetadataConfig>, metrics: Arc<Metrics>) -> Result<Self> {
        let Some(config) = config else {
            return Ok(Self::unconfigured(metrics));
        };

        let cache = MetadataCache::from_config(&config);
        let series_are_optional = config.series_are_optional;
        let client = MetadataClient::new(config)?;

        Ok(Self {
            client: Some(client),
            cache,
            series_are_optional,
            metrics,
        })
    }

    /// An enricher without a metadata service; every series is empty.
    pub fn unconfigured(metrics: Arc<Metrics>) -> Self {
        health().metadata.set_healthy();
        Self {
            client: None,
            cache: MetadataCache::disabled(),
            series_are_optional: true,
            metrics,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.client.is_some()
    }

    /// Resolve the series of an identity's subject, possibly empty.
    ///
    /// Per-event failures (bad status, timeout) come back as non-fatal
    /// errors; `enrich` absorbs them.
    pub async fn resolve(&self, identity: &EventIdentity) -> Result<String> {
        let Some(client) = &self.client else {
            return Ok(String::new());
        };

        let key = identity.metadata_key();
        if let Some(series) = self.cache.get(&key).await {
            self.metrics.metadata_cache_hits.inc();
            return Ok(series);
        }
        self.metrics.metadata_cache_misses.inc();

        let series = match client.fetch_series(&key).await? {
            Some(series) => series,
            None => {
                if !self.series_are_optional {
                    self.metrics.series_missing.inc();
                    error!(
                        tenant = %key.tenant_id,
                        subject = %key.subject_id,
                        "series missing"
                    );
                }
                String::new()
            }
        };

        health().metadata.set_healthy();
        self.cache.put(key, series.clone()).await;
        Ok(series)
    }

    /// Turn an evicted event into a record.
    ///
    /// Only fatal errors are returned. A recoverable failure is logged and
    /// the record is emitted with an empty series.
    pub async fn enrich(&self, event: RawEvent) -> Result<EnrichedRecord> {
        let series = match self.resolve(&event.identity).await {
            Ok(series) => series,
            Err(e) if !e.is_fatal() => {
                self.metrics.metadata_errors.inc();
                health().metadata.set_unhealthy(e.to_string());
                error!(
                    identity = %event.identity,
                    origin = %event.origin,
                    error = %e,
                    "metadata request failed"
                );
                String::new()
            }
            Err(e) => return Err(e),
        };

        debug!(identity = %event.identity, series = %series, "Enriched event");
        Ok(event.into_record(series))
    }
}
