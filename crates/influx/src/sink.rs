//! The sink seam between the pipeline and the time-series store.

use crate::client::InfluxClient;
use crate::config::InfluxConfig;
use crate::health::check_connection;
use async_trait::async_trait;
use engine_core::{EnrichedRecord, Result};
use std::sync::atomic::{AtomicBool, Ordering};

/// Destination of enriched records.
///
/// `write` errors are fatal to the run; `ping` only reports reachability.
#[async_trait]
pub trait PointSink: Send + Sync {
    async fn write(&self, records: &[EnrichedRecord]) -> Result<()>;

    async fn ping(&self) -> bool;
}

/// InfluxDB-backed sink.
///
/// Pings before the first write and after any failed ping; a failed ping
/// is logged and the write is attempted anyway.
pub struct InfluxSink {
    client: InfluxClient,
    reachable: AtomicBool,
}

impl InfluxSink {
    pub fn new(config: InfluxConfig) -> Result<Self> {
        Ok(Self::from_client(InfluxClient::new(config)?))
    }

    pub fn from_client(client: InfluxClient) -> Self {
        Self {
            client,
            reachable: AtomicBool::new(false),
        }
    }

    pub fn client(&self) -> &InfluxClient {
        &self.client
    }
}

#[async_trait]
impl PointSink for InfluxSink {
    async fn write(&self, records: &[EnrichedRecord]) -> Result<()> {
        if !self.reachable.load(Ordering::Relaxed) {
            self.ping().await;
        }
        self.client.write(records).await
    }

    async fn ping(&self) -> bool {
        let ok = check_connection(&self.client).await;
        self.reachable.store(ok, Ordering::Relaxed);
        ok
    }
}
