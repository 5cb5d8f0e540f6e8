//! Time-boxed cache of resolved series IDs.

use crate::config::MetadataConfig;
use engine_core::MetadataKey;
use moka::future::Cache;
use std::time::Duration;
use tracing::{debug, warn};

/// Longest accepted entry lifetime; moka refuses anything near 1000 years.
pub const MAX_TTL: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// Series cache keyed by (tenant, subject).
///
/// Expired entries are never returned. A disabled cache stores nothing
/// and misses on every lookup.
#[derive(Clone)]
pub struct MetadataCache {
    inner: Option<Cache<MetadataKey, String>>,
}

impl MetadataCache {
    /// Creates a cache whose entries live for `ttl`, optionally bounded in size.
    pub fn new(ttl: Duration, capacity: Option<u64>) -> Self {
        if ttl.is_zero() {
            return Self::disabled();
        }
        let ttl = if ttl > MAX_TTL {
            warn!(ttl_secs = ttl.as_secs(), "Metadata cache expiration capped at 100 years");
            MAX_TTL
        } else {
            ttl
        };

        let mut builder = Cache::builder().time_to_live(ttl);
        if let Some(capacity) = capacity {
            builder = builder.max_capacity(capacity);
        }

        debug!(ttl_ms = ttl.as_millis() as u64, capacity = ?capacity, "Metadata cache enabled");
        Self {
            inner: Some(builder.build()),
        }
    }

    /// A cache that never stores anything.
    pub fn disabled() -> Self {
        Self { inner: None }
    }

    /// Build from the `[metadata]` section. Negative expirations disable the cache.
    pub fn from_config(config: &MetadataConfig) -> Self {
        match config.cache_expiration.to_std() {
            Some(ttl) => Self::new(ttl, config.cache_capacity),
            None => Self::disabled(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    pub async fn get(&self, key: &MetadataKey) -> Option<String> {
        self.inner.as_ref()?.get(key).await
    }

    /// Store a resolved series, replacing any previous entry wholesale.
    pub async fn put(&self, key: MetadataKey, series_id: String) {
        if let Some(cache) = &self.inner {
            cache.insert(key, series_id).await;
        }
    }
}
