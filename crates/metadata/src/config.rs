//! Metadata service configuration.

use engine_core::IsoDuration;
use serde::{Deserialize, Serialize};

/// Token replaced by the tenant ID in `uri`.
pub const TENANT_PLACEHOLDER: &str = "{tenant}";

/// Metadata service configuration (the `[metadata]` section).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataConfig {
    /// Base URI, optionally containing `{tenant}`
    pub uri: String,
    /// Username for HTTP Basic auth (optional)
    pub username: Option<String>,
    /// Password for HTTP Basic auth (optional)
    pub password: Option<String>,
    /// Don't complain about subjects without a series
    #[serde(default)]
    pub series_are_optional: bool,
    /// How long a resolved series is reused; zero disables caching
    #[serde(default = "default_cache_expiration")]
    pub cache_expiration: IsoDuration,
    /// Upper bound on cached entries (unbounded if absent)
    pub cache_capacity: Option<u64>,
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_cache_expiration() -> IsoDuration {
    IsoDuration::default()
}

fn default_timeout_secs() -> u64 {
    10
}

impl MetadataConfig {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            username: None,
            password: None,
            series_are_optional: false,
            cache_expiration: default_cache_expiration(),
            cache_capacity: None,
            timeout_secs: default_timeout_secs(),
        }
    }

    /// Whether the URI depends on the tenant.
    pub fn is_tenant_scoped(&self) -> bool {
        self.uri.contains(TENANT_PLACEHOLDER)
    }
}
