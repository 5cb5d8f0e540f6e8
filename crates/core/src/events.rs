//! Event type definitions for the impression engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The key deciding whether two log lines describe the same logical view.
///
/// Equality and hashing cover exactly these three fields; channel and
/// timestamp of the underlying events play no part in deduplication.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventIdentity {
    /// The viewed subject (episode) ID
    pub subject_id: String,
    /// The tenant (organization) owning the subject
    pub tenant_id: String,
    /// Address of the client that issued the request
    pub source_address: String,
}

impl EventIdentity {
    pub fn new(
        subject_id: impl Into<String>,
        tenant_id: impl Into<String>,
        source_address: impl Into<String>,
    ) -> Self {
        Self {
            subject_id: subject_id.into(),
            tenant_id: tenant_id.into(),
            source_address: source_address.into(),
        }
    }

    /// Key used to look up metadata for this identity.
    pub fn metadata_key(&self) -> MetadataKey {
        MetadataKey {
            tenant_id: self.tenant_id.clone(),
            subject_id: self.subject_id.clone(),
        }
    }
}

impl fmt::Display for EventIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}@{}",
            self.tenant_id, self.subject_id, self.source_address
        )
    }
}

/// Cache key for subject metadata: (tenant, subject).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MetadataKey {
    pub tenant_id: String,
    pub subject_id: String,
}

/// A parsed and filtered access-log event, not yet enriched with metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEvent {
    pub identity: EventIdentity,
    /// Publication channel the asset was served from
    pub channel: String,
    pub timestamp: DateTime<Utc>,
    /// The original log line, for diagnostics only
    pub origin: String,
}

impl RawEvent {
    pub fn new(
        identity: EventIdentity,
        channel: impl Into<String>,
        timestamp: DateTime<Utc>,
        origin: impl Into<String>,
    ) -> Self {
        Self {
            identity,
            channel: channel.into(),
            timestamp,
            origin: origin.into(),
        }
    }

    /// Convert into a sink-ready record using the resolved series ID.
    pub fn into_record(self, series_id: impl Into<String>) -> EnrichedRecord {
        EnrichedRecord {
            tenant_id: self.identity.tenant_id,
            subject_id: self.identity.subject_id,
            channel: self.channel,
            series_id: series_id.into(),
            timestamp: self.timestamp,
        }
    }
}

/// A deduplicated, enriched event as handed to the time-series sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichedRecord {
    pub tenant_id: String,
    pub subject_id: String,
    pub channel: String,
    /// Series the subject belongs to; empty if unknown
    pub series_id: String,
    pub timestamp: DateTime<Utc>,
}
