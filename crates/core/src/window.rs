//! Sliding-window deduplication.
//!
//! The window cache remembers every identity seen within the trailing
//! window. Each accepted event advances the cache's notion of "now" to the
//! event's timestamp; every identity whose last sighting is at least one
//! window old at that moment is evicted. Evictions are the unit that gets
//! counted downstream: one eviction per logical view.
//!
//! `advance` is a pure function of (prior cache, event, window). It takes
//! the cache by value and returns the next one, so the fold owner never
//! shares it and replaying the same input always yields the same evictions.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

use crate::events::{EventIdentity, RawEvent};

/// State of the sliding window between two events.
#[derive(Debug, Clone, Default)]
pub struct WindowCache {
    /// Latest sighting per identity, keyed by identity
    impressions: HashMap<EventIdentity, RawEvent>,
    /// Events evicted by the most recent transition only
    evictions: Vec<RawEvent>,
}

impl WindowCache {
    /// An empty cache, used at pipeline start.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Advance the window to `event.timestamp` and register the event.
    ///
    /// Entries with `event.timestamp - last_seen >= window` are evicted.
    /// A zero or negative window evicts every prior entry. The event itself
    /// is then inserted, overwriting (refreshing) any earlier sighting of
    /// the same identity.
    pub fn advance(mut self, event: RawEvent, window: Duration) -> Self {
        let now = event.timestamp;
        let expired: Vec<EventIdentity> = self
            .impressions
            .iter()
            .filter(|(_, seen)| now - seen.timestamp >= window)
            .map(|(id, _)| id.clone())
            .collect();

        let mut evictions = Vec::with_capacity(expired.len());
        for id in expired {
            if let Some(seen) = self.impressions.remove(&id) {
                evictions.push(seen);
            }
        }

        self.impressions.insert(event.identity.clone(), event);
        self.evictions = evictions;
        self
    }

    /// Flush: evict everything still held. Used once at end of stream.
    pub fn close(self) -> Self {
        Self {
            evictions: self.impressions.into_values().collect(),
            impressions: HashMap::new(),
        }
    }

    /// Events evicted by the most recent transition.
    pub fn evictions(&self) -> &[RawEvent] {
        &self.evictions
    }

    /// Take ownership of the most recent evictions, leaving none behind.
    pub fn take_evictions(&mut self) -> Vec<RawEvent> {
        std::mem::take(&mut self.evictions)
    }

    /// Identities currently inside the window with their last-seen time.
    pub fn impressions(&self) -> impl Iterator<Item = (&EventIdentity, DateTime<Utc>)> {
        self.impressions.iter().map(|(id, e)| (id, e.timestamp))
    }

    /// Last-seen time of a single identity, if it's inside the window.
    pub fn last_seen(&self, id: &EventIdentity) -> Option<DateTime<Utc>> {
        self.impressions.get(id).map(|e| e.timestamp)
    }

    /// Number of identities inside the window.
    pub fn len(&self) -> usize {
        self.impressions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.impressions.is_empty()
    }
}
