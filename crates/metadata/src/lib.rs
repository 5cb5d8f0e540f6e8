//! Metadata service client, series cache, and the enricher that turns
//! evicted events into sink-ready records.

pub mod cache;
pub mod client;
pub mod config;
pub mod enricher;

pub use cache::MetadataCache;
pub use client::MetadataClient;
pub use config::*;
pub use enricher::Enricher;
