//! HTTP client for the metadata service.

use crate::config::{MetadataConfig, TENANT_PLACEHOLDER};
use engine_core::{Error, MetadataKey, Result};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};
use url::Url;

/// Field of the event document naming the series.
const SERIES_FIELD: &str = "is_part_of";

/// Metadata service client.
///
/// The HTTP connection pool is shared by all tenants. Each tenant gets its
/// own base URL, built on first use and reused afterwards.
pub struct MetadataClient {
    http: reqwest::Client,
    config: MetadataConfig,
    /// Tenant -> resolved base URL
    endpoints: RwLock<HashMap<String, Arc<Url>>>,
}

impl MetadataClient {
    /// Creates a new metadata client.
    ///
    /// A URI without the tenant placeholder is validated immediately.
    pub fn new(config: MetadataConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                Error::metadata_configuration(format!("couldn't create HTTP client: {}", e))
            })?;

        let mut endpoints = HashMap::new();
        if !config.is_tenant_scoped() {
            endpoints.insert(String::new(), Arc::new(build_endpoint(&config.uri, "")?));
        }

        let client = Self {
            http,
            config,
            endpoints: RwLock::new(endpoints),
        };

        info!(
            uri = %client.config.uri,
            timeout_secs = client.config.timeout_secs,
            "Created metadata client"
        );
        Ok(client)
    }

    /// Base URL for a tenant, created on first use.
    pub async fn endpoint(&self, tenant_id: &str) -> Result<Arc<Url>> {
        let key = if self.config.is_tenant_scoped() {
            if tenant_id.is_empty() {
                return Err(Error::metadata_configuration(format!(
                    "uri \"{}\" needs a tenant but the event has none",
                    self.config.uri
                )));
            }
            tenant_id
        } else {
            ""
        };

        if let Some(url) = self.endpoints.read().await.get(key) {
            return Ok(url.clone());
        }

        let mut endpoints = self.endpoints.write().await;
        if let Some(url) = endpoints.get(key) {
            return Ok(url.clone());
        }

        let url = Arc::new(build_endpoint(&self.config.uri, key)?);
        debug!(tenant = %key, url = %url, "Created metadata endpoint");
        endpoints.insert(key.to_string(), url.clone());
        Ok(url)
    }

    /// Number of endpoints built so far.
    pub async fn endpoint_count(&self) -> usize {
        self.endpoints.read().await.len()
    }

    /// Fetch the series of one subject.
    ///
    /// `Ok(None)` means the subject exists but belongs to no series.
    pub async fn fetch_series(&self, key: &MetadataKey) -> Result<Option<String>> {
        let base = self.endpoint(&key.tenant_id).await?;
        let url = event_url(&base, &key.subject_id)?;

        debug!(url = %url, "Requesting event metadata");

        let mut request = self.http.get(url);
        if let Some(ref username) = self.config.username {
            request = request.basic_auth(username, self.config.password.as_ref());
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::MetadataTransport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::MetadataStatus {
                status: status.as_u16(),
                tenant: key.tenant_id.clone(),
                subject: key.subject_id.clone(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::MetadataTransport(e.to_string()))?;

        parse_series(&body)
    }
}

/// Substitute the tenant and check the result can carry a path.
fn build_endpoint(uri: &str, tenant_id: &str) -> Result<Url> {
    let raw = uri.replace(TENANT_PLACEHOLDER, tenant_id);
    let url = Url::parse(&raw).map_err(|e| {
        Error::metadata_configuration(format!("invalid metadata uri \"{}\": {}", raw, e))
    })?;
    if url.cannot_be_a_base() {
        return Err(Error::metadata_configuration(format!(
            "metadata uri \"{}\" can't take a path",
            raw
        )));
    }
    Ok(url)
}

/// `{base}/events/{subject}`
fn event_url(base: &Url, subject_id: &str) -> Result<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| {
            Error::metadata_configuration(format!("metadata uri \"{}\" can't take a path", base))
        })?
        .pop_if_empty()
        .push("events")
        .push(subject_id);
    Ok(url)
}

/// Extract the series from an event document.
///
/// Anything but a JSON object is a broken contract and fatal. A missing,
/// null, non-string, or empty field means "no series".
pub fn parse_series(body: &str) -> Result<Option<String>> {
    let value: serde_json::Value =
        serde_json::from_str(body).map_err(|_| Error::malformed_metadata(body))?;
    let object = value
        .as_object()
        .ok_or_else(|| Error::malformed_metadata(body))?;

    Ok(object
        .get(SERIES_FIELD)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string))
}
