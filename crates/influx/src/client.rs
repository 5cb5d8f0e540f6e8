//! InfluxDB 1.x HTTP API client.

use crate::config::InfluxConfig;
use crate::line_protocol;
use engine_core::{EnrichedRecord, Error, Result};
use reqwest::StatusCode;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

/// InfluxDB client wrapper.
#[derive(Clone)]
pub struct InfluxClient {
    http: reqwest::Client,
    write_url: Url,
    ping_url: Url,
    config: InfluxConfig,
}

impl InfluxClient {
    /// Creates a new InfluxDB client after validating the configuration.
    pub fn new(config: InfluxConfig) -> Result<Self> {
        let base = config.validate()?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::sink_config(format!("couldn't create HTTP client: {}", e)))?;

        let mut write_url = join(&base, "write")?;
        {
            let mut query = write_url.query_pairs_mut();
            query.append_pair("db", &config.database);
            if let Some(ref rp) = config.retention_policy {
                query.append_pair("rp", rp);
            }
            query.append_pair("precision", "ms");
        }
        let ping_url = join(&base, "ping")?;

        info!(
            url = %config.url,
            database = %config.database,
            retention_policy = ?config.retention_policy,
            "Created InfluxDB client"
        );

        Ok(Self {
            http,
            write_url,
            ping_url,
            config,
        })
    }

    pub fn write_url(&self) -> &Url {
        &self.write_url
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.config.username {
            Some(ref user) => request.basic_auth(user, self.config.password.as_ref()),
            None => request,
        }
    }

    /// `GET /ping`, true on 204.
    pub async fn ping(&self) -> Result<bool> {
        let response = self
            .authorize(self.http.get(self.ping_url.clone()))
            .send()
            .await
            .map_err(|e| Error::sink(format!("ping failed: {}", e)))?;
        Ok(response.status() == StatusCode::NO_CONTENT)
    }

    /// Write records in one request. Any failure is fatal to the run.
    pub async fn write(&self, records: &[EnrichedRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let body = line_protocol::encode(records);
        let response = self
            .authorize(self.http.post(self.write_url.clone()))
            .body(body)
            .send()
            .await
            .map_err(|e| Error::sink(format!("write failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::sink(format!(
                "write rejected with {}: {}",
                status,
                body.trim()
            )));
        }

        debug!(count = records.len(), "Wrote points to InfluxDB");
        Ok(())
    }
}

/// Append a path segment to the base URL.
fn join(base: &Url, segment: &str) -> Result<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| Error::sink_config(format!("url \"{}\" can't take a path", base)))?
        .pop_if_empty()
        .push(segment);
    Ok(url)
}
