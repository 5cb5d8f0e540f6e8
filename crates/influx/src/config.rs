//! InfluxDB configuration.

use engine_core::{Error, Result};
use serde::{Deserialize, Serialize};
use url::Url;

/// InfluxDB client configuration (the `[influxdb]` section).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfluxConfig {
    /// InfluxDB HTTP URL
    #[serde(default = "default_url")]
    pub url: String,
    /// Database name
    #[serde(default = "default_database")]
    pub database: String,
    /// Username (optional)
    pub username: Option<String>,
    /// Password (optional)
    pub password: Option<String>,
    /// Retention policy; the database default if absent
    pub retention_policy: Option<String>,
    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_url() -> String {
    "http://localhost:8086".to_string()
}

fn default_database() -> String {
    "impressions".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for InfluxConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            database: default_database(),
            username: None,
            password: None,
            retention_policy: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl InfluxConfig {
    /// Check the configuration, returning the parsed base URL.
    pub fn validate(&self) -> Result<Url> {
        let url = Url::parse(&self.url)
            .map_err(|e| Error::sink_config(format!("invalid url \"{}\": {}", self.url, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::sink_config(format!(
                "unsupported scheme \"{}\"",
                url.scheme()
            )));
        }
        if self.database.trim().is_empty() {
            return Err(Error::sink_config("database must not be empty"));
        }
        if self.password.is_some() && self.username.is_none() {
            return Err(Error::sink_config("password given without username"));
        }
        Ok(url)
    }
}
