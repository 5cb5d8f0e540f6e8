//! Configuration loading.
//!
//! Sources, lowest precedence first: built-in defaults, the TOML file
//! given on the command line, `IMPRESSION__`-prefixed environment variables.

use engine_core::{AccessLogFormat, Error, EventFilter, IsoDuration, Result};
use influx_client::InfluxConfig;
use metadata_client::cache::MAX_TTL;
use metadata_client::MetadataConfig;
use pipeline::PipelineConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use telemetry::TracingConfig;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/impression-engine.toml";

const ENV_PREFIX: &str = "IMPRESSION";

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Access log to read
    #[serde(default)]
    pub log_file: PathBuf,

    /// Deduplication window
    #[serde(default = "default_view_interval")]
    pub view_interval: IsoDuration,

    #[serde(default)]
    pub invalid_user_agents: Vec<String>,
    #[serde(default)]
    pub valid_file_extensions: Vec<String>,
    #[serde(default)]
    pub invalid_channels: Vec<String>,

    #[serde(default)]
    pub access_log: AccessLogFormat,

    #[serde(default)]
    pub influxdb: InfluxConfig,

    /// Absent means no metadata service
    #[serde(default)]
    pub metadata: Option<MetadataConfig>,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub logging: TracingConfig,
}

fn default_view_interval() -> IsoDuration {
    IsoDuration::new(chrono::Duration::hours(2))
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_file: PathBuf::new(),
            view_interval: default_view_interval(),
            invalid_user_agents: Vec::new(),
            valid_file_extensions: Vec::new(),
            invalid_channels: Vec::new(),
            access_log: AccessLogFormat::default(),
            influxdb: InfluxConfig::default(),
            metadata: None,
            pipeline: PipelineConfig::default(),
            logging: TracingConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn event_filter(&self) -> EventFilter {
        EventFilter {
            invalid_user_agents: self.invalid_user_agents.clone(),
            valid_file_extensions: self.valid_file_extensions.clone(),
            invalid_channels: self.invalid_channels.clone(),
        }
    }

    fn validate(self) -> Result<Self> {
        if self.log_file.as_os_str().is_empty() {
            return Err(Error::config("log_file is required"));
        }
        if let Some(ref metadata) = self.metadata {
            if metadata.cache_expiration.is_negative() {
                return Err(Error::config(format!(
                    "metadata.cache_expiration must not be negative, got {}",
                    metadata.cache_expiration
                )));
            }
            if metadata.cache_expiration.to_std().is_some_and(|ttl| ttl > MAX_TTL) {
                return Err(Error::config(format!(
                    "metadata.cache_expiration must not exceed 100 years, got {}",
                    metadata.cache_expiration
                )));
            }
        }
        Ok(self)
    }
}

/// Load configuration from a file and the environment.
pub fn load(path: &Path) -> Result<AppConfig> {
    if !path.is_file() {
        return Err(Error::ConfigNotFound(path.display().to_string()));
    }
    build(config::File::from(path).format(config::FileFormat::Toml))
}

fn build<S>(file: S) -> Result<AppConfig>
where
    S: config::Source + Send + Sync + 'static,
{
    let parse_error = |e: config::ConfigError| Error::config(e.to_string());

    let config = config::Config::builder()
        .add_source(config::Config::try_from(&AppConfig::default()).map_err(parse_error)?)
        .add_source(file)
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("invalid_user_agents")
                .with_list_parse_key("valid_file_extensions")
                .with_list_parse_key("invalid_channels")
                .try_parsing(true),
        )
        .build()
        .map_err(parse_error)?;

    let config: AppConfig = config.try_deserialize().map_err(parse_error)?;
    config.validate()
}
