//! Tracing setup for structured logging.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Tracing configuration, also the `[logging]` section of the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TracingConfig {
    /// Log level filter (e.g., "info", "debug", "pipeline=debug")
    #[serde(default = "default_filter")]
    pub filter: String,
    /// Whether to output JSON format
    #[serde(default)]
    pub json: bool,
    /// Whether to include span events
    #[serde(default)]
    pub span_events: bool,
}

fn default_filter() -> String {
    "info".to_string()
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
            json: false,
            span_events: false,
        }
    }
}

impl TracingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into();
        self
    }

    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    pub fn with_span_events(mut self, span_events: bool) -> Self {
        self.span_events = span_events;
        self
    }

    /// Apply `RUST_LOG` and `LOG_JSON` on top of this configuration.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(filter) = std::env::var("RUST_LOG") {
            self.filter = filter;
        }
        if let Ok(v) = std::env::var("LOG_JSON") {
            self.json = v == "1" || v.eq_ignore_ascii_case("true");
        }
        self
    }
}

/// Error raised for an unusable logging configuration.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct TracingError(pub String);

/// Build the filter, rejecting directives that don't parse.
pub fn build_filter(filter: &str) -> Result<EnvFilter, TracingError> {
    EnvFilter::builder()
        .parse(filter)
        .map_err(|e| TracingError(format!("invalid log filter \"{}\": {}", filter, e)))
}

/// Initialize tracing with the given configuration.
pub fn init_tracing(config: &TracingConfig) -> Result<(), TracingError> {
    let env_filter = build_filter(&config.filter)?;

    let span_events = if config.span_events {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let result = if config.json {
        let fmt_layer = fmt::layer()
            .json()
            .with_span_events(span_events)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
    } else {
        let fmt_layer = fmt::layer()
            .with_span_events(span_events)
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
    };
    result.map_err(|e| TracingError(format!("couldn't install subscriber: {}", e)))?;

    tracing::info!("Tracing initialized with filter: {}", config.filter);
    Ok(())
}
