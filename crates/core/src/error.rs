//! Unified error types for the impression engine.
//!
//! Every error knows whether it ends the run and which process exit status
//! it maps to. Exit codes are stable so operators can script on them:
//! - 1-3: command line, sink configuration, input reading
//! - 4, 8: metadata service configuration and contract violations
//! - 5: sink runtime failures
//! - 6-7: logging configuration, missing input
//! - 9: unknown
//! - 10-11: configuration file

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Process exit statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExitStatus {
    /// Invalid command line parameters were given
    InvalidCommandLine,
    /// Invalid InfluxDB configuration was given
    InvalidSinkConfig,
    /// Error reading the input log file
    InputReadError,
    /// The metadata client could not be configured for a tenant
    MetadataConfiguration,
    /// InfluxDB raised a run-time error (connection lost, write rejected)
    SinkRuntime,
    /// The logging configuration is invalid
    LogConfiguration,
    /// The input log file wasn't found
    InputNotFound,
    /// The metadata service returned a body that isn't a JSON object
    MalformedMetadata,
    /// Anything not covered above
    Unknown,
    /// The configuration file wasn't found
    ConfigNotFound,
    /// The configuration file couldn't be parsed
    ConfigParse,
}

impl ExitStatus {
    /// Get the numeric process exit code.
    pub fn code(&self) -> u8 {
        match self {
            Self::InvalidCommandLine => 1,
            Self::InvalidSinkConfig => 2,
            Self::InputReadError => 3,
            Self::MetadataConfiguration => 4,
            Self::SinkRuntime => 5,
            Self::LogConfiguration => 6,
            Self::InputNotFound => 7,
            Self::MalformedMetadata => 8,
            Self::Unknown => 9,
            Self::ConfigNotFound => 10,
            Self::ConfigParse => 11,
        }
    }
}

/// Unified error type for the impression engine.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid command line: {0}")]
    CommandLine(String),

    #[error("configuration file \"{0}\" not found")]
    ConfigNotFound(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid duration \"{0}\": expected an ISO-8601 duration such as \"PT5M\"")]
    InvalidDuration(String),

    #[error("logging configuration error: {0}")]
    LogConfiguration(String),

    #[error("log file \"{0}\" not found")]
    InputNotFound(String),

    #[error("error reading log file: {0}")]
    InputRead(#[from] std::io::Error),

    /// The metadata URI needs a tenant but none is available, or the URI is unusable.
    #[error("metadata client configuration error: {0}")]
    MetadataConfiguration(String),

    /// The metadata service answered with something that isn't a JSON object.
    #[error("couldn't parse metadata response: {body}")]
    MalformedMetadata { body: String },

    /// Non-success HTTP status from the metadata service (per event).
    #[error("metadata service returned {status} for tenant \"{tenant}\", subject \"{subject}\"")]
    MetadataStatus {
        status: u16,
        tenant: String,
        subject: String,
    },

    /// Transport failure or timeout talking to the metadata service (per event).
    #[error("metadata request failed: {0}")]
    MetadataTransport(String),

    #[error("invalid InfluxDB configuration: {0}")]
    SinkConfig(String),

    #[error("InfluxDB error: {0}")]
    Sink(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn metadata_configuration(msg: impl Into<String>) -> Self {
        Self::MetadataConfiguration(msg.into())
    }

    pub fn malformed_metadata(body: impl Into<String>) -> Self {
        Self::MalformedMetadata { body: body.into() }
    }

    pub fn sink(msg: impl Into<String>) -> Self {
        Self::Sink(msg.into())
    }

    pub fn sink_config(msg: impl Into<String>) -> Self {
        Self::SinkConfig(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether this error must terminate the run.
    ///
    /// Only per-event metadata failures are recoverable; the enricher
    /// absorbs them and emits a degraded record.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::MetadataStatus { .. } | Self::MetadataTransport(_)
        )
    }

    /// Get the process exit status for this error.
    pub fn exit_status(&self) -> ExitStatus {
        match self {
            Self::CommandLine(_) => ExitStatus::InvalidCommandLine,
            Self::ConfigNotFound(_) => ExitStatus::ConfigNotFound,
            Self::Config(_) | Self::InvalidDuration(_) => ExitStatus::ConfigParse,
            Self::LogConfiguration(_) => ExitStatus::LogConfiguration,
            Self::InputNotFound(_) => ExitStatus::InputNotFound,
            Self::InputRead(_) => ExitStatus::InputReadError,
            Self::MetadataConfiguration(_) => ExitStatus::MetadataConfiguration,
            Self::MalformedMetadata { .. } => ExitStatus::MalformedMetadata,
            Self::SinkConfig(_) => ExitStatus::InvalidSinkConfig,
            Self::Sink(_) => ExitStatus::SinkRuntime,
            Self::MetadataStatus { .. } | Self::MetadataTransport(_) | Self::Internal(_) => {
                ExitStatus::Unknown
            }
        }
    }
}
