//! Access-log line parsing and filtering.
//!
//! Turns raw web-server log lines into [`RawEvent`]s. Lines that don't
//! match the configured grammar, or that fail one of the filters, are
//! dropped with a `SKIP` debug log and never reach the window cache.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::events::{EventIdentity, RawEvent};

/// Default grammar: combined log format with an IPv4 client address.
pub const DEFAULT_LINE_PATTERN: &str = r#"^(?P<ip>(?:[0-9]{1,3}\.){3}[0-9]{1,3}) - (?:-|[^ ]+) \[(?P<date>[^\]]+)\] "(?P<request>[^"]*)" (?P<httpret>[0-9]+) (?P<size>(?:[0-9]+|-)) "(?P<referrer>[^"]*)" "(?P<agent>[^"]+)""#;

/// Default request grammar: `/tenant/channel/subject/asset...`.
pub const DEFAULT_REQUEST_PATTERN: &str =
    r"^(?P<method>[^ ]+) /(?P<tenant>[^/]+)/(?P<channel>[^/]+)/(?P<subject>[^/]+)/(?P<asset>[^/ ]+).*$";

/// Default timestamp format, e.g. `10/Feb/2019:03:38:22 +0100`.
pub const DEFAULT_DATE_FORMAT: &str = "%d/%b/%Y:%H:%M:%S %z";

/// Configurable access-log grammar.
///
/// `line_pattern` must define the named groups `ip`, `date`, `request`,
/// `httpret` and `agent`; `request_pattern` must define `method`, `tenant`,
/// `channel`, `subject` and `asset`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessLogFormat {
    #[serde(default = "default_line_pattern")]
    pub line_pattern: String,
    #[serde(default = "default_request_pattern")]
    pub request_pattern: String,
    /// chrono `strftime`-style format of the `date` group
    #[serde(default = "default_date_format")]
    pub date_format: String,
}

fn default_line_pattern() -> String {
    DEFAULT_LINE_PATTERN.to_string()
}

fn default_request_pattern() -> String {
    DEFAULT_REQUEST_PATTERN.to_string()
}

fn default_date_format() -> String {
    DEFAULT_DATE_FORMAT.to_string()
}

impl Default for AccessLogFormat {
    fn default() -> Self {
        Self {
            line_pattern: default_line_pattern(),
            request_pattern: default_request_pattern(),
            date_format: default_date_format(),
        }
    }
}

const LINE_GROUPS: [&str; 5] = ["ip", "date", "request", "httpret", "agent"];
const REQUEST_GROUPS: [&str; 5] = ["method", "tenant", "channel", "subject", "asset"];

/// Post-parse filters deciding which requests count as views.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventFilter {
    /// User-agent substrings that disqualify a request
    #[serde(default)]
    pub invalid_user_agents: Vec<String>,
    /// If non-empty, the request must contain one of these
    #[serde(default)]
    pub valid_file_extensions: Vec<String>,
    /// Publication channels to ignore
    #[serde(default)]
    pub invalid_channels: Vec<String>,
}

/// Compiled access-log grammar.
#[derive(Debug, Clone)]
pub struct AccessLogParser {
    line: Regex,
    request: Regex,
    date_format: String,
}

impl AccessLogParser {
    /// Compile the grammar, checking that all required groups exist.
    pub fn new(format: &AccessLogFormat) -> Result<Self> {
        let line = compile("access_log.line_pattern", &format.line_pattern, &LINE_GROUPS)?;
        let request = compile(
            "access_log.request_pattern",
            &format.request_pattern,
            &REQUEST_GROUPS,
        )?;
        Ok(Self {
            line,
            request,
            date_format: format.date_format.clone(),
        })
    }

    /// Parse a log line, `None` if it doesn't match the grammar.
    pub fn parse_line(&self, line: &str) -> Option<LogLine> {
        if line.is_empty() {
            return None;
        }

        let Some(caps) = self.line.captures(line) else {
            debug!(line = %line, "SKIP, wrong line pattern");
            return None;
        };

        let date = match DateTime::parse_from_str(&caps["date"], &self.date_format) {
            Ok(d) => d.with_timezone(&Utc),
            Err(e) => {
                debug!(line = %line, error = %e, "SKIP, invalid date");
                return None;
            }
        };

        let Ok(status) = caps["httpret"].parse::<u16>() else {
            debug!(line = %line, "SKIP, invalid status code");
            return None;
        };

        let request = caps["request"].to_string();
        let request_line = self.parse_request(&request);

        Some(LogLine {
            origin: line.to_string(),
            ip: caps["ip"].to_string(),
            date,
            request,
            status,
            agent: caps["agent"].to_string(),
            request_line,
        })
    }

    /// Parse the request portion, e.g. `GET /org/channel/episode/asset/file.mp4 HTTP/1.1`.
    pub fn parse_request(&self, request: &str) -> Option<RequestLine> {
        let caps = self.request.captures(request)?;
        Some(RequestLine {
            method: caps["method"].to_string(),
            tenant_id: caps["tenant"].to_string(),
            channel: caps["channel"].to_string(),
            subject_id: caps["subject"].to_string(),
            asset_id: caps["asset"].to_string(),
        })
    }

    /// Parse and filter in one step.
    pub fn parse_event(&self, line: &str, filter: &EventFilter) -> Option<RawEvent> {
        self.parse_line(line)?.into_raw_event(filter)
    }
}

fn compile(key: &str, pattern: &str, groups: &[&str]) -> Result<Regex> {
    let re = Regex::new(pattern)
        .map_err(|e| Error::config(format!("{} is not a valid regex: {}", key, e)))?;
    let names: Vec<&str> = re.capture_names().flatten().collect();
    if let Some(missing) = groups.iter().find(|g| !names.contains(g)) {
        return Err(Error::config(format!(
            "{} lacks the named group \"{}\"",
            key, missing
        )));
    }
    Ok(re)
}

/// The request line portion of a log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLine {
    pub method: String,
    pub tenant_id: String,
    pub channel: String,
    pub subject_id: String,
    pub asset_id: String,
}

/// A single parsed log line.
#[derive(Debug, Clone)]
pub struct LogLine {
    pub origin: String,
    pub ip: String,
    pub date: DateTime<Utc>,
    pub request: String,
    pub status: u16,
    pub agent: String,
    pub request_line: Option<RequestLine>,
}

impl LogLine {
    /// Apply the filters and extract the event, `None` if it's dropped.
    pub fn into_raw_event(self, filter: &EventFilter) -> Option<RawEvent> {
        if !(200..300).contains(&self.status) {
            debug!(status = self.status, line = %self.origin, "SKIP, HTTP status not 2xx");
            return None;
        }

        if !filter.valid_file_extensions.is_empty()
            && !filter
                .valid_file_extensions
                .iter()
                .any(|ext| self.request.contains(ext.as_str()))
        {
            debug!(line = %self.origin, "SKIP, invalid extension");
            return None;
        }

        let Some(rl) = self.request_line else {
            debug!(line = %self.origin, "SKIP, unparsable request");
            return None;
        };

        if filter.invalid_channels.iter().any(|c| *c == rl.channel) {
            debug!(channel = %rl.channel, line = %self.origin, "SKIP, invalid publication channel");
            return None;
        }

        if rl.method != "GET" {
            debug!(method = %rl.method, line = %self.origin, "SKIP, method not GET");
            return None;
        }

        if filter
            .invalid_user_agents
            .iter()
            .any(|a| self.agent.contains(a.as_str()))
            || self.agent.starts_with("Apache")
        {
            debug!(agent = %self.agent, line = %self.origin, "SKIP, invalid agent");
            return None;
        }

        Some(RawEvent::new(
            EventIdentity::new(rl.subject_id, rl.tenant_id, self.ip),
            rl.channel,
            self.date,
            self.origin,
        ))
    }
}
