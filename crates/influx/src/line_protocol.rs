//! Line protocol encoding of impression records.
//!
//! One point per record:
//! `impressions,channel=<c>,series=<s>,subject=<e>,tenant=<t> count=1i <ms>`

use engine_core::EnrichedRecord;
use std::fmt::Write;

/// Measurement every record is written to.
pub const MEASUREMENT: &str = "impressions";

/// Append one record as a line, without the trailing newline.
pub fn write_point(out: &mut String, record: &EnrichedRecord) {
    out.push_str(MEASUREMENT);

    // Keys in lexical order, as InfluxDB stores them
    let tags = [
        ("channel", record.channel.as_str()),
        ("series", record.series_id.as_str()),
        ("subject", record.subject_id.as_str()),
        ("tenant", record.tenant_id.as_str()),
    ];
    for (key, value) in tags {
        if value.is_empty() {
            continue;
        }
        out.push(',');
        out.push_str(key);
        out.push('=');
        escape_tag(out, value);
    }

    let _ = write!(out, " count=1i {}", record.timestamp.timestamp_millis());
}

/// Encode a batch, one line per record.
pub fn encode(records: &[EnrichedRecord]) -> String {
    let mut out = String::with_capacity(records.len() * 96);
    for record in records {
        write_point(&mut out, record);
        out.push('\n');
    }
    out
}

fn escape_tag(out: &mut String, value: &str) {
    for c in value.chars() {
        match c {
            ',' | '=' | ' ' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            '\n' => out.push_str("\\n"),
            '\r' => {}
            _ => out.push(c),
        }
    }
}
