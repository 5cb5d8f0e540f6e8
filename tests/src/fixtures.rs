//! Test fixtures and event generators.

use chrono::{DateTime, NaiveTime, TimeZone, Utc};
use engine_core::{EventIdentity, RawEvent};

/// Tenant used by the fixtures.
pub const TENANT: &str = "mh_default_org";

/// Channel used by the fixtures.
pub const CHANNEL: &str = "engage-player";

/// `HH:MM` on the fixture day, 2024-03-01 UTC.
pub fn at(time: &str) -> DateTime<Utc> {
    let time = NaiveTime::parse_from_str(time, "%H:%M").expect("HH:MM");
    Utc.from_utc_datetime(&chrono::NaiveDate::from_ymd_opt(2024, 3, 1).unwrap().and_time(time))
}

/// A raw event for `subject`, viewed from `ip` at `time`.
pub fn raw_event(subject: &str, ip: &str, time: &str) -> RawEvent {
    RawEvent::new(
        EventIdentity::new(subject, TENANT, ip),
        CHANNEL,
        at(time),
        access_log_line(ip, subject, time, 200),
    )
}

/// A raw event for another tenant.
pub fn raw_event_for(tenant: &str, subject: &str, ip: &str, time: &str) -> RawEvent {
    RawEvent::new(EventIdentity::new(subject, tenant, ip), CHANNEL, at(time), "")
}

/// One access-log line in the default grammar, newline-terminated.
pub fn access_log_line(ip: &str, subject: &str, time: &str, status: u16) -> String {
    format!(
        "{} - - [{}] \"GET /{}/{}/{}/asset-1/video.mp4 HTTP/1.1\" {} 5120 \"-\" \"Mozilla/5.0 (X11; Linux x86_64)\"\n",
        ip,
        at(time).format("%d/%b/%Y:%H:%M:%S %z"),
        TENANT,
        CHANNEL,
        subject,
        status
    )
}

/// Event document as returned by the metadata service.
pub fn metadata_body(series: Option<&str>) -> String {
    match series {
        Some(series) => serde_json::json!({ "title": "Lecture", "is_part_of": series }),
        None => serde_json::json!({ "title": "Lecture" }),
    }
    .to_string()
}
