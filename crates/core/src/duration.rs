//! ISO-8601 durations for configuration values.

use chrono::Duration;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use crate::error::Error;

static ISO_DURATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(?P<sign>[-+]?)P(?:(?P<weeks>[-+]?\d+)W)?(?:(?P<days>[-+]?\d+)D)?(?:T(?:(?P<hours>[-+]?\d+)H)?(?:(?P<minutes>[-+]?\d+)M)?(?:(?P<seconds>[-+]?\d+)(?:[.,](?P<fraction>\d{1,9}))?S)?)?$",
    )
    .expect("valid duration regex")
});

/// A duration parsed from ISO-8601 notation like `PT2H` or `P1DT30M`.
///
/// Years and months are rejected since they have no fixed length.
/// Negative values are allowed; callers decide whether they make sense.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct IsoDuration(Duration);

impl IsoDuration {
    pub fn new(duration: Duration) -> Self {
        Self(duration)
    }

    pub fn as_duration(&self) -> Duration {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.0 < Duration::zero()
    }

    /// Convert to a std duration, `None` if negative.
    pub fn to_std(&self) -> Option<std::time::Duration> {
        self.0.to_std().ok()
    }
}

impl Default for IsoDuration {
    fn default() -> Self {
        Self(Duration::zero())
    }
}

impl From<Duration> for IsoDuration {
    fn from(d: Duration) -> Self {
        Self(d)
    }
}

impl FromStr for IsoDuration {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || Error::InvalidDuration(s.to_string());

        let caps = ISO_DURATION.captures(s).ok_or_else(invalid)?;
        // "P" and "PT" alone carry no value
        let has_value = ["weeks", "days", "hours", "minutes", "seconds"]
            .iter()
            .any(|n| caps.name(n).is_some());
        if !has_value {
            return Err(invalid());
        }

        let part = |name: &str| -> Result<i64, Error> {
            caps.name(name)
                .map(|m| m.as_str().parse::<i64>().map_err(|_| invalid()))
                .unwrap_or(Ok(0))
        };

        let nanos = match caps.name("fraction") {
            Some(m) => {
                let digits = m.as_str();
                let scale = 10_i64.pow(9 - digits.len() as u32);
                let n = digits.parse::<i64>().map_err(|_| invalid())? * scale;
                if caps["seconds"].starts_with('-') {
                    -n
                } else {
                    n
                }
            }
            None => 0,
        };

        let total = Duration::try_weeks(part("weeks")?)
            .zip(Duration::try_days(part("days")?))
            .zip(Duration::try_hours(part("hours")?))
            .zip(Duration::try_minutes(part("minutes")?))
            .zip(Duration::try_seconds(part("seconds")?))
            .and_then(|((((w, d), h), m), sec)| {
                w.checked_add(&d)?
                    .checked_add(&h)?
                    .checked_add(&m)?
                    .checked_add(&sec)?
                    .checked_add(&Duration::nanoseconds(nanos))
            })
            .ok_or_else(invalid)?;

        let total = if &caps["sign"] == "-" { -total } else { total };
        Ok(Self(total))
    }
}

impl fmt::Display for IsoDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let d = self.0;
        if d < Duration::zero() {
            write!(f, "-")?;
        }
        let d = d.abs();
        let secs = d.num_seconds();
        let nanos = d.subsec_nanos();

        let hours = secs / 3600;
        let minutes = (secs % 3600) / 60;
        let seconds = secs % 60;

        write!(f, "PT")?;
        if hours > 0 {
            write!(f, "{}H", hours)?;
        }
        if minutes > 0 {
            write!(f, "{}M", minutes)?;
        }
        if nanos > 0 {
            write!(f, "{}.{:09}S", seconds, nanos)
        } else if seconds > 0 || (hours == 0 && minutes == 0) {
            write!(f, "{}S", seconds)
        } else {
            Ok(())
        }
    }
}

impl Serialize for IsoDuration {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for IsoDuration {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
