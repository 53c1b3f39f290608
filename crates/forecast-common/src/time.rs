//! Time handling for forecast file addressing and dynamic coordinates.
//!
//! Forecast files are addressed by compact ISO timestamps (`20201018T0900Z`)
//! and lead-time duration strings (`PT0012H00M`). Dynamic coordinates are
//! generated from pandas-style frequency aliases (`1H`, `1D`, `30min`).

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for time operations.
pub type TimeResult<T> = Result<T, TimeError>;

/// Errors raised while parsing or formatting forecast times.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimeError {
    #[error("Invalid time format: {0}")]
    InvalidFormat(String),

    #[error("Invalid frequency: {0}")]
    InvalidFrequency(String),

    #[error("Lead time {0} has a nonzero seconds remainder")]
    SubMinuteLead(String),

    #[error("Lead time {0} is negative")]
    NegativeLead(String),
}

/// Compact ISO layout used in object names.
const COMPACT_FORMAT: &str = "%Y%m%dT%H%MZ";

/// Accepted layouts once a trailing `Z` has been removed.
const NAIVE_FORMATS: &[&str] = &[
    "%Y%m%dT%H%M",
    "%Y%m%dT%H%M%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
];

/// Format a timestamp as `YYYYMMDDTHHMMZ`.
pub fn format_compact(dt: &DateTime<Utc>) -> String {
    dt.format(COMPACT_FORMAT).to_string()
}

/// Format the date component of a timestamp as `YYYYMMDD`.
pub fn format_date(dt: &DateTime<Utc>) -> String {
    dt.format("%Y%m%d").to_string()
}

/// Format a lead time as `PT{HHHH}H{MM}M`.
///
/// Hours include whole days and are zero-padded to four digits. A lead time
/// that is not a whole number of minutes, or that is negative, is rejected.
pub fn format_lead(lead: &Duration) -> TimeResult<String> {
    if *lead < Duration::zero() {
        return Err(TimeError::NegativeLead(lead.to_string()));
    }
    let total_seconds = lead.num_seconds();
    if total_seconds % 60 != 0 || *lead != Duration::seconds(total_seconds) {
        return Err(TimeError::SubMinuteLead(lead.to_string()));
    }
    let total_minutes = total_seconds / 60;
    let (hours, minutes) = (total_minutes / 60, total_minutes % 60);
    Ok(format!("PT{:04}H{:02}M", hours, minutes))
}

/// Parse a timestamp in any of the layouts used by dataset declarations.
///
/// A trailing `Z` is accepted and ignored; all times are UTC.
pub fn parse_timestamp(s: &str) -> TimeResult<DateTime<Utc>> {
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    let naive = s.strip_suffix('Z').unwrap_or(s);
    for format in NAIVE_FORMATS {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(naive, format) {
            return Ok(Utc.from_utc_datetime(&ndt));
        }
    }

    for format in ["%Y%m%d", "%Y-%m-%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(naive, format) {
            if let Some(ndt) = date.and_hms_opt(0, 0, 0) {
                return Ok(Utc.from_utc_datetime(&ndt));
            }
        }
    }

    Err(TimeError::InvalidFormat(s.to_string()))
}

/// Resolve an end-time declaration, where `latest` means `now - delay`.
///
/// The resolved time is truncated to whole minutes, matching the precision of
/// the compact timestamp layout.
pub fn resolve_latest(value: &str, now: DateTime<Utc>, delay: Duration) -> TimeResult<DateTime<Utc>> {
    if !is_latest(value) {
        return parse_timestamp(value);
    }
    let latest = now - delay;
    latest
        .with_second(0)
        .and_then(|dt| dt.with_nanosecond(0))
        .ok_or_else(|| TimeError::InvalidFormat(latest.to_rfc3339()))
}

/// Whether an end-time declaration is the `latest` keyword.
pub fn is_latest(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("latest")
}

/// Parse a non-negative offset such as `0H`, `126H` or `30min`.
pub fn parse_duration(s: &str) -> TimeResult<Duration> {
    parse_offset(s).map_err(|_| TimeError::InvalidFormat(s.to_string()))
}

fn parse_offset(s: &str) -> TimeResult<Duration> {
    let trimmed = s.trim();
    let split = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len());
    let (count, unit) = trimmed.split_at(split);

    let count: i64 = if count.is_empty() {
        1
    } else {
        count
            .parse()
            .map_err(|_| TimeError::InvalidFrequency(s.to_string()))?
    };

    match unit {
        "H" | "h" => Ok(Duration::hours(count)),
        "D" | "d" => Ok(Duration::days(count)),
        "min" | "T" => Ok(Duration::minutes(count)),
        "S" | "s" => Ok(Duration::seconds(count)),
        _ => Err(TimeError::InvalidFrequency(s.to_string())),
    }
}

/// A positive, fixed step between consecutive coordinate values.
///
/// Keeps the alias it was parsed from, since some object layouts name their
/// directories after it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Frequency {
    alias: String,
    step: Duration,
}

impl Frequency {
    /// `1H`
    pub fn hourly() -> Self {
        Self {
            alias: "1H".to_string(),
            step: Duration::hours(1),
        }
    }

    /// `1D`
    pub fn daily() -> Self {
        Self {
            alias: "1D".to_string(),
            step: Duration::days(1),
        }
    }

    /// Step between consecutive values.
    pub fn step(&self) -> Duration {
        self.step
    }

    /// The alias this frequency was declared with.
    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn is_hourly(&self) -> bool {
        self.step == Duration::hours(1)
    }

    pub fn is_daily(&self) -> bool {
        self.step == Duration::days(1)
    }
}

impl FromStr for Frequency {
    type Err = TimeError;

    fn from_str(s: &str) -> TimeResult<Self> {
        let step = parse_offset(s)?;
        if step <= Duration::zero() {
            return Err(TimeError::InvalidFrequency(s.to_string()));
        }
        Ok(Self {
            alias: s.trim().to_string(),
            step,
        })
    }
}

impl TryFrom<String> for Frequency {
    type Error = TimeError;

    fn try_from(value: String) -> TimeResult<Self> {
        value.parse()
    }
}

impl From<Frequency> for String {
    fn from(freq: Frequency) -> Self {
        freq.alias
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.alias)
    }
}

/// Timestamps from `start` to `end` inclusive, stepping by `freq`.
///
/// The last value is the greatest one not after `end`; an `end` before
/// `start` yields an empty range.
pub fn date_range(start: DateTime<Utc>, end: DateTime<Utc>, freq: &Frequency) -> Vec<DateTime<Utc>> {
    let mut values = Vec::new();
    let mut current = start;
    while current <= end {
        values.push(current);
        current += freq.step();
    }
    values
}

/// Durations from `start` to `end` inclusive, stepping by `freq`.
pub fn duration_range(start: Duration, end: Duration, freq: &Frequency) -> Vec<Duration> {
    let mut values = Vec::new();
    let mut current = start;
    while current <= end {
        values.push(current);
        current += freq.step();
    }
    values
}
