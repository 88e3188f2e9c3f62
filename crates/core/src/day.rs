use chrono::{
    DateTime, Duration, FixedOffset, Local, NaiveDate, NaiveDateTime, TimeZone, Utc,
};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

const DAY_FORMAT: &str = "%Y-%m-%d";

/// Minute-precision layouts with an offset or `Z`, which RFC 3339 parsing rejects.
const OFFSET_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M%#z", "%Y-%m-%d %H:%M%#z"];

/// Naive timestamp layouts accepted for `createdAt`, interpreted in the bucketing zone.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DayError {
    #[error("invalid day key {0:?}, expected YYYY-MM-DD")]
    InvalidDayKey(String),
    #[error("invalid day zone {0:?}, expected \"local\", \"utc\" or an offset like \"+02:00\"")]
    InvalidZone(String),
}

/// A calendar day bucket, rendered as `YYYY-MM-DD`.
///
/// Ordering is chronological, which matches the textual order of the
/// rendered form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DayKey(NaiveDate);

impl DayKey {
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(Self)
    }

    pub fn succ(self) -> Option<Self> {
        self.0.succ_opt().map(Self)
    }

    /// Every day from `self` to `end`, both inclusive. Empty when `end < self`.
    pub fn through(self, end: DayKey) -> impl Iterator<Item = DayKey> {
        self.0
            .iter_days()
            .take_while(move |d| *d <= end.0)
            .map(Self)
    }
}

impl fmt::Display for DayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(DAY_FORMAT))
    }
}

impl FromStr for DayKey {
    type Err = DayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveDate::parse_from_str(s.trim(), DAY_FORMAT)
            .map(Self)
            .map_err(|_| DayError::InvalidDayKey(s.to_string()))
    }
}

impl Serialize for DayKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DayKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Which wall clock decides the calendar day of a timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DayZone {
    /// The process-local timezone, including its DST rules.
    #[default]
    Local,
    Utc,
    Fixed(FixedOffset),
}

impl DayZone {
    pub fn day_key(&self, instant: DateTime<Utc>) -> DayKey {
        let date = match self {
            Self::Local => instant.with_timezone(&Local).date_naive(),
            Self::Utc => instant.date_naive(),
            Self::Fixed(offset) => instant.with_timezone(offset).date_naive(),
        };
        DayKey(date)
    }

    /// Resolve a wall-clock reading in this zone to an instant.
    ///
    /// Ambiguous readings (DST fall-back) take the earlier instant; readings
    /// inside a DST gap are shifted forward by an hour.
    pub fn resolve(&self, naive: NaiveDateTime) -> Option<DateTime<Utc>> {
        match self {
            Self::Local => resolve_in(&Local, naive),
            Self::Utc => Some(naive.and_utc()),
            Self::Fixed(offset) => resolve_in(offset, naive),
        }
    }

    /// Parse a `createdAt` value.
    ///
    /// Accepts RFC 3339 timestamps, naive date-times (read in this zone) and
    /// bare `YYYY-MM-DD` dates (read as UTC midnight). Returns `None` for
    /// anything else.
    pub fn parse_timestamp(&self, raw: &str) -> Option<DateTime<Utc>> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        if let Some(dt) = std::iter::once(DateTime::parse_from_rfc3339(raw))
            .chain(
                OFFSET_FORMATS
                    .iter()
                    .map(|fmt| DateTime::parse_from_str(raw, fmt)),
            )
            .find_map(Result::ok)
        {
            return Some(dt.with_timezone(&Utc));
        }
        if let Some(naive) = NAIVE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        {
            return self.resolve(naive);
        }
        NaiveDate::parse_from_str(raw, DAY_FORMAT)
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|naive| naive.and_utc())
    }
}

impl fmt::Display for DayZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => f.write_str("local"),
            Self::Utc => f.write_str("utc"),
            Self::Fixed(offset) => write!(f, "{offset}"),
        }
    }
}

impl FromStr for DayZone {
    type Err = DayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "" | "local" => return Ok(Self::Local),
            "utc" | "z" => return Ok(Self::Utc),
            _ => {}
        }
        parse_offset(trimmed)
            .map(Self::Fixed)
            .ok_or_else(|| DayError::InvalidZone(s.to_string()))
    }
}

impl Serialize for DayZone {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DayZone {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Wall-clock reading in `tz`: earliest instant when ambiguous, one hour
/// later when it falls in a gap.
fn resolve_in<Tz: TimeZone>(tz: &Tz, naive: NaiveDateTime) -> Option<DateTime<Utc>> {
    tz.from_local_datetime(&naive)
        .earliest()
        .or_else(|| tz.from_local_datetime(&(naive + Duration::hours(1))).earliest())
        .map(|dt| dt.with_timezone(&Utc))
}

/// `+HH:MM`, `-HH:MM` or `+HH`.
fn parse_offset(raw: &str) -> Option<FixedOffset> {
    let (sign, rest) = match raw.as_bytes().first()? {
        b'+' => (1, &raw[1..]),
        b'-' => (-1, &raw[1..]),
        _ => return None,
    };
    let (hours, minutes) = match rest.split_once(':') {
        Some((h, m)) => (h.parse::<i32>().ok()?, m.parse::<i32>().ok()?),
        None => (rest.parse::<i32>().ok()?, 0),
    };
    if !(0..24).contains(&hours) || !(0..60).contains(&minutes) {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}
