//! Timezones for civil-time arithmetic
//!
//! Date-based units are applied on civil (wall-clock) time in a [`Zone`].
//! Converting civil time back to an absolute instant follows two rules:
//! - ambiguous wall-clock times (DST fall-back overlap) resolve to the
//!   earlier instant
//! - non-existent wall-clock times (DST spring-forward gap) are shifted
//!   forward by the length of the gap

use chrono::{
    DateTime, FixedOffset, Local, LocalResult, NaiveDateTime, Offset, TimeDelta, TimeZone, Utc,
};
use chrono_tz::Tz;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Timezone used to interpret date-based periods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Zone {
    /// The host's local zone
    #[default]
    System,
    /// Coordinated Universal Time
    Utc,
    /// A fixed offset from UTC
    Fixed(FixedOffset),
    /// An IANA zone such as `Europe/Berlin`, with its DST rules
    Named(Tz),
}

impl Zone {
    /// Fixed offset zone from seconds east of UTC.
    pub fn fixed(seconds_east: i32) -> Result<Self> {
        FixedOffset::east_opt(seconds_east)
            .map(Zone::Fixed)
            .ok_or_else(|| Error::InvalidZone(format!("offset {}s out of range", seconds_east)))
    }

    /// Wall-clock time of `instant` in this zone.
    pub fn to_civil(&self, instant: DateTime<Utc>) -> NaiveDateTime {
        match self {
            Zone::System => instant.with_timezone(&Local).naive_local(),
            Zone::Utc => instant.naive_utc(),
            Zone::Fixed(offset) => instant.with_timezone(offset).naive_local(),
            Zone::Named(tz) => instant.with_timezone(tz).naive_local(),
        }
    }

    /// Absolute instant of a wall-clock time in this zone.
    pub fn from_civil(&self, civil: NaiveDateTime) -> Result<DateTime<Utc>> {
        match self {
            Zone::System => resolve(&Local, civil),
            Zone::Utc => Ok(Utc.from_utc_datetime(&civil)),
            Zone::Fixed(offset) => resolve(offset, civil),
            Zone::Named(tz) => resolve(tz, civil),
        }
    }
}

fn resolve<Tz: TimeZone>(tz: &Tz, civil: NaiveDateTime) -> Result<DateTime<Utc>> {
    match tz.from_local_datetime(&civil) {
        LocalResult::Single(dt) => Ok(dt.with_timezone(&Utc)),
        LocalResult::Ambiguous(earliest, _) => Ok(earliest.with_timezone(&Utc)),
        LocalResult::None => {
            // Gap: apply the offset in force before the transition.
            let probe = civil
                .checked_sub_signed(TimeDelta::days(1))
                .ok_or_else(|| Error::Overflow(format!("civil time {} out of range", civil)))?;
            let before = tz
                .from_local_datetime(&probe)
                .earliest()
                .ok_or_else(|| Error::Overflow(format!("no offset for civil time {}", civil)))?;
            let offset_secs = i64::from(before.offset().fix().local_minus_utc());
            let utc = civil
                .checked_sub_signed(TimeDelta::seconds(offset_secs))
                .ok_or_else(|| Error::Overflow(format!("civil time {} out of range", civil)))?;
            Ok(Utc.from_utc_datetime(&utc))
        }
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Zone::System => f.write_str("SYSTEM"),
            Zone::Utc => f.write_str("UTC"),
            Zone::Fixed(offset) => write!(f, "{}", offset),
            Zone::Named(tz) => f.write_str(tz.name()),
        }
    }
}

impl FromStr for Zone {
    type Err = Error;

    /// Accepts `system`/`local`, `UTC`/`Z`/`GMT`, `±HH:MM`, `±HHMM` or `±HH`
    /// offsets, and IANA zone ids.
    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        match trimmed.to_ascii_uppercase().as_str() {
            "SYSTEM" | "LOCAL" => return Ok(Zone::System),
            "UTC" | "Z" | "GMT" => return Ok(Zone::Utc),
            _ => {}
        }
        parse_offset(trimmed)
            .or_else(|| trimmed.parse::<Tz>().ok().map(Zone::Named))
            .ok_or_else(|| Error::InvalidZone(s.to_string()))
    }
}

fn parse_offset(s: &str) -> Option<Zone> {
    let (sign, rest) = match s.as_bytes().first()? {
        b'+' => (1, &s[1..]),
        b'-' => (-1, &s[1..]),
        _ => return None,
    };
    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let (hours, minutes) = match digits.len() {
        2 => (digits.parse::<i32>().ok()?, 0),
        4 => (digits[..2].parse::<i32>().ok()?, digits[2..].parse::<i32>().ok()?),
        _ => return None,
    };
    if minutes >= 60 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).map(Zone::Fixed)
}

impl Serialize for Zone {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Zone {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
