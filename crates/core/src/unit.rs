//! Temporal units
//!
//! A [`TemporalUnit`] is either *duration-based* (a fixed number of elapsed
//! seconds, independent of any calendar) or *date-based* (its length depends
//! on civil calendar rules and therefore on the timezone). The two classes
//! never mix: periods in date-based units are always applied on civil time.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Unit of a period or of an alignment boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TemporalUnit {
    /// 1/1000 of a second
    Millis,
    /// One second
    Seconds,
    /// 60 seconds
    Minutes,
    /// 60 minutes
    Hours,
    /// 12 hours (AM/PM)
    HalfDays,
    /// One civil day
    Days,
    /// Seven civil days, weeks start on Monday
    Weeks,
    /// One calendar month
    Months,
    /// One calendar year
    Years,
    /// Ten years
    Decades,
    /// One hundred years
    Centuries,
    /// One thousand years
    Millennia,
    /// Calendar era; no period semantics
    Eras,
    /// Unbounded; no period semantics
    Forever,
}

impl TemporalUnit {
    /// All units, finest first
    pub const ALL: [TemporalUnit; 14] = [
        TemporalUnit::Millis,
        TemporalUnit::Seconds,
        TemporalUnit::Minutes,
        TemporalUnit::Hours,
        TemporalUnit::HalfDays,
        TemporalUnit::Days,
        TemporalUnit::Weeks,
        TemporalUnit::Months,
        TemporalUnit::Years,
        TemporalUnit::Decades,
        TemporalUnit::Centuries,
        TemporalUnit::Millennia,
        TemporalUnit::Eras,
        TemporalUnit::Forever,
    ];

    /// True for units measured in absolute elapsed time.
    pub const fn is_duration_based(self) -> bool {
        matches!(
            self,
            TemporalUnit::Millis
                | TemporalUnit::Seconds
                | TemporalUnit::Minutes
                | TemporalUnit::Hours
                | TemporalUnit::HalfDays
        )
    }

    /// True for units whose length depends on the civil calendar.
    pub const fn is_date_based(self) -> bool {
        matches!(
            self,
            TemporalUnit::Days
                | TemporalUnit::Weeks
                | TemporalUnit::Months
                | TemporalUnit::Years
                | TemporalUnit::Decades
                | TemporalUnit::Centuries
                | TemporalUnit::Millennia
        )
    }

    /// True for units that can describe a period at all.
    pub const fn is_supported(self) -> bool {
        self.is_duration_based() || self.is_date_based()
    }

    /// Exact length in milliseconds for duration-based units.
    pub const fn millis(self) -> Option<i64> {
        match self {
            TemporalUnit::Millis => Some(1),
            TemporalUnit::Seconds => Some(1_000),
            TemporalUnit::Minutes => Some(60_000),
            TemporalUnit::Hours => Some(3_600_000),
            TemporalUnit::HalfDays => Some(43_200_000),
            _ => None,
        }
    }

    /// Canonical upper-case name, as used in configuration files.
    pub const fn as_str(self) -> &'static str {
        match self {
            TemporalUnit::Millis => "MILLIS",
            TemporalUnit::Seconds => "SECONDS",
            TemporalUnit::Minutes => "MINUTES",
            TemporalUnit::Hours => "HOURS",
            TemporalUnit::HalfDays => "HALF_DAYS",
            TemporalUnit::Days => "DAYS",
            TemporalUnit::Weeks => "WEEKS",
            TemporalUnit::Months => "MONTHS",
            TemporalUnit::Years => "YEARS",
            TemporalUnit::Decades => "DECADES",
            TemporalUnit::Centuries => "CENTURIES",
            TemporalUnit::Millennia => "MILLENNIA",
            TemporalUnit::Eras => "ERAS",
            TemporalUnit::Forever => "FOREVER",
        }
    }
}

impl fmt::Display for TemporalUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TemporalUnit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        TemporalUnit::ALL
            .iter()
            .copied()
            .find(|unit| unit.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| Error::Config(format!("unknown temporal unit '{}'", s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_is_disjoint() {
        for unit in TemporalUnit::ALL {
            assert!(!(unit.is_duration_based() && unit.is_date_based()), "{unit}");
        }
        assert!(TemporalUnit::Hours.is_duration_based());
        assert!(TemporalUnit::Days.is_date_based());
        assert!(TemporalUnit::Weeks.is_date_based());
        assert!(!TemporalUnit::Eras.is_supported());
        assert!(!TemporalUnit::Forever.is_supported());
    }

    #[test]
    fn test_parse_case_insensitive() {
        assert_eq!("minutes".parse::<TemporalUnit>().unwrap(), TemporalUnit::Minutes);
        assert_eq!("HALF_DAYS".parse::<TemporalUnit>().unwrap(), TemporalUnit::HalfDays);
        assert_eq!(" Months ".parse::<TemporalUnit>().unwrap(), TemporalUnit::Months);
        assert!("fortnights".parse::<TemporalUnit>().is_err());
    }

    #[test]
    fn test_display_matches_parse() {
        for unit in TemporalUnit::ALL {
            assert_eq!(unit.to_string().parse::<TemporalUnit>().unwrap(), unit);
        }
    }

    #[test]
    fn test_serde_uses_config_names() {
        let json = serde_json::to_string(&TemporalUnit::HalfDays).unwrap();
        assert_eq!(json, "\"HALF_DAYS\"");
        let unit: TemporalUnit = serde_json::from_str("\"CENTURIES\"").unwrap();
        assert_eq!(unit, TemporalUnit::Centuries);
    }
}
