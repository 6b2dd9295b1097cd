//! Timer configuration fields, values and snapshots

use periodica_core::{Error, Instant, PeriodSpec, Result, Zone};
use std::fmt;

/// Addressable field of a timer configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ConfigField {
    /// Period factor and unit; absent means the timer is stopped
    Period,
    /// Anchor of the schedule
    StartTime,
    /// Instant after which the timer destroys itself
    EndTime,
    /// Zone for calendar arithmetic; absent means the system zone
    Timezone,
    /// Timer-owned scratch field: next scheduled firing
    NextExecutionTime,
}

impl ConfigField {
    /// Every field
    pub const ALL: [ConfigField; 5] = [
        ConfigField::Period,
        ConfigField::StartTime,
        ConfigField::EndTime,
        ConfigField::Timezone,
        ConfigField::NextExecutionTime,
    ];

    /// Name used in logs and configuration files
    pub const fn name(self) -> &'static str {
        match self {
            ConfigField::Period => "period",
            ConfigField::StartTime => "start_time",
            ConfigField::EndTime => "end_time",
            ConfigField::Timezone => "timezone",
            ConfigField::NextExecutionTime => "next_execution_time",
        }
    }

    const fn expected_kind(self) -> &'static str {
        match self {
            ConfigField::Period => "period",
            ConfigField::Timezone => "zone",
            _ => "instant",
        }
    }

    /// Check that `value` has the kind this field stores.
    ///
    /// # Errors
    ///
    /// `TypeMismatch` when the kinds differ.
    pub fn check(self, value: &FieldValue) -> Result<()> {
        let ok = matches!(
            (self, value),
            (ConfigField::Period, FieldValue::Period(_))
                | (ConfigField::Timezone, FieldValue::Zone(_))
                | (ConfigField::StartTime, FieldValue::Instant(_))
                | (ConfigField::EndTime, FieldValue::Instant(_))
                | (ConfigField::NextExecutionTime, FieldValue::Instant(_))
        );
        if ok {
            Ok(())
        } else {
            Err(Error::TypeMismatch {
                field: self.name().to_string(),
                expected: self.expected_kind(),
            })
        }
    }
}

impl fmt::Display for ConfigField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Value stored in a configuration field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldValue {
    /// Period spec
    Period(PeriodSpec),
    /// Absolute instant
    Instant(Instant),
    /// Timezone
    Zone(Zone),
}

impl FieldValue {
    /// Period spec, if this is one
    pub fn as_period(&self) -> Option<PeriodSpec> {
        match self {
            FieldValue::Period(p) => Some(*p),
            _ => None,
        }
    }

    /// Instant, if this is one
    pub fn as_instant(&self) -> Option<Instant> {
        match self {
            FieldValue::Instant(i) => Some(*i),
            _ => None,
        }
    }

    /// Zone, if this is one
    pub fn as_zone(&self) -> Option<Zone> {
        match self {
            FieldValue::Zone(z) => Some(*z),
            _ => None,
        }
    }
}

/// Consistent point-in-time view of a timer configuration
///
/// Produced by a single `snapshot_read` call. Fields that were not requested
/// are `None`, exactly like fields that are absent in the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigSnapshot {
    /// Store version the snapshot was taken at
    pub version: u64,
    /// Whether the configuration resource is active
    pub active: bool,
    /// Period spec
    pub period: Option<PeriodSpec>,
    /// Schedule anchor
    pub start_time: Option<Instant>,
    /// End of the schedule
    pub end_time: Option<Instant>,
    /// Zone for calendar arithmetic
    pub timezone: Option<Zone>,
    /// Next scheduled firing
    pub next_execution_time: Option<Instant>,
}

impl ConfigSnapshot {
    /// Place a stored value into the matching slot.
    pub(crate) fn fill(&mut self, field: ConfigField, value: &FieldValue) {
        match field {
            ConfigField::Period => self.period = value.as_period(),
            ConfigField::StartTime => self.start_time = value.as_instant(),
            ConfigField::EndTime => self.end_time = value.as_instant(),
            ConfigField::Timezone => self.timezone = value.as_zone(),
            ConfigField::NextExecutionTime => self.next_execution_time = value.as_instant(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use periodica_core::TemporalUnit;

    #[test]
    fn test_check_accepts_matching_kinds() {
        let period = FieldValue::Period(PeriodSpec::new(5, TemporalUnit::Minutes).unwrap());
        let instant = FieldValue::Instant(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        assert!(ConfigField::Period.check(&period).is_ok());
        assert!(ConfigField::EndTime.check(&instant).is_ok());
        assert!(ConfigField::Timezone.check(&FieldValue::Zone(Zone::Utc)).is_ok());
    }

    #[test]
    fn test_check_rejects_wrong_kind() {
        let instant = FieldValue::Instant(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        let err = ConfigField::Period.check(&instant).unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { expected: "period", .. }));
    }

    #[test]
    fn test_snapshot_fill() {
        let mut snapshot = ConfigSnapshot::default();
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        snapshot.fill(ConfigField::NextExecutionTime, &FieldValue::Instant(at));
        snapshot.fill(ConfigField::Timezone, &FieldValue::Zone(Zone::Utc));
        assert_eq!(snapshot.next_execution_time, Some(at));
        assert_eq!(snapshot.timezone, Some(Zone::Utc));
        assert!(snapshot.period.is_none());
    }
}
