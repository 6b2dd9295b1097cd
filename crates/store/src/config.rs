//! Timer configuration files
//!
//! A timer's persisted configuration can be kept in a TOML file. The file is
//! loaded into a [`MemoryConfigStore`](crate::MemoryConfigStore) with
//! `from_config` and written back with `to_config`.

use periodica_core::{Error, Instant, PeriodSpec, Result, Zone};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::field::{ConfigField, ConfigSnapshot, FieldValue};

/// Conventional file name for a timer configuration.
pub const CONFIG_FILE_NAME: &str = "timer.toml";

/// Timer configuration loaded from TOML.
///
/// # Example
///
/// ```toml
/// start_time = "2024-01-01T00:00:00Z"
/// timezone = "UTC"
/// active = true
///
/// [period]
/// factor = 15
/// unit = "MINUTES"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerConfig {
    /// Schedule anchor (RFC 3339)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<Instant>,
    /// Instant after which the timer destroys itself
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<Instant>,
    /// Zone for calendar arithmetic; the system zone when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<Zone>,
    /// Next scheduled firing, maintained by the timer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_execution_time: Option<Instant>,
    /// Whether the resource starts out active
    #[serde(default = "default_active")]
    pub active: bool,
    /// Period; kept last so it serializes as a trailing table
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period: Option<PeriodSpec>,
}

fn default_active() -> bool {
    true
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            start_time: None,
            end_time: None,
            timezone: None,
            next_execution_time: None,
            active: default_active(),
            period: None,
        }
    }
}

impl TimerConfig {
    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# Periodic timer configuration
#
# Anchor of the schedule (RFC 3339). Defaults to the moment the timer is
# created, aligned to the period.
# start_time = "2024-01-01T00:00:00Z"

# The timer destroys itself once this instant has passed.
# end_time = "2025-01-01T00:00:00Z"

# Zone used for calendar arithmetic: "system", "UTC", an offset like "+02:00"
# or an IANA id like "Europe/Berlin".
# timezone = "UTC"

active = true

# Period of the timer. Without it the timer stays idle.
# unit is one of MILLIS, SECONDS, MINUTES, HOURS, HALF_DAYS, DAYS, WEEKS,
# MONTHS, YEARS, DECADES, CENTURIES, MILLENNIA
# [period]
# factor = 15
# unit = "MINUTES"
"#
    }

    /// Parse and validate configuration text.
    ///
    /// # Errors
    ///
    /// `Config` if the text is not valid TOML for this structure or fails
    /// [`TimerConfig::validate`].
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: TimerConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse timer config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content).map_err(|e| match e {
            Error::Config(msg) => Error::Config(format!("{} ({})", msg, path.display())),
            other => other,
        })
    }

    /// Write the default config file if it does not already exist.
    ///
    /// Returns `Ok(())` whether the file was created or already existed.
    pub fn write_default_if_missing(path: &Path) -> Result<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml())?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize timer config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Check values that serde cannot.
    ///
    /// # Errors
    ///
    /// - the period's factor or unit is invalid
    /// - `end_time` is not after `start_time`
    pub fn validate(&self) -> Result<()> {
        if let Some(period) = &self.period {
            period.to_amount()?;
        }
        if let (Some(start), Some(end)) = (self.start_time, self.end_time) {
            if end <= start {
                return Err(Error::Config(format!(
                    "end_time {} must be after start_time {}",
                    end, start
                )));
            }
        }
        Ok(())
    }

    /// Every field with its value, in [`ConfigField::ALL`] order.
    pub fn entries(&self) -> Vec<(ConfigField, Option<FieldValue>)> {
        vec![
            (ConfigField::Period, self.period.map(FieldValue::Period)),
            (ConfigField::StartTime, self.start_time.map(FieldValue::Instant)),
            (ConfigField::EndTime, self.end_time.map(FieldValue::Instant)),
            (ConfigField::Timezone, self.timezone.map(FieldValue::Zone)),
            (
                ConfigField::NextExecutionTime,
                self.next_execution_time.map(FieldValue::Instant),
            ),
        ]
    }

    /// Build a config from a snapshot.
    pub fn from_snapshot(snapshot: &ConfigSnapshot) -> Self {
        Self {
            start_time: snapshot.start_time,
            end_time: snapshot.end_time,
            timezone: snapshot.timezone,
            next_execution_time: snapshot.next_execution_time,
            active: snapshot.active,
            period: snapshot.period,
        }
    }
}
