//! Period descriptors and period arithmetic
//!
//! A [`PeriodSpec`] (factor + unit) resolves to a [`TemporalAmount`]:
//! - duration-based units become an absolute [`TimeDelta`]
//! - date-based units become a [`CalendarPeriod`] in the same unit
//!
//! The two are kept apart on purpose: "every month" is applied on civil time
//! (respecting month lengths and DST), never as a fixed number of seconds.

use chrono::{DateTime, Days, Months, NaiveDateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};
use crate::unit::TemporalUnit;
use crate::zone::Zone;

/// Absolute point in time
pub type Instant = DateTime<Utc>;

/// Factor and unit of a period, as stored in configuration.
///
/// Deserialization does not validate; use [`PeriodSpec::to_amount`] before use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeriodSpec {
    /// Number of units per period
    pub factor: u64,
    /// Unit of the period
    pub unit: TemporalUnit,
}

impl PeriodSpec {
    /// Create a validated period spec.
    ///
    /// # Errors
    ///
    /// `InvalidFactor` if `factor == 0`, `UnsupportedUnit` for units without period semantics.
    pub fn new(factor: u64, unit: TemporalUnit) -> Result<Self> {
        let spec = PeriodSpec { factor, unit };
        spec.to_amount()?;
        Ok(spec)
    }

    /// Resolve into a temporal amount.
    pub fn to_amount(&self) -> Result<TemporalAmount> {
        to_temporal_amount(self.factor, self.unit)
    }
}

impl fmt::Display for PeriodSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.factor, self.unit)
    }
}

/// A calendar period: `factor` date-based units, applied on civil time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CalendarPeriod {
    factor: u64,
    unit: TemporalUnit,
}

impl CalendarPeriod {
    /// Number of units
    pub fn factor(&self) -> u64 {
        self.factor
    }

    /// Date-based unit of this period
    pub fn unit(&self) -> TemporalUnit {
        self.unit
    }

    pub(crate) fn shift_civil(&self, civil: NaiveDateTime, forward: bool) -> Option<NaiveDateTime> {
        match self.unit {
            TemporalUnit::Days => shift_days(civil, self.factor, forward),
            TemporalUnit::Weeks => shift_days(civil, self.factor.checked_mul(7)?, forward),
            unit => {
                let per_unit: u64 = match unit {
                    TemporalUnit::Months => 1,
                    TemporalUnit::Years => 12,
                    TemporalUnit::Decades => 120,
                    TemporalUnit::Centuries => 1_200,
                    TemporalUnit::Millennia => 12_000,
                    _ => return None,
                };
                let months = u32::try_from(self.factor.checked_mul(per_unit)?).ok()?;
                if forward {
                    civil.checked_add_months(Months::new(months))
                } else {
                    civil.checked_sub_months(Months::new(months))
                }
            }
        }
    }
}

fn shift_days(civil: NaiveDateTime, days: u64, forward: bool) -> Option<NaiveDateTime> {
    if forward {
        civil.checked_add_days(Days::new(days))
    } else {
        civil.checked_sub_days(Days::new(days))
    }
}

/// Resolved length of a period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemporalAmount {
    /// Fixed elapsed time
    Duration(TimeDelta),
    /// Calendar period in a date-based unit
    Calendar(CalendarPeriod),
}

impl TemporalAmount {
    /// Approximate length, for display and logging only.
    pub fn nominal_duration(&self) -> Option<TimeDelta> {
        match self {
            TemporalAmount::Duration(d) => Some(*d),
            TemporalAmount::Calendar(period) => {
                // Mean Gregorian lengths.
                let unit_secs: i64 = match period.unit {
                    TemporalUnit::Days => 86_400,
                    TemporalUnit::Weeks => 604_800,
                    TemporalUnit::Months => 2_629_746,
                    TemporalUnit::Years => 31_556_952,
                    TemporalUnit::Decades => 315_569_520,
                    TemporalUnit::Centuries => 3_155_695_200,
                    TemporalUnit::Millennia => 31_556_952_000,
                    _ => return None,
                };
                let factor = i64::try_from(period.factor).ok()?;
                TimeDelta::try_seconds(unit_secs.checked_mul(factor)?)
            }
        }
    }

    /// True for calendar periods.
    pub fn is_calendar(&self) -> bool {
        matches!(self, TemporalAmount::Calendar(_))
    }
}

impl fmt::Display for TemporalAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemporalAmount::Duration(d) => write!(f, "{}ms", d.num_milliseconds()),
            TemporalAmount::Calendar(p) => write!(f, "{} {}", p.factor, p.unit),
        }
    }
}

/// Resolve `factor` × `unit` into a temporal amount.
///
/// # Errors
///
/// - `InvalidFactor` when `factor == 0`
/// - `UnsupportedUnit` for `ERAS` / `FOREVER`
/// - `Overflow` when the duration does not fit
pub fn to_temporal_amount(factor: u64, unit: TemporalUnit) -> Result<TemporalAmount> {
    if factor == 0 {
        return Err(Error::InvalidFactor(factor));
    }
    if let Some(unit_ms) = unit.millis() {
        let total = i64::try_from(factor)
            .ok()
            .and_then(|f| f.checked_mul(unit_ms))
            .and_then(TimeDelta::try_milliseconds)
            .ok_or_else(|| Error::Overflow(format!("{} {} as duration", factor, unit)))?;
        return Ok(TemporalAmount::Duration(total));
    }
    if unit.is_date_based() {
        return Ok(TemporalAmount::Calendar(CalendarPeriod { factor, unit }));
    }
    Err(Error::UnsupportedUnit(unit))
}

/// Add one period to `instant`.
///
/// Calendar periods are applied on civil time in `zone` (system zone if `None`).
pub fn add_period(
    instant: Instant,
    amount: &TemporalAmount,
    zone: Option<&Zone>,
) -> Result<Instant> {
    apply(instant, amount, zone, true)
}

/// Subtract one period from `instant`.
pub fn subtract_period(
    instant: Instant,
    amount: &TemporalAmount,
    zone: Option<&Zone>,
) -> Result<Instant> {
    apply(instant, amount, zone, false)
}

fn apply(
    instant: Instant,
    amount: &TemporalAmount,
    zone: Option<&Zone>,
    forward: bool,
) -> Result<Instant> {
    let sign = if forward { "+" } else { "-" };
    let overflow = || Error::Overflow(format!("{} {} {}", instant, sign, amount));
    match amount {
        TemporalAmount::Duration(d) => {
            let shifted = if forward {
                instant.checked_add_signed(*d)
            } else {
                instant.checked_sub_signed(*d)
            };
            shifted.ok_or_else(overflow)
        }
        TemporalAmount::Calendar(period) => {
            let zone = zone.copied().unwrap_or_default();
            let civil = zone.to_civil(instant);
            let shifted = period.shift_civil(civil, forward).ok_or_else(overflow)?;
            zone.from_civil(shifted)
        }
    }
}

/// Advance `base` by whole periods until it is strictly after `now`.
///
/// Returns `base` unchanged when it is already after `now`. Duration periods
/// jump over all missed periods at once; calendar periods are stepped one at a
/// time and must advance strictly on every step.
///
/// # Errors
///
/// `Overflow` if a step leaves the representable range or fails to advance.
pub fn advance_past(
    base: Instant,
    amount: &TemporalAmount,
    zone: Option<&Zone>,
    now: Instant,
) -> Result<Instant> {
    if base > now {
        return Ok(base);
    }
    let mut current = base;
    if let TemporalAmount::Duration(d) = amount {
        if *d <= TimeDelta::zero() {
            return Err(Error::Overflow(format!("non-positive period {}", amount)));
        }
        let missed = whole_periods(now - base, *d);
        if missed > 0 {
            let jump = multiply(*d, missed)
                .ok_or_else(|| Error::Overflow(format!("{} x {}", amount, missed)))?;
            current = base
                .checked_add_signed(jump)
                .ok_or_else(|| Error::Overflow(format!("{} + {}", base, jump)))?;
        }
    }
    while current <= now {
        let next = add_period(current, amount, zone)?;
        if next <= current {
            return Err(Error::Overflow(format!(
                "period {} does not advance past {}",
                amount, current
            )));
        }
        current = next;
    }
    Ok(current)
}

fn whole_periods(elapsed: TimeDelta, period: TimeDelta) -> i64 {
    match (elapsed.num_nanoseconds(), period.num_nanoseconds()) {
        (Some(e), Some(p)) if p > 0 => e / p,
        _ => {
            let p = period.num_milliseconds();
            if p > 0 {
                elapsed.num_milliseconds() / p
            } else {
                0
            }
        }
    }
}

fn multiply(d: TimeDelta, n: i64) -> Option<TimeDelta> {
    if let Some(ns) = d.num_nanoseconds().and_then(|ns| ns.checked_mul(n)) {
        return Some(TimeDelta::nanoseconds(ns));
    }
    d.num_milliseconds()
        .checked_mul(n)
        .and_then(TimeDelta::try_milliseconds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> Instant {
        Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
    }

    #[test]
    fn test_zero_factor_rejected() {
        assert!(matches!(
            to_temporal_amount(0, TemporalUnit::Minutes),
            Err(Error::InvalidFactor(0))
        ));
        assert!(PeriodSpec::new(0, TemporalUnit::Days).is_err());
    }

    #[test]
    fn test_exotic_units_rejected() {
        for unit in [TemporalUnit::Eras, TemporalUnit::Forever] {
            assert!(matches!(
                to_temporal_amount(1, unit),
                Err(Error::UnsupportedUnit(u)) if u == unit
            ));
        }
    }

    #[test]
    fn test_duration_units_map_to_elapsed_time() {
        assert_eq!(
            to_temporal_amount(15, TemporalUnit::Minutes).unwrap(),
            TemporalAmount::Duration(TimeDelta::minutes(15))
        );
        assert_eq!(
            to_temporal_amount(2, TemporalUnit::HalfDays).unwrap(),
            TemporalAmount::Duration(TimeDelta::hours(24))
        );
        assert_eq!(
            to_temporal_amount(250, TemporalUnit::Millis).unwrap(),
            TemporalAmount::Duration(TimeDelta::milliseconds(250))
        );
    }

    #[test]
    fn test_date_units_map_to_calendar_period() {
        let amount = to_temporal_amount(3, TemporalUnit::Months).unwrap();
        match amount {
            TemporalAmount::Calendar(p) => {
                assert_eq!(p.factor(), 3);
                assert_eq!(p.unit(), TemporalUnit::Months);
            }
            other => panic!("expected calendar period, got {:?}", other),
        }
    }

    #[test]
    fn test_huge_duration_overflows() {
        assert!(matches!(
            to_temporal_amount(u64::MAX, TemporalUnit::Hours),
            Err(Error::Overflow(_))
        ));
    }

    #[test]
    fn test_month_clamps_to_last_valid_day() {
        let jan31 = utc(2021, 1, 31, 0, 0, 0);
        let month = to_temporal_amount(1, TemporalUnit::Months).unwrap();
        let next = add_period(jan31, &month, Some(&Zone::Utc)).unwrap();
        assert_eq!(next, utc(2021, 2, 28, 0, 0, 0));
    }

    #[test]
    fn test_thirty_days_duration_is_exact() {
        let jan31 = utc(2021, 1, 31, 0, 0, 0);
        let thirty = TemporalAmount::Duration(TimeDelta::days(30));
        let next = add_period(jan31, &thirty, Some(&Zone::Utc)).unwrap();
        assert_eq!((next - jan31).num_seconds(), 30 * 86_400);
        assert_eq!(next, utc(2021, 3, 2, 0, 0, 0));
    }

    #[test]
    fn test_calendar_days_keep_wall_clock_in_fixed_zone() {
        let zone = Zone::fixed(-5 * 3600).unwrap();
        let start = utc(2020, 2, 28, 15, 0, 0);
        let day = to_temporal_amount(2, TemporalUnit::Days).unwrap();
        let next = add_period(start, &day, Some(&zone)).unwrap();
        // Leap year: Feb 28 + 2 days = Mar 1
        assert_eq!(next, utc(2020, 3, 1, 15, 0, 0));
    }

    #[test]
    fn test_calendar_days_stay_at_local_midnight_across_dst() {
        let zone = Zone::Named(chrono_tz::Europe::Berlin);
        let day = to_temporal_amount(1, TemporalUnit::Days).unwrap();
        // Local midnight on 2021-03-28 (CET) and 2021-03-29 (CEST)
        let before = utc(2021, 3, 27, 23, 0, 0);
        let after = add_period(before, &day, Some(&zone)).unwrap();
        assert_eq!(after, utc(2021, 3, 28, 22, 0, 0));
        assert_eq!((after - before).num_hours(), 23);
        assert_eq!(subtract_period(after, &day, Some(&zone)).unwrap(), before);

        let fixed = to_temporal_amount(24, TemporalUnit::Hours).unwrap();
        let shifted = add_period(before, &fixed, Some(&zone)).unwrap();
        assert_eq!(shifted, utc(2021, 3, 28, 23, 0, 0));
    }

    #[test]
    fn test_years_decades_centuries() {
        let base = utc(2000, 2, 29, 12, 0, 0);
        let year = to_temporal_amount(1, TemporalUnit::Years).unwrap();
        let zone = Some(&Zone::Utc);
        assert_eq!(add_period(base, &year, zone).unwrap(), utc(2001, 2, 28, 12, 0, 0));
        let decade = to_temporal_amount(1, TemporalUnit::Decades).unwrap();
        assert_eq!(add_period(base, &decade, zone).unwrap(), utc(2010, 2, 28, 12, 0, 0));
        let century = to_temporal_amount(1, TemporalUnit::Centuries).unwrap();
        assert_eq!(add_period(base, &century, zone).unwrap(), utc(2100, 2, 28, 12, 0, 0));
    }

    #[test]
    fn test_subtract_period() {
        let mar31 = utc(2021, 3, 31, 8, 0, 0);
        let month = to_temporal_amount(1, TemporalUnit::Months).unwrap();
        assert_eq!(
            subtract_period(mar31, &month, Some(&Zone::Utc)).unwrap(),
            utc(2021, 2, 28, 8, 0, 0)
        );
        let week = to_temporal_amount(1, TemporalUnit::Weeks).unwrap();
        assert_eq!(
            subtract_period(mar31, &week, Some(&Zone::Utc)).unwrap(),
            utc(2021, 3, 24, 8, 0, 0)
        );
    }

    #[test]
    fn test_catch_up_duration_single_pass() {
        let t0 = utc(2024, 1, 1, 0, 0, 0);
        let period = TimeDelta::minutes(10);
        let amount = TemporalAmount::Duration(period);
        // now = T0 + 7.5 periods
        let now = t0 + TimeDelta::minutes(75);
        let next = advance_past(t0, &amount, None, now).unwrap();
        assert_eq!(next, t0 + TimeDelta::minutes(80));
    }

    #[test]
    fn test_catch_up_exact_boundary_moves_strictly_past() {
        let t0 = utc(2024, 1, 1, 0, 0, 0);
        let amount = TemporalAmount::Duration(TimeDelta::seconds(30));
        let now = t0 + TimeDelta::seconds(90);
        assert_eq!(
            advance_past(t0, &amount, None, now).unwrap(),
            t0 + TimeDelta::seconds(120)
        );
    }

    #[test]
    fn test_catch_up_future_base_unchanged() {
        let now = utc(2024, 1, 1, 0, 0, 0);
        let base = now + TimeDelta::hours(1);
        let amount = TemporalAmount::Duration(TimeDelta::minutes(1));
        assert_eq!(advance_past(base, &amount, None, now).unwrap(), base);
    }

    #[test]
    fn test_catch_up_calendar_months() {
        let t0 = utc(2020, 1, 31, 6, 0, 0);
        let month = to_temporal_amount(1, TemporalUnit::Months).unwrap();
        let now = utc(2020, 5, 15, 0, 0, 0);
        // Each step is applied to the previous result: Jan 31 -> Feb 29 -> Mar 29 -> ...
        let next = advance_past(t0, &month, Some(&Zone::Utc), now).unwrap();
        assert_eq!(next, utc(2020, 5, 29, 6, 0, 0));
    }

    #[test]
    fn test_nominal_duration() {
        let week = to_temporal_amount(2, TemporalUnit::Weeks).unwrap();
        assert_eq!(week.nominal_duration(), Some(TimeDelta::days(14)));
        assert!(week.is_calendar());
    }

    proptest! {
        #[test]
        fn prop_catch_up_is_smallest_multiple_after_now(
            period_secs in 1i64..100_000,
            elapsed_secs in 0i64..10_000_000,
        ) {
            let t0 = utc(2020, 1, 1, 0, 0, 0);
            let period = TimeDelta::seconds(period_secs);
            let amount = TemporalAmount::Duration(period);
            let now = t0 + TimeDelta::seconds(elapsed_secs);
            let next = advance_past(t0, &amount, None, now).unwrap();
            prop_assert!(next > now);
            prop_assert!(next - period <= now);
            prop_assert_eq!((next - t0).num_seconds() % period_secs, 0);
        }
    }
}
