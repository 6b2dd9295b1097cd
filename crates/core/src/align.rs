//! Interval alignment
//!
//! Computes "nice" bucket boundaries for a factor/unit pair: the start of the
//! current 15-minute quarter of an hour, the start of the current calendar
//! quarter, and so on.
//!
//! ## Algorithm
//!
//! ```text
//! 1. base_count = alignment_base(unit)      MONTHS=12 HOURS=24 MINUTES=60 SECONDS=60, else 1
//! 2. aligned    = factor > 1 && base_count % factor == 0
//! 3. not aligned: candidate = truncate(base, unit)
//!    aligned:     start     = truncate(base, coarser(unit))
//!                 candidate = last start + k*factor units that is <= base
//! 4. NEXT and candidate != base: candidate += factor units
//! ```
//!
//! Duration-based units work on absolute (UTC) time; date-based units work on
//! civil time in the given zone (system zone when none is given). A factor
//! that does not divide the alignment base is ignored and plain truncation
//! applies, e.g. 17 minutes truncates to the current minute.

use chrono::{Datelike, DurationRound, NaiveDate, NaiveDateTime, TimeDelta};

use crate::error::{Error, Result};
use crate::period::{to_temporal_amount, Instant, TemporalAmount};
use crate::unit::TemporalUnit;
use crate::zone::Zone;

/// Which boundary to return relative to the base instant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Last boundary at or before the base instant
    Previous,
    /// First boundary strictly after the base instant (or the base itself if it is a boundary)
    Next,
}

/// Number of `unit`s that make up the next coarser unit, or 1 if unknown.
pub const fn alignment_base(unit: TemporalUnit) -> u64 {
    match unit {
        TemporalUnit::Months => 12,
        TemporalUnit::Hours => 24,
        TemporalUnit::Minutes => 60,
        TemporalUnit::Seconds => 60,
        _ => 1,
    }
}

/// True if `factor` units evenly tile the next coarser unit.
pub const fn is_aligned(factor: u64, unit: TemporalUnit) -> bool {
    factor > 1 && alignment_base(unit) % factor == 0
}

const fn coarser(unit: TemporalUnit) -> Option<TemporalUnit> {
    match unit {
        TemporalUnit::Seconds => Some(TemporalUnit::Minutes),
        TemporalUnit::Minutes => Some(TemporalUnit::Hours),
        TemporalUnit::Hours => Some(TemporalUnit::Days),
        TemporalUnit::Months => Some(TemporalUnit::Years),
        _ => None,
    }
}

/// Aligned bucket boundary for `factor` × `unit` around `base`.
///
/// # Errors
///
/// - `InvalidFactor` when `factor == 0`
/// - `UnsupportedUnit` for units without a truncation (`ERAS`, `FOREVER`)
/// - `Overflow` when the boundary is out of range
pub fn aligned_start(
    base: Instant,
    factor: u64,
    unit: TemporalUnit,
    zone: Option<&Zone>,
    direction: Direction,
) -> Result<Instant> {
    let step = to_temporal_amount(factor, unit)?;
    if unit.is_duration_based() {
        let TemporalAmount::Duration(step) = step else {
            return Err(Error::UnsupportedUnit(unit));
        };
        aligned_absolute(base, factor, unit, step, direction)
    } else {
        let TemporalAmount::Calendar(period) = step else {
            return Err(Error::UnsupportedUnit(unit));
        };
        let zone = zone.copied().unwrap_or_default();
        let civil = zone.to_civil(base);
        let overflow = || Error::Overflow(format!("aligning {} to {} {}", base, factor, unit));

        let mut candidate = match coarser(unit).filter(|_| is_aligned(factor, unit)) {
            Some(outer) => {
                let mut current = truncate_civil(civil, outer)?;
                loop {
                    let next = period.shift_civil(current, true).ok_or_else(overflow)?;
                    if next > civil {
                        break current;
                    }
                    current = next;
                }
            }
            None => truncate_civil(civil, unit)?,
        };
        if direction == Direction::Next && candidate != civil {
            candidate = period.shift_civil(candidate, true).ok_or_else(overflow)?;
        }
        zone.from_civil(candidate)
    }
}

fn aligned_absolute(
    base: Instant,
    factor: u64,
    unit: TemporalUnit,
    step: TimeDelta,
    direction: Direction,
) -> Result<Instant> {
    let overflow = || Error::Overflow(format!("aligning {} to {} {}", base, factor, unit));
    let mut candidate = match coarser(unit).filter(|_| is_aligned(factor, unit)) {
        Some(outer) => {
            let mut current = truncate_absolute(base, outer)?;
            loop {
                let next = current.checked_add_signed(step).ok_or_else(overflow)?;
                if next > base {
                    break current;
                }
                current = next;
            }
        }
        None => truncate_absolute(base, unit)?,
    };
    if direction == Direction::Next && candidate != base {
        candidate = candidate.checked_add_signed(step).ok_or_else(overflow)?;
    }
    Ok(candidate)
}

/// Drop every component of `base` finer than `unit`.
///
/// Duration-based units truncate absolute time; date-based units truncate
/// civil time in `zone`.
pub fn truncate(base: Instant, unit: TemporalUnit, zone: Option<&Zone>) -> Result<Instant> {
    if unit.is_duration_based() {
        return truncate_absolute(base, unit);
    }
    let zone = zone.copied().unwrap_or_default();
    let civil = truncate_civil(zone.to_civil(base), unit)?;
    zone.from_civil(civil)
}

fn truncate_absolute(base: Instant, unit: TemporalUnit) -> Result<Instant> {
    let width = match unit {
        TemporalUnit::Days => TimeDelta::days(1),
        other => other
            .millis()
            .map(TimeDelta::milliseconds)
            .ok_or(Error::UnsupportedUnit(other))?,
    };
    base.duration_trunc(width)
        .map_err(|e| Error::Overflow(format!("truncating {} to {}: {}", base, unit, e)))
}

fn truncate_civil(civil: NaiveDateTime, unit: TemporalUnit) -> Result<NaiveDateTime> {
    let date = civil.date();
    let truncated = match unit {
        TemporalUnit::Days => Some(date),
        TemporalUnit::Weeks => date.checked_sub_days(chrono::Days::new(u64::from(
            date.weekday().num_days_from_monday(),
        ))),
        TemporalUnit::Months => date.with_day(1),
        TemporalUnit::Years => year_start(date.year()),
        TemporalUnit::Decades => year_start(date.year() - date.year().rem_euclid(10)),
        TemporalUnit::Centuries => year_start(date.year() - date.year().rem_euclid(100)),
        TemporalUnit::Millennia => year_start(date.year() - date.year().rem_euclid(1000)),
        other => return Err(Error::UnsupportedUnit(other)),
    };
    truncated
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| Error::Overflow(format!("truncating {} to {}", civil, unit)))
}

fn year_start(year: i32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, 1, 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> Instant {
        Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
    }

    fn base() -> Instant {
        utc(2018, 6, 22, 11, 25, 51)
    }

    #[test]
    fn test_alignment_base_table() {
        assert_eq!(alignment_base(TemporalUnit::Months), 12);
        assert_eq!(alignment_base(TemporalUnit::Hours), 24);
        assert_eq!(alignment_base(TemporalUnit::Minutes), 60);
        assert_eq!(alignment_base(TemporalUnit::Seconds), 60);
        assert_eq!(alignment_base(TemporalUnit::Days), 1);
        assert_eq!(alignment_base(TemporalUnit::Weeks), 1);
    }

    #[test]
    fn test_factor_one_is_never_aligned() {
        for unit in TemporalUnit::ALL {
            assert!(!is_aligned(1, unit));
        }
        assert!(is_aligned(15, TemporalUnit::Minutes));
        assert!(!is_aligned(17, TemporalUnit::Minutes));
    }

    #[test]
    fn test_quarter_hour_previous_and_next() {
        let prev =
            aligned_start(base(), 15, TemporalUnit::Minutes, None, Direction::Previous).unwrap();
        assert_eq!(prev, utc(2018, 6, 22, 11, 15, 0));
        let next = aligned_start(base(), 15, TemporalUnit::Minutes, None, Direction::Next).unwrap();
        assert_eq!(next, utc(2018, 6, 22, 11, 30, 0));
    }

    #[test]
    fn test_non_dividing_factor_truncates_to_unit() {
        let prev =
            aligned_start(base(), 17, TemporalUnit::Minutes, None, Direction::Previous).unwrap();
        assert_eq!(prev, utc(2018, 6, 22, 11, 25, 0));
        let next = aligned_start(base(), 17, TemporalUnit::Minutes, None, Direction::Next).unwrap();
        assert_eq!(next, utc(2018, 6, 22, 11, 42, 0));
    }

    #[test]
    fn test_calendar_quarter() {
        let base = utc(2018, 8, 21, 23, 5, 21);
        let zone = Some(&Zone::Utc);
        let prev = aligned_start(base, 3, TemporalUnit::Months, zone, Direction::Previous).unwrap();
        assert_eq!(prev, utc(2018, 7, 1, 0, 0, 0));
        let next = aligned_start(base, 3, TemporalUnit::Months, zone, Direction::Next).unwrap();
        assert_eq!(next, utc(2018, 10, 1, 0, 0, 0));
    }

    #[test]
    fn test_six_hour_blocks_start_at_utc_midnight() {
        let prev =
            aligned_start(base(), 6, TemporalUnit::Hours, None, Direction::Previous).unwrap();
        assert_eq!(prev, utc(2018, 6, 22, 6, 0, 0));
    }

    #[test]
    fn test_base_on_boundary_is_its_own_next() {
        let on = utc(2018, 6, 22, 11, 30, 0);
        let next = aligned_start(on, 15, TemporalUnit::Minutes, None, Direction::Next).unwrap();
        assert_eq!(next, on);
    }

    #[test]
    fn test_truncate_date_units() {
        let base = utc(2018, 6, 22, 11, 25, 51); // a Friday
        let z = Some(&Zone::Utc);
        assert_eq!(truncate(base, TemporalUnit::Days, z).unwrap(), utc(2018, 6, 22, 0, 0, 0));
        assert_eq!(truncate(base, TemporalUnit::Weeks, z).unwrap(), utc(2018, 6, 18, 0, 0, 0));
        assert_eq!(truncate(base, TemporalUnit::Months, z).unwrap(), utc(2018, 6, 1, 0, 0, 0));
        assert_eq!(truncate(base, TemporalUnit::Years, z).unwrap(), utc(2018, 1, 1, 0, 0, 0));
        assert_eq!(truncate(base, TemporalUnit::Decades, z).unwrap(), utc(2010, 1, 1, 0, 0, 0));
        assert_eq!(truncate(base, TemporalUnit::Centuries, z).unwrap(), utc(2000, 1, 1, 0, 0, 0));
        assert_eq!(truncate(base, TemporalUnit::Millennia, z).unwrap(), utc(2000, 1, 1, 0, 0, 0));
    }

    #[test]
    fn test_truncate_in_fixed_zone_uses_local_midnight() {
        let zone = Zone::fixed(2 * 3600).unwrap();
        // 23:30 UTC on the 21st is 01:30 on the 22nd at +02:00
        let base = utc(2018, 6, 21, 23, 30, 0);
        let day = truncate(base, TemporalUnit::Days, Some(&zone)).unwrap();
        assert_eq!(day, utc(2018, 6, 21, 22, 0, 0));
    }

    #[test]
    fn test_truncate_duration_units() {
        let base = utc(2018, 6, 22, 13, 25, 51) + TimeDelta::milliseconds(789);
        assert_eq!(
            truncate(base, TemporalUnit::Seconds, None).unwrap(),
            utc(2018, 6, 22, 13, 25, 51)
        );
        assert_eq!(
            truncate(base, TemporalUnit::Hours, None).unwrap(),
            utc(2018, 6, 22, 13, 0, 0)
        );
        assert_eq!(
            truncate(base, TemporalUnit::HalfDays, None).unwrap(),
            utc(2018, 6, 22, 12, 0, 0)
        );
    }

    #[test]
    fn test_exotic_unit_is_an_error() {
        for unit in [TemporalUnit::Eras, TemporalUnit::Forever] {
            assert!(matches!(
                aligned_start(base(), 1, unit, None, Direction::Previous),
                Err(Error::UnsupportedUnit(_))
            ));
            assert!(matches!(truncate(base(), unit, None), Err(Error::UnsupportedUnit(_))));
        }
    }

    #[test]
    fn test_zero_factor_is_an_error() {
        assert!(matches!(
            aligned_start(base(), 0, TemporalUnit::Minutes, None, Direction::Previous),
            Err(Error::InvalidFactor(0))
        ));
    }

    const DURATION_DIVISORS: [(TemporalUnit, u64); 3] = [
        (TemporalUnit::Seconds, 60),
        (TemporalUnit::Minutes, 60),
        (TemporalUnit::Hours, 24),
    ];

    proptest! {
        #[test]
        fn prop_duration_alignment_brackets_base(
            secs in 0i64..4_000_000_000,
            unit_idx in 0usize..3,
            divisor_idx in 0usize..12,
        ) {
            let (unit, base_count) = DURATION_DIVISORS[unit_idx];
            let divisors: Vec<u64> = (2..=base_count).filter(|f| base_count % f == 0).collect();
            let factor = divisors[divisor_idx % divisors.len()];
            let base = Utc.timestamp_opt(secs, 0).unwrap();

            let prev = aligned_start(base, factor, unit, None, Direction::Previous).unwrap();
            let next = aligned_start(base, factor, unit, None, Direction::Next).unwrap();
            prop_assert!(prev <= base);
            if prev == base {
                prop_assert_eq!(next, base);
            } else {
                prop_assert!(base < next);
                let width = TimeDelta::milliseconds(unit.millis().unwrap() * factor as i64);
                prop_assert_eq!(next - prev, width);
            }
        }

        #[test]
        fn prop_month_alignment_brackets_base(
            secs in 0i64..4_000_000_000,
            divisor_idx in 0usize..5,
        ) {
            let factor = [2u64, 3, 4, 6, 12][divisor_idx];
            let base = Utc.timestamp_opt(secs, 0).unwrap();
            let zone = Some(&Zone::Utc);

            let prev =
                aligned_start(base, factor, TemporalUnit::Months, zone, Direction::Previous)
                    .unwrap();
            let next =
                aligned_start(base, factor, TemporalUnit::Months, zone, Direction::Next).unwrap();
            prop_assert!(prev <= base);
            prop_assert!(prev == base || base < next);
            prop_assert_eq!((prev.month0() as u64) % factor, 0);
            let months_apart =
                (next.year() - prev.year()) * 12 + next.month() as i32 - prev.month() as i32;
            if prev != base {
                prop_assert_eq!(months_apart as u64, factor);
            }
        }
    }
}
