//! Core types and pure functions for periodica
//!
//! This crate defines the foundational types used throughout the system:
//! - TemporalUnit: duration-based vs date-based units
//! - PeriodSpec / TemporalAmount: factor+unit and its resolved length
//! - Zone: timezone used for civil-time arithmetic
//! - Clock: source of "now"
//! - align: interval alignment (bucket boundaries)
//! - Error: Error type hierarchy

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod align;
pub mod clock;
pub mod error;
pub mod period;
pub mod unit;
pub mod zone;

pub use align::{aligned_start, alignment_base, is_aligned, truncate, Direction};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{Error, Result};
pub use period::{
    add_period, advance_past, subtract_period, to_temporal_amount, CalendarPeriod, Instant,
    PeriodSpec, TemporalAmount,
};
pub use unit::TemporalUnit;
pub use zone::Zone;
