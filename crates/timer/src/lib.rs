//! Periodic timers persisted in a configuration store
//!
//! - [`PeriodicTimer`]: recompute-and-reschedule loop over a
//!   [`ConfigStore`](periodica_store::ConfigStore)
//! - [`AlarmPrimitive`] / [`ThreadAlarm`]: one-shot alarms
//! - [`DelegatingAlarm`]: the timer's alarm as seen by callers
//! - [`testing`]: manual clock and alarm for deterministic tests

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod alarm;
pub mod delegate;
pub mod periodic;
pub mod testing;

pub use alarm::{AlarmPrimitive, FireCallback, ThreadAlarm};
pub use delegate::DelegatingAlarm;
pub use periodic::{FireListener, ListenerId, PeriodicTimer, TimerState};
