//! Periodica - persisted periodic timers
//!
//! A timer's schedule (period, start, end, timezone, next execution time)
//! lives in a configuration store. The timer recomputes it on every firing
//! and on every edit, so changes to a running timer apply immediately and
//! missed periods are skipped after downtime.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use periodica::{
//!     MemoryConfigStore, PeriodSpec, PeriodicTimer, SystemClock, TemporalUnit, ThreadAlarm,
//! };
//!
//! let store = Arc::new(MemoryConfigStore::new());
//! let timer = PeriodicTimer::create(
//!     store,
//!     Box::new(ThreadAlarm::new()?),
//!     Arc::new(SystemClock),
//!     PeriodSpec::new(1, TemporalUnit::Days)?,
//!     None,
//! )?;
//! timer.add_listener(Arc::new(|at| println!("daily run for {at}")));
//! timer.resume();
//! # Ok::<(), periodica::Error>(())
//! ```
//!
//! # Crates
//!
//! - `periodica-core`: units, periods, alignment, zones, clocks, errors
//! - `periodica-store`: the configuration store contract and TOML config
//! - `periodica-timer`: alarms and the periodic timer

pub use periodica_core::*;
pub use periodica_store::*;
pub use periodica_timer::*;
