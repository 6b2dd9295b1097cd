//! Read-mostly view of a timer's alarm
//!
//! A [`PeriodicTimer`](crate::PeriodicTimer) is the only writer of "when do I
//! fire next". Callers reach its alarm through [`DelegatingAlarm`], which
//! forwards inspection only. Cancelling goes through
//! [`PeriodicTimer::stop`](crate::PeriodicTimer::stop) or
//! [`PeriodicTimer::destroy`](crate::PeriodicTimer::destroy), so the alarm
//! never disagrees with the timer state.

use chrono::TimeDelta;
use periodica_core::{Error, Instant, Result};

use crate::alarm::{AlarmPrimitive, FireCallback};

/// Pass-through wrapper around the timer-owned alarm
///
/// Only the owning timer can cancel or destroy the alarm:
///
/// ```compile_fail
/// fn cancel_behind_timer(timer: &periodica_timer::PeriodicTimer) {
///     timer.alarm().cancel();
/// }
/// ```
///
/// ```compile_fail
/// fn destroy_behind_timer(timer: &periodica_timer::PeriodicTimer) {
///     timer.alarm().destroy();
/// }
/// ```
pub struct DelegatingAlarm {
    inner: Box<dyn AlarmPrimitive>,
}

impl DelegatingAlarm {
    pub(crate) fn new(inner: Box<dyn AlarmPrimitive>) -> Self {
        DelegatingAlarm { inner }
    }

    pub(crate) fn cancel(&self) {
        self.inner.cancel();
    }

    pub(crate) fn destroy(&self) {
        self.inner.destroy();
    }

    /// Whether a firing is pending
    pub fn is_armed(&self) -> bool {
        self.inner.is_armed()
    }

    /// When the alarm last fired
    pub fn last_fired_at(&self) -> Option<Instant> {
        self.inner.last_fired_at()
    }

    /// Always rejected; the schedule is derived from the timer configuration.
    ///
    /// # Errors
    ///
    /// Always `Unsupported`.
    pub fn set_timing_interval(&self, _interval: TimeDelta) -> Result<()> {
        Err(Error::Unsupported("set_timing_interval on a periodic timer alarm"))
    }

    pub(crate) fn rearm(&self, delay: TimeDelta) -> Result<()> {
        self.inner.arm(delay)
    }

    pub(crate) fn on_fire(&self, callback: FireCallback) {
        self.inner.on_fire(callback);
    }
}
