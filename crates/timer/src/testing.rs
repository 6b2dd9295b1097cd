//! Deterministic time for tests
//!
//! [`ManualAlarm`] never fires on its own; tests call [`ManualAlarm::fire`]
//! after moving a [`ManualClock`] forward.

use chrono::TimeDelta;
use parking_lot::Mutex;
use periodica_core::{Clock, Error, Instant, Result};
use std::sync::Arc;

use crate::alarm::{AlarmPrimitive, FireCallback};

pub use periodica_core::ManualClock;

#[derive(Default)]
struct ManualState {
    armed: Option<TimeDelta>,
    arm_count: usize,
    callback: Option<FireCallback>,
    last_fired: Option<Instant>,
    destroyed: bool,
}

/// Alarm driven by hand.
///
/// Clones share state, so a test can keep one handle while the timer owns
/// another.
#[derive(Clone)]
pub struct ManualAlarm {
    state: Arc<Mutex<ManualState>>,
    clock: Arc<dyn Clock>,
}

impl ManualAlarm {
    /// Create an alarm that stamps firings with `clock`.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        ManualAlarm {
            state: Arc::new(Mutex::new(ManualState::default())),
            clock,
        }
    }

    /// Invoke the callback now, whether or not the alarm is armed.
    ///
    /// Returns false if the alarm is destroyed or has no callback.
    pub fn fire(&self) -> bool {
        let callback = {
            let mut state = self.state.lock();
            if state.destroyed {
                return false;
            }
            state.armed = None;
            state.last_fired = Some(self.clock.now());
            state.callback.clone()
        };
        match callback {
            Some(callback) => {
                callback();
                true
            }
            None => false,
        }
    }

    /// Delay passed to the most recent `arm`, while still pending
    pub fn armed_delay(&self) -> Option<TimeDelta> {
        self.state.lock().armed
    }

    /// Number of `arm` calls so far
    pub fn arm_count(&self) -> usize {
        self.state.lock().arm_count
    }

    /// Whether `destroy` was called
    pub fn is_destroyed(&self) -> bool {
        self.state.lock().destroyed
    }
}

impl AlarmPrimitive for ManualAlarm {
    fn arm(&self, delay: TimeDelta) -> Result<()> {
        let mut state = self.state.lock();
        if state.destroyed {
            return Err(Error::UseAfterDestroy);
        }
        state.armed = Some(delay.max(TimeDelta::zero()));
        state.arm_count += 1;
        Ok(())
    }

    fn cancel(&self) {
        self.state.lock().armed = None;
    }

    fn destroy(&self) {
        let mut state = self.state.lock();
        state.destroyed = true;
        state.armed = None;
        state.callback = None;
    }

    fn is_armed(&self) -> bool {
        self.state.lock().armed.is_some()
    }

    fn last_fired_at(&self) -> Option<Instant> {
        self.state.lock().last_fired
    }

    fn on_fire(&self, callback: FireCallback) {
        self.state.lock().callback = Some(callback);
    }
}
