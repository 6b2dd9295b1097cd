//! Alarm primitives
//!
//! An alarm fires a callback once after a delay. A periodic timer owns one
//! alarm and re-arms it after every firing.

use chrono::TimeDelta;
use parking_lot::{Condvar, Mutex, MutexGuard};
use periodica_core::{Clock, Error, Instant, Result, SystemClock};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, error};

/// Callback invoked when an alarm fires
pub type FireCallback = Arc<dyn Fn() + Send + Sync>;

/// One-shot, re-armable alarm.
pub trait AlarmPrimitive: Send + Sync {
    /// Arm the alarm to fire after `delay`, replacing any pending deadline.
    /// Negative delays fire immediately.
    ///
    /// # Errors
    ///
    /// `UseAfterDestroy` once the alarm has been destroyed.
    fn arm(&self, delay: TimeDelta) -> Result<()>;

    /// Drop the pending deadline, if any.
    fn cancel(&self);

    /// Cancel and release all resources. Idempotent.
    fn destroy(&self);

    /// Whether a deadline is pending
    fn is_armed(&self) -> bool;

    /// When the alarm last fired
    fn last_fired_at(&self) -> Option<Instant>;

    /// Set the callback invoked on firing, replacing any previous one.
    fn on_fire(&self, callback: FireCallback);
}

// ============================================================================
// ThreadAlarm
// ============================================================================

static ALARM_SEQUENCE: AtomicU64 = AtomicU64::new(0);

struct AlarmState {
    deadline: Option<std::time::Instant>,
    callback: Option<FireCallback>,
    last_fired: Option<Instant>,
    shutdown: bool,
}

struct AlarmShared {
    state: Mutex<AlarmState>,
    wake: Condvar,
    clock: Arc<dyn Clock>,
}

/// Alarm backed by a dedicated thread.
///
/// The thread (`periodica-alarm-N`) sleeps on a condvar until the deadline,
/// so re-arming or cancelling takes effect without waiting out the old delay.
pub struct ThreadAlarm {
    shared: Arc<AlarmShared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl ThreadAlarm {
    /// Create an alarm that stamps firings with the wall clock.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the alarm thread cannot be spawned.
    pub fn new() -> Result<Self> {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create an alarm that stamps firings with `clock`.
    ///
    /// Deadlines always run on the monotonic clock; `clock` only feeds
    /// [`AlarmPrimitive::last_fired_at`].
    ///
    /// # Errors
    ///
    /// Returns `Io` if the alarm thread cannot be spawned.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Result<Self> {
        let shared = Arc::new(AlarmShared {
            state: Mutex::new(AlarmState {
                deadline: None,
                callback: None,
                last_fired: None,
                shutdown: false,
            }),
            wake: Condvar::new(),
            clock,
        });

        let id = ALARM_SEQUENCE.fetch_add(1, Ordering::Relaxed);
        let thread_shared = Arc::clone(&shared);
        let handle = std::thread::Builder::new()
            .name(format!("periodica-alarm-{}", id))
            .spawn(move || alarm_loop(&thread_shared))?;

        Ok(ThreadAlarm {
            shared,
            worker: Mutex::new(Some(handle)),
        })
    }

    fn lock_live(&self) -> Result<MutexGuard<'_, AlarmState>> {
        let state = self.shared.state.lock();
        if state.shutdown {
            return Err(Error::UseAfterDestroy);
        }
        Ok(state)
    }
}

impl AlarmPrimitive for ThreadAlarm {
    fn arm(&self, delay: TimeDelta) -> Result<()> {
        let delay = delay.to_std().unwrap_or(std::time::Duration::ZERO);
        let mut state = self.lock_live()?;
        state.deadline = Some(std::time::Instant::now() + delay);
        self.shared.wake.notify_one();
        Ok(())
    }

    fn cancel(&self) {
        let mut state = self.shared.state.lock();
        if state.deadline.take().is_some() {
            self.shared.wake.notify_one();
        }
    }

    fn destroy(&self) {
        {
            let mut state = self.shared.state.lock();
            if state.shutdown {
                return;
            }
            state.shutdown = true;
            state.deadline = None;
            state.callback = None;
            self.shared.wake.notify_all();
        }

        if let Some(handle) = self.worker.lock().take() {
            // A callback that destroys its own alarm runs on the alarm thread
            if handle.thread().id() != std::thread::current().id() {
                let _ = handle.join();
            }
        }
        debug!(target: "periodica::alarm", "Alarm destroyed");
    }

    fn is_armed(&self) -> bool {
        self.shared.state.lock().deadline.is_some()
    }

    fn last_fired_at(&self) -> Option<Instant> {
        self.shared.state.lock().last_fired
    }

    fn on_fire(&self, callback: FireCallback) {
        let mut state = self.shared.state.lock();
        if !state.shutdown {
            state.callback = Some(callback);
        }
    }
}

impl Drop for ThreadAlarm {
    fn drop(&mut self) {
        self.destroy();
    }
}

fn alarm_loop(shared: &AlarmShared) {
    let mut state = shared.state.lock();
    loop {
        if state.shutdown {
            return;
        }
        let Some(deadline) = state.deadline else {
            shared.wake.wait(&mut state);
            continue;
        };
        if std::time::Instant::now() < deadline {
            shared.wake.wait_until(&mut state, deadline);
            continue;
        }

        state.deadline = None;
        state.last_fired = Some(shared.clock.now());
        let Some(callback) = state.callback.clone() else {
            continue;
        };
        MutexGuard::unlocked(&mut state, || {
            let call = std::panic::AssertUnwindSafe(|| callback());
            if std::panic::catch_unwind(call).is_err() {
                error!(target: "periodica::alarm", "Alarm callback panicked");
            }
        });
    }
}
