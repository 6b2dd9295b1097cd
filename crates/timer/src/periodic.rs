//! Persisted periodic timer
//!
//! A [`PeriodicTimer`] keeps its schedule in a [`ConfigStore`] and drives one
//! alarm from it. Two sources produce work:
//! - the alarm firing
//! - change notifications from the store
//!
//! Both only enqueue a [`TimerEvent`]. A dedicated worker thread per timer
//! (`periodica-timer-N`) drains the queue, so recomputes of one timer never
//! interleave. Different timers run independently.
//!
//! Every recompute reads a fresh snapshot, advances past all missed periods
//! without firing for them, persists `next_execution_time` under an exclusive
//! lease and re-arms the alarm.

use chrono::TimeDelta;
use parking_lot::{Condvar, Mutex};
use periodica_core::{
    advance_past, aligned_start, Clock, Direction, Error, Instant, PeriodSpec, Result,
    TemporalAmount,
};
use periodica_store::{
    ChangeKind, ConfigEvent, ConfigField, ConfigListener, ConfigStore, FieldLease, FieldValue,
    SubscriptionId,
};
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::alarm::AlarmPrimitive;
use crate::delegate::DelegatingAlarm;

/// Fields whose edits trigger a recompute while running
const WATCHED_FIELDS: [ConfigField; 4] = [
    ConfigField::Period,
    ConfigField::StartTime,
    ConfigField::EndTime,
    ConfigField::Timezone,
];

static TIMER_SEQUENCE: AtomicU64 = AtomicU64::new(0);

// ============================================================================
// Public types
// ============================================================================

/// Lifecycle state of a timer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    /// Not scheduling; initial state and after `stop`
    Stopped,
    /// Scheduling from the configuration.
    ///
    /// While the configuration has no usable period a running timer keeps
    /// listening for edits but has no alarm armed, so it never fires.
    Running,
    /// Terminal
    Destroyed,
}

impl fmt::Display for TimerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TimerState::Stopped => "stopped",
            TimerState::Running => "running",
            TimerState::Destroyed => "destroyed",
        };
        f.write_str(name)
    }
}

/// Handle for removing a fire listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Called once per actual firing with the scheduled execution time
pub type FireListener = Arc<dyn Fn(Instant) + Send + Sync>;

/// Work item for the timer's worker thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerEvent {
    /// Recompute the schedule. `reanchor` ignores the stored next execution
    /// time and restarts from the start time.
    Recompute { reanchor: bool },
    /// The alarm went off
    Fire,
    /// The configuration resource changed state
    Lifecycle(ChangeKind),
}

#[derive(Default)]
struct EventQueue {
    events: VecDeque<TimerEvent>,
    busy: bool,
    shutdown: bool,
    exited: bool,
}

fn route(event: &ConfigEvent, values: bool) -> Option<TimerEvent> {
    match (event.field, event.kind) {
        (Some(ConfigField::Period | ConfigField::StartTime), _) if values => {
            Some(TimerEvent::Recompute { reanchor: true })
        }
        (Some(_), _) if values => Some(TimerEvent::Recompute { reanchor: false }),
        (None, kind) if !values => Some(TimerEvent::Lifecycle(kind)),
        _ => None,
    }
}

// ============================================================================
// Timer internals
// ============================================================================

struct TimerInner {
    name: String,
    store: Arc<dyn ConfigStore>,
    alarm: DelegatingAlarm,
    clock: Arc<dyn Clock>,
    state: Mutex<TimerState>,
    /// Gate checked by every recompute; cleared by stop and destroy
    active: AtomicBool,
    lease: Mutex<Option<FieldLease>>,
    value_subscription: Mutex<Option<SubscriptionId>>,
    lifecycle_subscription: Mutex<Option<SubscriptionId>>,
    listeners: Mutex<Vec<(ListenerId, FireListener)>>,
    next_listener: AtomicU64,
    queue: Mutex<EventQueue>,
    work_ready: Condvar,
    idle: Condvar,
}

impl TimerInner {
    fn enqueue(&self, event: TimerEvent) {
        let mut queue = self.queue.lock();
        if queue.shutdown {
            return;
        }
        queue.events.push_back(event);
        self.work_ready.notify_one();
    }

    /// Listener for store events. The value subscription also receives
    /// lifecycle events, so each listener keeps only its own kind.
    fn store_listener(weak: Weak<TimerInner>, values: bool) -> ConfigListener {
        Arc::new(move |event: &ConfigEvent| {
            let Some(timer_event) = route(event, values) else {
                return;
            };
            if let Some(inner) = weak.upgrade() {
                inner.enqueue(timer_event);
            }
        })
    }

    fn state(&self) -> TimerState {
        *self.state.lock()
    }

    fn ensure_alive(&self) -> Result<()> {
        if self.state() == TimerState::Destroyed {
            return Err(Error::UseAfterDestroy);
        }
        Ok(())
    }

    // === Lifecycle ===

    fn resume(self: &Arc<Self>) {
        let mut state = self.state.lock();
        if *state != TimerState::Stopped {
            return;
        }
        let listener = Self::store_listener(Arc::downgrade(self), true);
        let id = self.store.subscribe(&WATCHED_FIELDS, listener);
        *self.value_subscription.lock() = Some(id);
        self.active.store(true, Ordering::SeqCst);
        *state = TimerState::Running;
        drop(state);

        info!(target: "periodica::timer", timer = %self.name, "Timer resumed");
        self.enqueue(TimerEvent::Recompute { reanchor: false });
    }

    fn stop(&self) {
        let mut state = self.state.lock();
        if *state != TimerState::Running {
            return;
        }
        self.active.store(false, Ordering::SeqCst);
        if let Some(id) = self.value_subscription.lock().take() {
            self.store.unsubscribe(id);
        }
        self.alarm.cancel();
        *state = TimerState::Stopped;
        drop(state);

        info!(target: "periodica::timer", timer = %self.name, "Timer stopped");
    }

    fn destroy(&self) {
        {
            let mut state = self.state.lock();
            if *state == TimerState::Destroyed {
                return;
            }
            *state = TimerState::Destroyed;
        }
        self.active.store(false, Ordering::SeqCst);

        for subscription in [&self.value_subscription, &self.lifecycle_subscription] {
            if let Some(id) = subscription.lock().take() {
                self.store.unsubscribe(id);
            }
        }
        if let Some(lease) = self.lease.lock().take() {
            self.store.release_exclusive(lease);
        }
        self.alarm.destroy();
        self.listeners.lock().clear();

        {
            let mut queue = self.queue.lock();
            queue.shutdown = true;
            queue.events.clear();
            self.work_ready.notify_all();
        }
        info!(target: "periodica::timer", timer = %self.name, "Timer destroyed");
    }

    // === Event handling ===

    fn handle(self: &Arc<Self>, event: TimerEvent) {
        if self.state() == TimerState::Destroyed {
            return;
        }
        debug!(target: "periodica::timer", timer = %self.name, ?event, "Handling timer event");
        match event {
            TimerEvent::Recompute { reanchor } => self.recompute(reanchor),
            TimerEvent::Fire => self.fire(),
            TimerEvent::Lifecycle(ChangeKind::Deleted) => self.destroy(),
            TimerEvent::Lifecycle(ChangeKind::Deactivated) => self.stop(),
            TimerEvent::Lifecycle(ChangeKind::Activated) => {
                if self.state() == TimerState::Running {
                    self.recompute(false);
                } else {
                    self.resume();
                }
            }
            TimerEvent::Lifecycle(ChangeKind::ValueChanged) => {}
        }
    }

    fn fire(&self) {
        if !self.active.load(Ordering::SeqCst) {
            return;
        }
        let snapshot = match self.store.snapshot_read(&ConfigField::ALL) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                debug!(
                    target: "periodica::timer",
                    timer = %self.name,
                    error = %e,
                    "Snapshot failed on fire"
                );
                return;
            }
        };
        if !snapshot.active {
            return;
        }
        let now = self.clock.now();

        // Early wake-up: wait out the remainder silently
        if let Some(next) = snapshot.next_execution_time {
            if next > now {
                debug!(
                    target: "periodica::timer",
                    timer = %self.name,
                    %next,
                    "Alarm fired early, re-arming"
                );
                self.arm(next - now);
                return;
            }
        }
        if let Some(end) = snapshot.end_time {
            if end <= now {
                info!(target: "periodica::timer", timer = %self.name, %end, "End time reached");
                self.destroy();
                return;
            }
        }

        // Nothing fires without a usable period
        let period = snapshot.period.map(|spec| spec.to_amount());
        if !matches!(period, Some(Ok(_))) {
            debug!(target: "periodica::timer", timer = %self.name, "No usable period at fire time");
            self.alarm.cancel();
            return;
        }

        self.notify(snapshot.next_execution_time.unwrap_or(now));
        self.recompute(false);
    }

    fn notify(&self, scheduled: Instant) {
        let listeners: Vec<FireListener> = self
            .listeners
            .lock()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        debug!(
            target: "periodica::timer",
            timer = %self.name,
            %scheduled,
            listeners = listeners.len(),
            "Timer fired"
        );
        for listener in listeners {
            let call = std::panic::AssertUnwindSafe(|| listener(scheduled));
            if std::panic::catch_unwind(call).is_err() {
                error!(target: "periodica::timer", timer = %self.name, "Fire listener panicked");
            }
        }
    }

    /// Recompute the next execution time and re-arm the alarm.
    fn recompute(&self, reanchor: bool) {
        if !self.active.load(Ordering::SeqCst) {
            return;
        }

        // 1. consistent view of the configuration
        let snapshot = match self.store.snapshot_read(&ConfigField::ALL) {
            Ok(snapshot) => snapshot,
            Err(e) if e.is_transient() => {
                debug!(
                    target: "periodica::timer",
                    timer = %self.name,
                    error = %e,
                    "Snapshot aborted, waiting for next trigger"
                );
                return;
            }
            Err(e) => {
                warn!(
                    target: "periodica::timer",
                    timer = %self.name,
                    error = %e,
                    "Snapshot failed"
                );
                return;
            }
        };

        // 2. resource inactive
        if !snapshot.active {
            debug!(target: "periodica::timer", timer = %self.name, "Configuration inactive");
            return;
        }

        // 3. end of schedule
        let now = self.clock.now();
        if let Some(end) = snapshot.end_time {
            if end <= now {
                info!(target: "periodica::timer", timer = %self.name, %end, "End time reached");
                self.destroy();
                return;
            }
        }

        // 4. period
        let Some(spec) = snapshot.period else {
            debug!(target: "periodica::timer", timer = %self.name, "No period configured");
            self.alarm.cancel();
            return;
        };
        let amount = match spec.to_amount() {
            Ok(amount) => amount,
            Err(e) => {
                warn!(
                    target: "periodica::timer",
                    timer = %self.name,
                    period = %spec,
                    error = %e,
                    "Invalid period, timer stays silent"
                );
                self.alarm.cancel();
                return;
            }
        };

        // 5. base
        let base = match (reanchor, snapshot.next_execution_time, snapshot.start_time) {
            (false, Some(next), _) => next,
            (_, _, Some(start)) => start,
            _ => {
                if let Err(e) = self
                    .store
                    .write(ConfigField::StartTime, Some(FieldValue::Instant(now)), None)
                {
                    warn!(
                        target: "periodica::timer",
                        timer = %self.name,
                        error = %e,
                        "Failed to seed start time"
                    );
                    return;
                }
                now
            }
        };

        // 6. catch up
        let zone = snapshot.timezone;
        let next = match advance_past(base, &amount, zone.as_ref(), now) {
            Ok(next) => next,
            Err(e) => {
                warn!(
                    target: "periodica::timer",
                    timer = %self.name,
                    %base,
                    error = %e,
                    "Cannot advance schedule"
                );
                return;
            }
        };

        // 7. persist under the lease
        let written = {
            let lease = self.lease.lock();
            self.store.write(
                ConfigField::NextExecutionTime,
                Some(FieldValue::Instant(next)),
                lease.as_ref(),
            )
        };
        if let Err(e) = written {
            warn!(
                target: "periodica::timer",
                timer = %self.name,
                error = %e,
                "Failed to persist next execution time"
            );
            return;
        }

        // 8. re-arm
        debug!(
            target: "periodica::timer",
            timer = %self.name,
            %base,
            %next,
            period = %amount,
            "Schedule recomputed"
        );
        self.arm(next - now);
    }

    fn arm(&self, delay: TimeDelta) {
        // Holding the state lock keeps a concurrent stop from being undone
        let state = self.state.lock();
        if *state != TimerState::Running || !self.active.load(Ordering::SeqCst) {
            return;
        }
        if let Err(e) = self.alarm.rearm(delay) {
            warn!(
                target: "periodica::timer",
                timer = %self.name,
                error = %e,
                "Failed to arm alarm"
            );
        }
    }
}

fn worker_loop(inner: &Arc<TimerInner>) {
    loop {
        let event = {
            let mut queue = inner.queue.lock();
            loop {
                if queue.shutdown {
                    queue.busy = false;
                    queue.exited = true;
                    inner.idle.notify_all();
                    return;
                }
                if let Some(event) = queue.events.pop_front() {
                    queue.busy = true;
                    break event;
                }
                inner.idle.notify_all();
                inner.work_ready.wait(&mut queue);
            }
        };

        let outcome =
            std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| inner.handle(event)));
        if outcome.is_err() {
            error!(
                target: "periodica::timer",
                timer = %inner.name,
                ?event,
                "Timer event handler panicked"
            );
        }

        let mut queue = inner.queue.lock();
        queue.busy = false;
        if queue.events.is_empty() {
            inner.idle.notify_all();
        }
    }
}

// ============================================================================
// PeriodicTimer
// ============================================================================

/// Periodic timer whose schedule lives in a [`ConfigStore`].
///
/// Starts out [`TimerState::Stopped`]; call [`PeriodicTimer::resume`] to
/// begin scheduling. Dropping the timer destroys it.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use periodica_core::{PeriodSpec, SystemClock, TemporalUnit};
/// use periodica_store::MemoryConfigStore;
/// use periodica_timer::{PeriodicTimer, ThreadAlarm};
///
/// let store = Arc::new(MemoryConfigStore::new());
/// let timer = PeriodicTimer::create(
///     store,
///     Box::new(ThreadAlarm::new()?),
///     Arc::new(SystemClock),
///     PeriodSpec::new(15, TemporalUnit::Minutes)?,
///     None,
/// )?;
/// timer.add_listener(Arc::new(|at| println!("fired for {at}")));
/// timer.resume();
/// # Ok::<(), periodica_core::Error>(())
/// ```
pub struct PeriodicTimer {
    inner: Arc<TimerInner>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl PeriodicTimer {
    /// Attach a timer to an existing configuration.
    ///
    /// Reserves `next_execution_time` for this timer until it is destroyed.
    ///
    /// # Errors
    ///
    /// - `FieldReserved` if another timer already owns the configuration
    /// - `Deleted` if the configuration no longer exists
    /// - `Io` if the worker thread cannot be spawned
    pub fn attach(
        store: Arc<dyn ConfigStore>,
        alarm: Box<dyn AlarmPrimitive>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let lease = store.reserve_exclusive(ConfigField::NextExecutionTime)?;
        Self::attach_with_lease(store, alarm, clock, lease)
    }

    /// Build the timer around a lease the caller already holds. The lease is
    /// released on every failure path.
    fn attach_with_lease(
        store: Arc<dyn ConfigStore>,
        alarm: Box<dyn AlarmPrimitive>,
        clock: Arc<dyn Clock>,
        lease: FieldLease,
    ) -> Result<Self> {
        let name = format!(
            "periodica-timer-{}",
            TIMER_SEQUENCE.fetch_add(1, Ordering::Relaxed)
        );

        let inner = Arc::new(TimerInner {
            name: name.clone(),
            store: Arc::clone(&store),
            alarm: DelegatingAlarm::new(alarm),
            clock,
            state: Mutex::new(TimerState::Stopped),
            active: AtomicBool::new(false),
            lease: Mutex::new(Some(lease)),
            value_subscription: Mutex::new(None),
            lifecycle_subscription: Mutex::new(None),
            listeners: Mutex::new(Vec::new()),
            next_listener: AtomicU64::new(1),
            queue: Mutex::new(EventQueue::default()),
            work_ready: Condvar::new(),
            idle: Condvar::new(),
        });

        let worker_inner = Arc::clone(&inner);
        let handle = match std::thread::Builder::new()
            .name(name.clone())
            .spawn(move || worker_loop(&worker_inner))
        {
            Ok(handle) => handle,
            Err(e) => {
                inner.destroy();
                return Err(e.into());
            }
        };

        let weak = Arc::downgrade(&inner);
        inner.alarm.on_fire(Arc::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.enqueue(TimerEvent::Fire);
            }
        }));
        let listener = TimerInner::store_listener(Arc::downgrade(&inner), false);
        let lifecycle = store.subscribe(&[], listener);
        *inner.lifecycle_subscription.lock() = Some(lifecycle);

        info!(target: "periodica::timer", timer = %name, "Timer attached");
        Ok(PeriodicTimer {
            inner,
            worker: Mutex::new(Some(handle)),
        })
    }

    /// Seed a configuration with `period` and a start time, activate it and
    /// attach a timer.
    ///
    /// Without an explicit `start`, the schedule starts at the next boundary
    /// aligned to the period (e.g. the next quarter hour for 15 minutes).
    ///
    /// The configuration is claimed before anything is written, so a
    /// configuration owned by another timer is left untouched. Any stored
    /// `next_execution_time` is cleared.
    ///
    /// # Errors
    ///
    /// - `InvalidFactor` / `UnsupportedUnit` for an unusable period
    /// - everything [`PeriodicTimer::attach`] returns
    pub fn create(
        store: Arc<dyn ConfigStore>,
        alarm: Box<dyn AlarmPrimitive>,
        clock: Arc<dyn Clock>,
        period: PeriodSpec,
        start: Option<Instant>,
    ) -> Result<Self> {
        period.to_amount()?;
        let lease = store.reserve_exclusive(ConfigField::NextExecutionTime)?;
        if let Err(e) = Self::seed(store.as_ref(), clock.as_ref(), &lease, period, start) {
            store.release_exclusive(lease);
            return Err(e);
        }
        Self::attach_with_lease(store, alarm, clock, lease)
    }

    fn seed(
        store: &dyn ConfigStore,
        clock: &dyn Clock,
        lease: &FieldLease,
        period: PeriodSpec,
        start: Option<Instant>,
    ) -> Result<()> {
        // A schedule left behind by a previous owner does not carry over
        store.write(ConfigField::NextExecutionTime, None, Some(lease))?;
        let start = match start {
            Some(start) => start,
            None => {
                let zone = store.snapshot_read(&[ConfigField::Timezone])?.timezone;
                aligned_start(
                    clock.now(),
                    period.factor,
                    period.unit,
                    zone.as_ref(),
                    Direction::Next,
                )?
            }
        };
        store.write_batch(vec![
            (ConfigField::Period, Some(FieldValue::Period(period))),
            (ConfigField::StartTime, Some(FieldValue::Instant(start))),
        ])?;
        store.activate()
    }

    /// Human-readable timer name, also used for its worker thread
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Start scheduling. No-op unless stopped.
    pub fn resume(&self) {
        self.inner.resume();
    }

    /// Stop scheduling and cancel the pending alarm. No-op unless running.
    pub fn stop(&self) {
        self.inner.stop();
    }

    /// Stop for good and release the configuration. Idempotent.
    pub fn destroy(&self) {
        self.inner.destroy();
        if let Some(handle) = self.worker.lock().take() {
            if handle.thread().id() != std::thread::current().id() {
                let _ = handle.join();
            }
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> TimerState {
        self.inner.state()
    }

    /// Whether the timer is running
    pub fn is_running(&self) -> bool {
        self.state() == TimerState::Running
    }

    /// Configured period, resolved.
    ///
    /// # Errors
    ///
    /// - `UseAfterDestroy` after destroy
    /// - `Aborted` if the configuration cannot be read consistently
    /// - `InvalidFactor` / `UnsupportedUnit` for an unusable stored period
    pub fn period(&self) -> Result<Option<TemporalAmount>> {
        self.inner.ensure_alive()?;
        let snapshot = self.inner.store.snapshot_read(&[ConfigField::Period])?;
        snapshot.period.map(|spec| spec.to_amount()).transpose()
    }

    /// Configured end time.
    ///
    /// # Errors
    ///
    /// `UseAfterDestroy` after destroy, `Aborted` on an inconsistent read.
    pub fn end_time(&self) -> Result<Option<Instant>> {
        self.inner.ensure_alive()?;
        Ok(self.inner.store.snapshot_read(&[ConfigField::EndTime])?.end_time)
    }

    /// Set or clear the end time. A running timer picks the change up
    /// immediately and destroys itself if the end time has already passed.
    ///
    /// # Errors
    ///
    /// `UseAfterDestroy` after destroy, or the store's write error.
    pub fn set_end_time(&self, end: Option<Instant>) -> Result<()> {
        self.inner.ensure_alive()?;
        self.inner
            .store
            .write(ConfigField::EndTime, end.map(FieldValue::Instant), None)
    }

    /// Persisted next execution time.
    ///
    /// # Errors
    ///
    /// `UseAfterDestroy` after destroy, `Aborted` on an inconsistent read.
    pub fn next_execution_time(&self) -> Result<Option<Instant>> {
        self.inner.ensure_alive()?;
        Ok(self
            .inner
            .store
            .snapshot_read(&[ConfigField::NextExecutionTime])?
            .next_execution_time)
    }

    /// Register a callback invoked once per firing.
    pub fn add_listener(&self, listener: FireListener) -> ListenerId {
        let id = ListenerId(self.inner.next_listener.fetch_add(1, Ordering::Relaxed));
        self.inner.listeners.lock().push((id, listener));
        id
    }

    /// Remove a fire listener; returns whether it was registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.inner.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    /// The timer's alarm, for inspection. Use [`PeriodicTimer::stop`] or
    /// [`PeriodicTimer::destroy`] to silence it.
    pub fn alarm(&self) -> &DelegatingAlarm {
        &self.inner.alarm
    }

    /// Block until every queued event has been handled.
    ///
    /// Returns at once on the timer's own worker thread (e.g. inside a fire
    /// listener), which is the thread draining the queue.
    pub fn wait_idle(&self) {
        if std::thread::current().name() == Some(self.inner.name.as_str()) {
            return;
        }
        let mut queue = self.inner.queue.lock();
        while !queue.exited && (queue.busy || !queue.events.is_empty()) {
            self.inner.idle.wait(&mut queue);
        }
    }
}

impl Drop for PeriodicTimer {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl fmt::Debug for PeriodicTimer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeriodicTimer")
            .field("name", &self.inner.name)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    static_assertions::assert_impl_all!(super::PeriodicTimer: Send, Sync);

    use super::*;
    use crate::testing::{ManualAlarm, ManualClock};
    use chrono::{TimeZone, Utc};
    use periodica_core::TemporalUnit;
    use periodica_store::MemoryConfigStore;

    fn setup() -> (Arc<MemoryConfigStore>, ManualAlarm, Arc<ManualClock>, PeriodicTimer) {
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()));
        let store = Arc::new(MemoryConfigStore::new());
        let alarm = ManualAlarm::new(clock.clone());
        let timer = PeriodicTimer::create(
            store.clone(),
            Box::new(alarm.clone()),
            clock.clone(),
            PeriodSpec::new(1, TemporalUnit::Hours).unwrap(),
            None,
        )
        .unwrap();
        (store, alarm, clock, timer)
    }

    #[test]
    fn test_route_value_events() {
        let period = ConfigEvent::value_changed(ConfigField::Period, 1);
        let start = ConfigEvent::value_changed(ConfigField::StartTime, 1);
        let end = ConfigEvent::value_changed(ConfigField::EndTime, 1);
        let zone = ConfigEvent::value_changed(ConfigField::Timezone, 1);
        assert_eq!(route(&period, true), Some(TimerEvent::Recompute { reanchor: true }));
        assert_eq!(route(&start, true), Some(TimerEvent::Recompute { reanchor: true }));
        assert_eq!(route(&end, true), Some(TimerEvent::Recompute { reanchor: false }));
        assert_eq!(route(&zone, true), Some(TimerEvent::Recompute { reanchor: false }));
        assert_eq!(route(&period, false), None);
    }

    #[test]
    fn test_route_lifecycle_events() {
        let deleted = ConfigEvent::lifecycle(ChangeKind::Deleted, 1);
        assert_eq!(route(&deleted, false), Some(TimerEvent::Lifecycle(ChangeKind::Deleted)));
        assert_eq!(route(&deleted, true), None);
    }

    #[test]
    fn test_create_aligns_start_to_next_boundary() {
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 10, 7, 0).unwrap()));
        let store = Arc::new(MemoryConfigStore::new());
        let timer = PeriodicTimer::create(
            store.clone(),
            Box::new(ManualAlarm::new(clock.clone())),
            clock,
            PeriodSpec::new(15, TemporalUnit::Minutes).unwrap(),
            None,
        )
        .unwrap();
        let snapshot = store.snapshot_read(&ConfigField::ALL).unwrap();
        assert_eq!(
            snapshot.start_time,
            Some(Utc.with_ymd_and_hms(2024, 1, 1, 10, 15, 0).unwrap())
        );
        assert!(snapshot.active);
        assert_eq!(timer.state(), TimerState::Stopped);
    }

    #[test]
    fn test_arm_is_skipped_when_not_running() {
        let (_store, alarm, _clock, timer) = setup();
        timer.inner.arm(TimeDelta::minutes(1));
        assert_eq!(alarm.arm_count(), 0);
    }

    #[test]
    fn test_wait_idle_inside_listener_returns() {
        let (_store, alarm, clock, timer) = setup();
        let timer = Arc::new(timer);
        let weak = Arc::downgrade(&timer);
        let done = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&done);
        timer.add_listener(Arc::new(move |_| {
            if let Some(timer) = weak.upgrade() {
                timer.wait_idle();
                flag.store(true, Ordering::SeqCst);
            }
        }));
        timer.resume();
        timer.wait_idle();

        clock.set(Utc.with_ymd_and_hms(2024, 1, 1, 1, 0, 0).unwrap());
        assert!(alarm.fire());
        timer.wait_idle();
        assert!(done.load(Ordering::SeqCst));
    }

    #[test]
    fn test_timer_state_display() {
        assert_eq!(TimerState::Running.to_string(), "running");
        assert_eq!(TimerState::Destroyed.to_string(), "destroyed");
    }

    #[test]
    fn test_name_matches_worker_thread_prefix() {
        let (_store, _alarm, _clock, timer) = setup();
        assert!(timer.name().starts_with("periodica-timer-"));
    }
}
