//! Shared harness for timer integration tests

#![allow(dead_code)]

use chrono::{TimeDelta, TimeZone, Utc};
use parking_lot::Mutex;
use periodica_core::{Instant, PeriodSpec, TemporalUnit};
use periodica_store::{MemoryConfigStore, TimerConfig};
use periodica_timer::testing::{ManualAlarm, ManualClock};
use periodica_timer::PeriodicTimer;
use std::sync::Arc;

#[allow(unused_imports)]
pub use periodica_timer::AlarmPrimitive;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// 2024-01-01T00:00:00Z
pub fn t0() -> Instant {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

pub fn minutes(n: i64) -> TimeDelta {
    TimeDelta::minutes(n)
}

pub fn hourly() -> PeriodSpec {
    PeriodSpec::new(1, TemporalUnit::Hours).unwrap()
}

pub struct Harness {
    pub store: Arc<MemoryConfigStore>,
    pub alarm: ManualAlarm,
    pub clock: Arc<ManualClock>,
    pub timer: PeriodicTimer,
    pub fired: Arc<Mutex<Vec<Instant>>>,
}

impl Harness {
    /// Attach a timer to `config` with the clock at `now`; not resumed yet.
    pub fn attach(config: TimerConfig, now: Instant) -> Self {
        init_tracing();
        let store = Arc::new(MemoryConfigStore::from_config(&config).unwrap());
        Self::attach_to(store, now)
    }

    pub fn attach_to(store: Arc<MemoryConfigStore>, now: Instant) -> Self {
        let clock = Arc::new(ManualClock::new(now));
        let alarm = ManualAlarm::new(clock.clone());
        let timer =
            PeriodicTimer::attach(store.clone(), Box::new(alarm.clone()), clock.clone()).unwrap();
        let fired = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&fired);
        timer.add_listener(Arc::new(move |at| sink.lock().push(at)));
        Harness {
            store,
            alarm,
            clock,
            timer,
            fired,
        }
    }

    /// Hourly timer anchored at `t0`, already running.
    pub fn hourly_running(now: Instant) -> Self {
        let harness = Self::attach(
            TimerConfig {
                period: Some(hourly()),
                start_time: Some(t0()),
                ..TimerConfig::default()
            },
            now,
        );
        harness.timer.resume();
        harness.timer.wait_idle();
        harness
    }

    /// Move the clock to `at` and fire the alarm.
    pub fn fire_at(&self, at: Instant) {
        self.clock.set(at);
        assert!(self.alarm.fire());
        self.timer.wait_idle();
    }

    pub fn fired(&self) -> Vec<Instant> {
        self.fired.lock().clone()
    }
}
