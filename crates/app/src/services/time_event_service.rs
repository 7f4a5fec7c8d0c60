//! Time-event service: recurring triggers evaluated once per second.
//!
//! Every registration owns an independent one-second timer, armed only
//! while the service runs. Each tick reads the local wall clock, truncated
//! to the second, and fires the callback when the trigger's [`Schedule`]
//! matches. A trigger fires at most once per wall-clock second, and a single
//! second skipped by timer drift is replayed.

use std::any::type_name;
use std::collections::HashMap;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDateTime, SubsecRound, TimeDelta};
use parking_lot::Mutex;

use hubkit_domain::error::HubError;
use hubkit_domain::id::TimerId;
use hubkit_domain::recurrence::Recurrence;
use hubkit_domain::schedule::Schedule;
use hubkit_domain::service::ServiceStatus;
use hubkit_domain::time::Tick;
use hubkit_domain::trigger::TriggerKey;

use crate::guard::call_guarded;
use crate::ports::Clock;
use crate::services::service::Service;
use crate::timer_registry::TimerRegistry;

const TICK_PERIOD: Duration = Duration::from_secs(1);

type TriggerCallback = Arc<dyn Fn(Tick) + Send + Sync>;

struct Trigger {
    key: TriggerKey,
    recurrence: Recurrence,
    schedule: Schedule,
    callback: TriggerCallback,
}

impl Trigger {
    fn fire(&self, tick: Tick) {
        tracing::trace!(key = %self.key, %tick, "trigger fired");
        if let Err(reason) = call_guarded(|| (self.callback)(tick)) {
            tracing::error!(key = %self.key, recurrence = %self.recurrence, %tick, %reason, "trigger callback panicked");
        }
    }
}

#[derive(Default)]
struct TimeEventState {
    status: ServiceStatus,
    triggers: HashMap<TriggerKey, Arc<Trigger>>,
    timers: HashMap<TriggerKey, TimerId>,
}

/// Dispatches recurring callbacks on wall-clock schedules.
pub struct TimeEventService {
    clock: Arc<dyn Clock>,
    timers: Arc<TimerRegistry>,
    state: Mutex<TimeEventState>,
}

impl TimeEventService {
    pub const NAME: &'static str = "time-event-service";

    #[must_use]
    pub fn new(clock: Arc<dyn Clock>, timers: Arc<TimerRegistry>) -> Self {
        Self {
            clock,
            timers,
            state: Mutex::new(TimeEventState::default()),
        }
    }

    /// Register `callback` to run with `context` whenever `recurrence` matches.
    ///
    /// Without an explicit `key`, the key is derived from the callback type,
    /// the caller's source location and the recurrence, so registering again
    /// from the same place is a no-op. Jitter of hourly and daily modes is
    /// rolled here, once.
    #[track_caller]
    pub fn register<C, F>(
        &self,
        callback: F,
        context: C,
        recurrence: Recurrence,
        key: Option<&str>,
    ) -> TriggerKey
    where
        C: Send + Sync + 'static,
        F: Fn(&C, Tick) + Send + Sync + 'static,
    {
        let call_site = Location::caller();
        let key = key.map_or_else(
            || TriggerKey::derive(type_name::<F>(), call_site, &recurrence),
            TriggerKey::from,
        );
        self.insert(
            key,
            recurrence,
            Arc::new(move |tick| callback(&context, tick)),
        )
    }

    /// Remove a registration and disarm its timer.
    ///
    /// Returns `false` (and logs) if the key is unknown.
    pub fn unregister(&self, key: &TriggerKey) -> bool {
        let mut state = self.state.lock();
        if state.triggers.remove(key).is_none() {
            tracing::warn!(%key, "unknown trigger");
            return false;
        }
        if let Some(timer) = state.timers.remove(key) {
            self.timers.cancel(timer);
        }
        tracing::debug!(%key, "trigger unregistered");
        true
    }

    #[must_use]
    pub fn is_registered(&self, key: &TriggerKey) -> bool {
        self.state.lock().triggers.contains_key(key)
    }

    /// Canonical schedule a registration expanded to.
    #[must_use]
    pub fn schedule_of(&self, key: &TriggerKey) -> Option<Schedule> {
        self.state
            .lock()
            .triggers
            .get(key)
            .map(|trigger| trigger.schedule)
    }

    /// Number of registrations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().triggers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.lock().triggers.is_empty()
    }

    /// Number of armed timers; zero while stopped.
    #[must_use]
    pub fn armed(&self) -> usize {
        self.state.lock().timers.len()
    }

    fn insert(
        &self,
        key: TriggerKey,
        recurrence: Recurrence,
        callback: TriggerCallback,
    ) -> TriggerKey {
        let mut state = self.state.lock();
        if state.triggers.contains_key(&key) {
            tracing::warn!(%key, %recurrence, "trigger already registered");
            return key;
        }

        let schedule = recurrence.expand(&mut rand::thread_rng());
        let trigger = Arc::new(Trigger {
            key: key.clone(),
            recurrence,
            schedule,
            callback,
        });
        if state.status == ServiceStatus::Running {
            let timer = self.arm(&trigger);
            state.timers.insert(key.clone(), timer);
        }
        state.triggers.insert(key.clone(), trigger);
        tracing::debug!(%key, %recurrence, %schedule, "trigger registered");
        key
    }

    fn arm(&self, trigger: &Arc<Trigger>) -> TimerId {
        let trigger = Arc::clone(trigger);
        let clock = Arc::clone(&self.clock);
        let mut last: Option<NaiveDateTime> = None;
        self.timers.every(TICK_PERIOD, move || {
            let now = clock.local().trunc_subsecs(0);
            for second in seconds_to_evaluate(last, now) {
                let tick = Tick::from(second);
                if trigger.schedule.matches(tick) {
                    trigger.fire(tick);
                }
            }
            last = Some(now);
        })
    }
}

/// Wall-clock seconds a tick must evaluate, given the previous tick's second.
fn seconds_to_evaluate(last: Option<NaiveDateTime>, now: NaiveDateTime) -> Vec<NaiveDateTime> {
    match last.map(|last| now - last) {
        Some(gap) if gap == TimeDelta::zero() => Vec::new(),
        Some(gap) if gap == TimeDelta::seconds(2) => vec![now - TimeDelta::seconds(1), now],
        _ => vec![now],
    }
}

impl Service for TimeEventService {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn status(&self) -> ServiceStatus {
        self.state.lock().status
    }

    /// Arm a timer for every registration.
    #[tracing::instrument(skip(self), fields(service = Self::NAME))]
    fn start(&self) -> Result<(), HubError> {
        let mut state = self.state.lock();
        if state.status == ServiceStatus::Running {
            return Err(HubError::AlreadyRunning {
                name: Self::NAME.to_string(),
            });
        }
        let armed: Vec<_> = state
            .triggers
            .iter()
            .map(|(key, trigger)| (key.clone(), self.arm(trigger)))
            .collect();
        state.timers.extend(armed);
        state.status = ServiceStatus::Running;
        tracing::info!(triggers = state.triggers.len(), "service started");
        Ok(())
    }

    /// Disarm every timer; registrations are kept for the next start.
    #[tracing::instrument(skip(self), fields(service = Self::NAME))]
    fn stop(&self) -> Result<(), HubError> {
        let mut state = self.state.lock();
        for (_, timer) in state.timers.drain() {
            self.timers.cancel(timer);
        }
        state.status = ServiceStatus::Stopped;
        tracing::info!("service stopped");
        Ok(())
    }
}

impl fmt::Debug for TimeEventService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("TimeEventService")
            .field("status", &state.status)
            .field("triggers", &state.triggers.len())
            .field("armed", &state.timers.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::ManualClock;
    use chrono::NaiveDate;
    use hubkit_domain::recurrence::{EVERY_DAYS, EVERY_MINUTES, EVERY_SECONDS};
    use hubkit_domain::schedule::ScheduleField;

    fn at(hour: u32, minute: u32, second: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 10)
            .unwrap()
            .and_hms_opt(hour, minute, second)
            .unwrap()
    }

    struct Harness {
        clock: Arc<ManualClock>,
        timers: Arc<TimerRegistry>,
        service: TimeEventService,
        fired: Arc<Mutex<Vec<Tick>>>,
    }

    impl Harness {
        fn new(start: NaiveDateTime) -> Self {
            let clock = Arc::new(ManualClock::new(start));
            let timers = Arc::new(TimerRegistry::new(tokio::runtime::Handle::current()));
            let service = TimeEventService::new(clock.clone(), Arc::clone(&timers));
            Self {
                clock,
                timers,
                service,
                fired: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn record(fired: &Arc<Mutex<Vec<Tick>>>, tick: Tick) {
            fired.lock().push(tick);
        }

        fn fired(&self) -> Vec<Tick> {
            self.fired.lock().clone()
        }
    }

    /// Timers armed at t=0 tick at t=1s, 2s, ...; sampling at half-seconds
    /// keeps the test clear of tick boundaries.
    async fn first_tick() {
        tokio::time::sleep(Duration::from_millis(1_500)).await;
    }

    async fn next_tick() {
        tokio::time::sleep(Duration::from_secs(1)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn should_fire_every_second_with_wall_clock_tick() {
        let h = Harness::new(at(10, 0, 0));
        h.service.start().unwrap();
        h.service
            .register(Harness::record, Arc::clone(&h.fired), EVERY_SECONDS, None);

        first_tick().await;
        h.clock.set(at(10, 0, 1));
        next_tick().await;

        assert_eq!(h.fired(), vec![Tick::new(10, 0, 0), Tick::new(10, 0, 1)]);
    }

    #[tokio::test(start_paused = true)]
    async fn should_fire_at_most_once_per_wall_clock_second() {
        let h = Harness::new(at(10, 0, 0));
        h.service.start().unwrap();
        h.service
            .register(Harness::record, Arc::clone(&h.fired), EVERY_SECONDS, None);

        first_tick().await;
        next_tick().await;
        next_tick().await;

        assert_eq!(h.fired(), vec![Tick::new(10, 0, 0)]);
    }

    #[tokio::test(start_paused = true)]
    async fn should_replay_a_single_skipped_second() {
        let h = Harness::new(at(10, 0, 0));
        h.service.start().unwrap();
        h.service
            .register(Harness::record, Arc::clone(&h.fired), EVERY_SECONDS, None);

        first_tick().await;
        h.clock.set(at(10, 0, 2));
        next_tick().await;

        assert_eq!(
            h.fired(),
            vec![
                Tick::new(10, 0, 0),
                Tick::new(10, 0, 1),
                Tick::new(10, 0, 2)
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn should_not_replay_larger_gaps() {
        let h = Harness::new(at(10, 0, 0));
        h.service.start().unwrap();
        h.service
            .register(Harness::record, Arc::clone(&h.fired), EVERY_SECONDS, None);

        first_tick().await;
        h.clock.set(at(10, 0, 5));
        next_tick().await;

        assert_eq!(h.fired(), vec![Tick::new(10, 0, 0), Tick::new(10, 0, 5)]);
    }

    #[tokio::test(start_paused = true)]
    async fn should_register_same_call_site_only_once() {
        let h = Harness::new(at(10, 0, 0));
        h.service.start().unwrap();

        let mut keys = Vec::new();
        for _ in 0..2 {
            keys.push(h.service.register(
                Harness::record,
                Arc::clone(&h.fired),
                EVERY_SECONDS,
                None,
            ));
        }
        first_tick().await;

        assert_eq!(keys[0], keys[1]);
        assert_eq!(h.service.len(), 1);
        assert_eq!(h.service.armed(), 1);
        assert_eq!(h.fired().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn should_keep_distinct_call_sites_apart() {
        let h = Harness::new(at(10, 0, 0));
        let first = h
            .service
            .register(Harness::record, Arc::clone(&h.fired), EVERY_SECONDS, None);
        let second = h
            .service
            .register(Harness::record, Arc::clone(&h.fired), EVERY_SECONDS, None);

        assert_ne!(first, second);
        assert_eq!(h.service.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn should_ignore_duplicate_explicit_key() {
        let h = Harness::new(at(10, 0, 0));
        let key = h.service.register(
            Harness::record,
            Arc::clone(&h.fired),
            EVERY_SECONDS,
            Some("refresh"),
        );
        let again = h.service.register(
            |_: &(), _| {},
            (),
            EVERY_MINUTES,
            Some("refresh"),
        );

        assert_eq!(key.as_str(), "refresh");
        assert_eq!(key, again);
        assert_eq!(h.service.len(), 1);
        assert_eq!(
            h.service.schedule_of(&key).map(|s| s.to_string()),
            Some("* * *".to_string())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn should_register_from_thread_outside_the_runtime() {
        let h = Harness::new(at(10, 0, 0));
        h.service.start().unwrap();

        std::thread::scope(|scope| {
            scope.spawn(|| {
                h.service
                    .register(Harness::record, Arc::clone(&h.fired), EVERY_SECONDS, None)
            });
        });
        assert_eq!(h.service.armed(), 1);

        first_tick().await;

        assert_eq!(h.fired(), vec![Tick::new(10, 0, 0)]);
    }

    #[tokio::test(start_paused = true)]
    async fn should_fire_every_minute_at_second_zero_only() {
        let h = Harness::new(at(10, 0, 58));
        h.service.start().unwrap();
        h.service
            .register(Harness::record, Arc::clone(&h.fired), EVERY_MINUTES, None);

        first_tick().await;
        for second in [59, 60, 61, 62] {
            h.clock.set(at(10, 0, 0) + TimeDelta::seconds(second));
            next_tick().await;
        }

        assert_eq!(h.fired(), vec![Tick::new(10, 1, 0)]);
    }

    #[tokio::test(start_paused = true)]
    async fn should_fire_custom_stride_on_even_hours_only() {
        let h = Harness::new(at(2, 0, 0));
        h.service.start().unwrap();
        let recurrence = Recurrence::custom("*/2", "0", "0").unwrap();
        h.service
            .register(Harness::record, Arc::clone(&h.fired), recurrence, None);

        first_tick().await;
        for hour in [3, 4] {
            h.clock.set(at(hour, 0, 0));
            next_tick().await;
        }

        assert_eq!(h.fired(), vec![Tick::new(2, 0, 0), Tick::new(4, 0, 0)]);
    }

    #[tokio::test(start_paused = true)]
    async fn should_fire_daily_trigger_once_at_its_jittered_time() {
        let h = Harness::new(at(12, 0, 0));
        h.service.start().unwrap();
        let key = h
            .service
            .register(Harness::record, Arc::clone(&h.fired), EVERY_DAYS, None);
        let schedule = h.service.schedule_of(&key).unwrap();
        let (ScheduleField::Exact(hour), ScheduleField::Exact(minute)) =
            (schedule.hour, schedule.minute)
        else {
            panic!("daily schedule must be exact: {schedule}");
        };

        first_tick().await;
        assert!(h.fired().is_empty());

        h.clock.set(at(hour, minute, 0));
        next_tick().await;
        next_tick().await;
        h.clock.set(at(hour, minute, 1));
        next_tick().await;

        assert_eq!(h.fired(), vec![Tick::new(hour, minute, 0)]);
    }

    #[tokio::test(start_paused = true)]
    async fn should_keep_firing_after_a_callback_panics() {
        let h = Harness::new(at(10, 0, 0));
        h.service.start().unwrap();
        h.service.register(
            |_: &(), _| panic!("plugin bug"),
            (),
            EVERY_SECONDS,
            Some("broken"),
        );
        h.service
            .register(Harness::record, Arc::clone(&h.fired), EVERY_SECONDS, None);

        first_tick().await;
        h.clock.set(at(10, 0, 1));
        next_tick().await;

        assert_eq!(h.fired().len(), 2);
        assert_eq!(h.service.armed(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn should_stop_firing_once_unregistered() {
        let h = Harness::new(at(10, 0, 0));
        h.service.start().unwrap();
        let key = h
            .service
            .register(Harness::record, Arc::clone(&h.fired), EVERY_SECONDS, None);

        first_tick().await;
        assert!(h.service.unregister(&key));
        h.clock.set(at(10, 0, 1));
        next_tick().await;

        assert_eq!(h.fired().len(), 1);
        assert!(!h.service.is_registered(&key));
        assert!(h.timers.is_empty());
        assert!(!h.service.unregister(&key));
    }

    #[tokio::test(start_paused = true)]
    async fn should_arm_registrations_only_while_running() {
        let h = Harness::new(at(10, 0, 0));
        h.service
            .register(Harness::record, Arc::clone(&h.fired), EVERY_SECONDS, None);
        assert_eq!(h.service.armed(), 0);

        first_tick().await;
        assert!(h.fired().is_empty());

        h.service.start().unwrap();
        assert_eq!(h.service.armed(), 1);
        first_tick().await;
        assert_eq!(h.fired().len(), 1);

        h.service.stop().unwrap();
        assert_eq!(h.service.status(), ServiceStatus::Stopped);
        assert_eq!(h.service.armed(), 0);
        assert!(h.timers.is_empty());
        assert_eq!(h.service.len(), 1);

        h.clock.set(at(10, 0, 1));
        next_tick().await;
        assert_eq!(h.fired().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn should_refuse_to_start_twice() {
        let h = Harness::new(at(10, 0, 0));
        h.service.start().unwrap();
        assert!(matches!(
            h.service.start(),
            Err(HubError::AlreadyRunning { .. })
        ));
    }

    #[test]
    fn should_evaluate_seconds_since_last_tick() {
        let now = at(10, 0, 10);
        assert_eq!(seconds_to_evaluate(None, now), vec![now]);
        assert!(seconds_to_evaluate(Some(now), now).is_empty());
        assert_eq!(seconds_to_evaluate(Some(at(10, 0, 9)), now), vec![now]);
        assert_eq!(
            seconds_to_evaluate(Some(at(10, 0, 8)), now),
            vec![at(10, 0, 9), now]
        );
        assert_eq!(seconds_to_evaluate(Some(at(10, 0, 20)), now), vec![now]);
    }
}
